//! The backend-agnostic datastore facade.
//!
//! A [`Datastore`] moves through `Connected → Ready → Closed`:
//!
//! ```ignore
//! let store = retrieval_datastore::create(&settings.datastore).await?;
//! let dataset = store.load_dataset(&settings.dataset).await?;
//! store.initialize_data(&dataset).await?;
//!
//! let rows = store
//!     .query("MATCH (a:Amenity) RETURN count(a) AS count", Params::new())
//!     .await?;
//!
//! store.close().await?;
//! ```

use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::{BackendKind, Config, IngestConfig};
use crate::connection::ConnectionManager;
use crate::dataset::{self, Dataset, DatasetPaths};
use crate::error::DatastoreError;
use crate::graph::backends::neo4j::Neo4jClient;
use crate::graph::backends::postgres::PostgresClient;
use crate::graph::backends::unsupported;
use crate::graph::{Backend, Params, QueryExt, Row};
use crate::ingest::GraphInitializer;

/// Lifecycle state of a [`Datastore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    Connected,
    Ready,
    Closed,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientState::Uninitialized => "uninitialized",
            ClientState::Connected => "connected",
            ClientState::Ready => "ready",
            ClientState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Load, initialize, query and close a knowledge graph, whatever the backend.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Backend this datastore talks to.
    fn kind(&self) -> BackendKind;

    fn state(&self) -> ClientState;

    /// Parses the configured CSV sources. Does not touch the backend.
    async fn load_dataset(&self, paths: &DatasetPaths) -> Result<Dataset, DatastoreError>;

    /// Writes the dataset into the backend. Repeat calls are idempotent.
    async fn initialize_data(&self, dataset: &Dataset) -> Result<(), DatastoreError>;

    /// Runs a backend-native query. Fails with
    /// [`DatastoreError::NotReady`] before the first successful
    /// [`initialize_data`](Datastore::initialize_data).
    async fn query(&self, cypher: &str, params: Params) -> Result<Vec<Row>, DatastoreError>;

    /// Releases backend resources. Closing twice is a no-op.
    async fn close(&self) -> Result<(), DatastoreError>;
}

/// A [`Datastore`] over any graph [`Backend`].
pub struct GraphDatastore<B: Backend> {
    manager: ConnectionManager<B>,
    initializer: GraphInitializer,
    state: Mutex<ClientState>,
}

/// Neo4j-backed datastore.
pub type Neo4jDatastore = GraphDatastore<Neo4jClient>;

/// PostgreSQL + Apache AGE backed datastore.
pub type PostgresDatastore = GraphDatastore<PostgresClient>;

impl<B: Backend> GraphDatastore<B> {
    /// Connects to the backend selected by `config`.
    ///
    /// Fails with [`DatastoreError::UnsupportedBackend`] when `config`
    /// selects a different backend than `B`.
    pub async fn create(config: &Config) -> Result<Self, DatastoreError> {
        Self::create_with(config, &IngestConfig::default()).await
    }

    /// Like [`create`](Self::create) with custom ingest settings.
    pub async fn create_with(config: &Config, ingest: &IngestConfig) -> Result<Self, DatastoreError> {
        if config.kind() != B::KIND {
            return Err(unsupported(B::KIND, config));
        }

        let manager = ConnectionManager::open(config).await?;
        Ok(Self::from_parts(manager, GraphInitializer::new(ingest)))
    }

    /// Wraps an already connected client.
    pub fn with_client(client: B, initializer: GraphInitializer) -> Self {
        Self::from_parts(ConnectionManager::new(client), initializer)
    }

    fn from_parts(manager: ConnectionManager<B>, initializer: GraphInitializer) -> Self {
        Self {
            manager,
            initializer,
            state: Mutex::new(ClientState::Connected),
        }
    }

    /// The underlying connection manager.
    pub fn connection(&self) -> &ConnectionManager<B> {
        &self.manager
    }

    fn ensure_open(&self) -> Result<ClientState, DatastoreError> {
        match *self.state.lock() {
            ClientState::Closed => Err(DatastoreError::ClosedHandle),
            state => Ok(state),
        }
    }
}

#[async_trait]
impl<B: Backend> Datastore for GraphDatastore<B> {
    fn kind(&self) -> BackendKind {
        B::KIND
    }

    fn state(&self) -> ClientState {
        *self.state.lock()
    }

    async fn load_dataset(&self, paths: &DatasetPaths) -> Result<Dataset, DatastoreError> {
        self.ensure_open()?;

        let paths = paths.clone();
        tokio::task::spawn_blocking(move || dataset::load(&paths))
            .await
            .map_err(|e| DatastoreError::Internal(format!("Dataset loader task failed: {}", e)))?
    }

    async fn initialize_data(&self, dataset: &Dataset) -> Result<(), DatastoreError> {
        self.ensure_open()?;

        self.initializer.initialize(&self.manager, dataset).await?;

        let mut state = self.state.lock();
        if *state == ClientState::Connected {
            *state = ClientState::Ready;
            tracing::info!("{} datastore ready", B::KIND);
        }
        Ok(())
    }

    async fn query(&self, cypher: &str, params: Params) -> Result<Vec<Row>, DatastoreError> {
        match self.ensure_open()? {
            ClientState::Ready => {}
            _ => return Err(DatastoreError::NotReady),
        }

        self.manager
            .client()?
            .query(cypher)
            .params(params)
            .fetch_all()
            .await
    }

    async fn close(&self) -> Result<(), DatastoreError> {
        {
            let mut state = self.state.lock();
            if *state == ClientState::Closed {
                return Ok(());
            }
            *state = ClientState::Closed;
        }

        self.manager.close().await?;
        tracing::info!("{} datastore closed", B::KIND);
        Ok(())
    }
}

/// Connects to the backend named by the config's `kind`.
pub async fn create(config: &Config) -> Result<Box<dyn Datastore>, DatastoreError> {
    create_with(config, &IngestConfig::default()).await
}

/// Like [`create`] with custom ingest settings.
pub async fn create_with(
    config: &Config,
    ingest: &IngestConfig,
) -> Result<Box<dyn Datastore>, DatastoreError> {
    let store: Box<dyn Datastore> = match config.kind() {
        BackendKind::Neo4j => Box::new(Neo4jDatastore::create_with(config, ingest).await?),
        BackendKind::Postgres => Box::new(PostgresDatastore::create_with(config, ingest).await?),
    };
    Ok(store)
}
