//! Neo4j backend implementation.
//!
//! Uses `neo4rs` for async, pooled Bolt connections. Parameters travel as
//! Bolt values, converted from the JSON [`Params`] map.
//!
//! # Example
//!
//! ```ignore
//! use retrieval_datastore::graph::backends::neo4j::Neo4jClient;
//! use retrieval_datastore::graph::QueryExt;
//!
//! let client = Neo4jClient::connect(&neo4j_config).await?;
//!
//! let rows = client
//!     .query("MATCH (a:Amenity) RETURN count(a) AS count")
//!     .fetch_all()
//!     .await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use neo4rs::{BoltNull, BoltType, ConfigBuilder, Graph, Txn};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::config::{BackendKind, Config, Neo4jConfig};
use crate::error::DatastoreError;
use crate::graph::backends::{unsupported, Backend};
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::{CypherExecutor, GraphClient, Transaction};

/// Neo4j graph client.
///
/// Wraps the `neo4rs` connection pool. Cheap to clone; clones share the
/// pool, and [`close`](GraphClient::close) releases it for all of them.
#[derive(Clone)]
pub struct Neo4jClient {
    graph: Arc<RwLock<Option<Graph>>>,
    uri: Arc<str>,
}

impl Neo4jClient {
    /// Connects to Neo4j and verifies the credentials with a round trip.
    pub async fn connect(config: &Neo4jConfig) -> Result<Self, DatastoreError> {
        let mut builder = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.auth.username.as_str())
            .password(config.auth.password.as_str());
        if let Some(database) = &config.database {
            builder = builder.db(database.as_str());
        }
        if let Some(max_connections) = config.max_connections {
            builder = builder.max_connections(max_connections);
        }
        if let Some(fetch_size) = config.fetch_size {
            builder = builder.fetch_size(fetch_size);
        }

        let bolt_config = builder
            .build()
            .map_err(|e| DatastoreError::Connection(format!("Invalid Neo4j config: {}", e)))?;

        let graph = Graph::connect(bolt_config).await.map_err(|e| {
            DatastoreError::Connection(format!("Failed to connect to {}: {}", config.uri, e))
        })?;

        // Pooled connections open lazily; this surfaces bad hosts and
        // rejected credentials at connect time.
        graph.run(neo4rs::query("RETURN 1")).await.map_err(|e| {
            DatastoreError::Connection(format!("Neo4j at {} rejected the session: {}", config.uri, e))
        })?;

        tracing::debug!("Neo4j pool ready at {}", config.uri);

        Ok(Self {
            graph: Arc::new(RwLock::new(Some(graph))),
            uri: Arc::from(config.uri.as_str()),
        })
    }

    fn graph(&self) -> Result<Graph, DatastoreError> {
        self.graph.read().clone().ok_or(DatastoreError::ClosedHandle)
    }
}

#[async_trait]
impl CypherExecutor for Neo4jClient {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, DatastoreError> {
        let graph = self.graph()?;
        let query = bolt_query(cypher, &params)?;
        let cypher = cypher.to_string();

        Ok(Box::pin(try_stream! {
            let mut rows = graph
                .execute(query)
                .await
                .map_err(|e| query_error(&cypher, e))?;
            while let Some(row) = rows.next().await.map_err(|e| query_error(&cypher, e))? {
                yield convert_row(&row)?;
            }
        }))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), DatastoreError> {
        self.graph()?
            .run(bolt_query(cypher, &params)?)
            .await
            .map_err(|e| query_error(cypher, e))
    }
}

#[async_trait]
impl GraphClient for Neo4jClient {
    type Session = Neo4jSession;

    async fn begin(&self) -> Result<Self::Session, DatastoreError> {
        let txn = self.graph()?.start_txn().await.map_err(|e| {
            DatastoreError::Connection(format!("Failed to begin Neo4j transaction: {}", e))
        })?;

        Ok(Neo4jSession {
            txn: Mutex::new(txn),
        })
    }

    async fn close(&self) -> Result<(), DatastoreError> {
        // Dropping the last Graph handle shuts the pool down.
        if self.graph.write().take().is_some() {
            tracing::debug!("Released Neo4j pool for {}", self.uri);
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for Neo4jClient {
    const KIND: BackendKind = BackendKind::Neo4j;

    async fn open(config: &Config) -> Result<Self, DatastoreError> {
        match config {
            Config::Neo4j(neo4j) => Self::connect(neo4j).await,
            other => Err(unsupported(Self::KIND, other)),
        }
    }
}

/// A Neo4j explicit transaction on one pooled connection.
///
/// Dropping an unfinished session hands the connection back to the pool,
/// which resets it and discards the open transaction.
pub struct Neo4jSession {
    txn: Mutex<Txn>,
}

#[async_trait]
impl CypherExecutor for Neo4jSession {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, DatastoreError> {
        let query = bolt_query(cypher, &params)?;
        let cypher = cypher.to_string();

        Ok(Box::pin(try_stream! {
            let mut txn = self.txn.lock().await;
            let mut rows = txn
                .execute(query)
                .await
                .map_err(|e| query_error(&cypher, e))?;
            while let Some(row) = rows
                .next(txn.handle())
                .await
                .map_err(|e| query_error(&cypher, e))?
            {
                yield convert_row(&row)?;
            }
        }))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), DatastoreError> {
        self.txn
            .lock()
            .await
            .run(bolt_query(cypher, &params)?)
            .await
            .map_err(|e| query_error(cypher, e))
    }
}

#[async_trait]
impl Transaction for Neo4jSession {
    async fn commit(self) -> Result<(), DatastoreError> {
        self.txn
            .into_inner()
            .commit()
            .await
            .map_err(|e| DatastoreError::Internal(format!("Failed to commit transaction: {}", e)))
    }

    async fn rollback(self) -> Result<(), DatastoreError> {
        self.txn
            .into_inner()
            .rollback()
            .await
            .map_err(|e| DatastoreError::Internal(format!("Failed to rollback transaction: {}", e)))
    }
}

/// Builds a Bolt query with every parameter converted to a Bolt value.
fn bolt_query(cypher: &str, params: &Params) -> Result<neo4rs::Query, DatastoreError> {
    params
        .iter()
        .try_fold(
            neo4rs::query(cypher),
            |query, (name, value)| -> Result<_, DatastoreError> {
                Ok(query.param(name.as_str(), to_bolt(value)?))
            },
        )
        .map_err(|e| DatastoreError::Query {
            message: e.to_string(),
            query: cypher.to_string(),
        })
}

/// Converts a JSON value to the equivalent Bolt value.
///
/// Bolt integers are signed 64-bit. Larger unsigned integers are rejected
/// rather than rounded to floats, which would merge distinct values.
fn to_bolt(value: &JsonValue) -> Result<BoltType, DatastoreError> {
    let bolt = match value {
        JsonValue::Null => BoltType::Null(BoltNull),
        JsonValue::Bool(b) => BoltType::from(*b),
        JsonValue::Number(n) => match (n.as_i64(), n.is_f64()) {
            (Some(i), _) => BoltType::from(i),
            (None, true) => BoltType::from(n.as_f64().unwrap_or(f64::NAN)),
            (None, false) => {
                return Err(DatastoreError::Internal(format!(
                    "integer {} exceeds the Bolt integer range",
                    n
                )))
            }
        },
        JsonValue::String(s) => BoltType::from(s.as_str()),
        JsonValue::Array(items) => BoltType::from(
            items
                .iter()
                .map(to_bolt)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        JsonValue::Object(map) => BoltType::from(
            map.iter()
                .map(|(k, v)| to_bolt(v).map(|bolt| (k.clone(), bolt)))
                .collect::<Result<HashMap<String, BoltType>, _>>()?,
        ),
    };
    Ok(bolt)
}

/// Converts a Bolt record to a [`Row`]. Nodes become their property maps.
fn convert_row(row: &neo4rs::Row) -> Result<Row, DatastoreError> {
    row.to::<HashMap<String, JsonValue>>()
        .map(Row::new)
        .map_err(|e| DatastoreError::Internal(format!("Failed to decode Neo4j row: {}", e)))
}

fn query_error(cypher: &str, e: neo4rs::Error) -> DatastoreError {
    DatastoreError::Query {
        message: format!("Cypher query failed: {}", e),
        query: cypher.to_string(),
    }
}
