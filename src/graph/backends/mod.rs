//! Backend implementations for different graph databases.
//!
//! Each backend implements the core traits from [`crate::graph`]:
//!
//! - [`CypherExecutor`](crate::graph::CypherExecutor) - auto-commit and session queries
//! - [`Transaction`](crate::graph::Transaction) - for the session type
//! - [`GraphClient`](crate::graph::GraphClient) - sessions, close, upsert dialect
//! - [`Backend`] - opening from a [`Config`]
//!
//! # Available Backends
//!
//! | Backend | Module | Config `kind` |
//! |---------|--------|---------------|
//! | Neo4j | [`neo4j`] | `neo4j` |
//! | PostgreSQL + Apache AGE | [`postgres`] | `postgres` |
//!
//! # Implementing a Backend
//!
//! 1. Create a client struct (e.g., `Neo4jClient`) and a session struct
//! 2. Implement `CypherExecutor` for both
//! 3. Implement `Transaction` for the session struct
//! 4. Implement `GraphClient` for the client, overriding
//!    `upsert_nodes_cypher` if the backend lacks `SET n = map`
//! 5. Implement `Backend`, add a `BackendKind` and a `Config` variant

pub mod neo4j;
pub mod postgres;

use async_trait::async_trait;

use crate::config::{BackendKind, Config};
use crate::error::DatastoreError;
use crate::graph::GraphClient;

/// A graph client that can be opened from configuration.
#[async_trait]
pub trait Backend: GraphClient + Sized + 'static {
    /// The config `kind` this backend serves.
    const KIND: BackendKind;

    /// Opens the client and verifies the backend is reachable with the
    /// configured credentials.
    ///
    /// Fails with [`DatastoreError::UnsupportedBackend`] for a config of
    /// another kind and [`DatastoreError::Connection`] when the backend
    /// cannot be reached.
    async fn open(config: &Config) -> Result<Self, DatastoreError>;
}

/// Returns the mismatch error for a config that does not select `expected`.
pub(crate) fn unsupported(expected: BackendKind, config: &Config) -> DatastoreError {
    DatastoreError::UnsupportedBackend {
        expected,
        found: config.kind(),
    }
}
