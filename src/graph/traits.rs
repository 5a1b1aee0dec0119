//! Core traits for graph database abstraction.
//!
//! This module defines the trait hierarchy that backends must implement:
//!
//! - [`CypherExecutor`] - Required for all graph backends
//! - [`Transaction`] - Session lifecycle management
//! - [`GraphClient`] - Connection pool, session creation and shutdown

use async_trait::async_trait;

use crate::error::DatastoreError;
use crate::graph::row::{Params, RowStream};

/// Executes Cypher queries against a graph database.
///
/// This is the core trait that all graph backends must implement.
/// It provides methods for executing queries that return results
/// and queries that don't (mutations).
#[async_trait]
pub trait CypherExecutor: Send + Sync {
    /// Executes a Cypher query and returns a stream of result rows.
    ///
    /// Use this for queries that return data (MATCH, RETURN).
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, DatastoreError>;

    /// Executes a Cypher query without returning results.
    ///
    /// Use this for mutations (CREATE, MERGE, DELETE, SET).
    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), DatastoreError>;
}

/// Session lifecycle management.
///
/// A session is a transaction bound to one pooled connection. Dropping a
/// session without finishing it returns the connection to the pool, where
/// the backend discards the open transaction.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Commits the session, making all changes permanent.
    async fn commit(self) -> Result<(), DatastoreError>;

    /// Rolls back the session, discarding all changes.
    async fn rollback(self) -> Result<(), DatastoreError>;
}

/// A pooled graph database client.
///
/// The executor methods run auto-commit queries; [`begin`](GraphClient::begin)
/// opens an explicit session.
#[async_trait]
pub trait GraphClient: CypherExecutor {
    /// The session type returned by this client.
    type Session: Transaction + CypherExecutor + 'static;

    /// Begins a new session on a pooled connection.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let session = client.begin().await?;
    /// session.run_cypher("CREATE (n:Node {id: $id})", params).await?;
    /// session.commit().await?;
    /// ```
    async fn begin(&self) -> Result<Self::Session, DatastoreError>;

    /// Releases pooled connections. Sessions still alive keep their own
    /// connection until dropped.
    async fn close(&self) -> Result<(), DatastoreError>;

    /// Builds the statement that upserts a batch of nodes bound to `$rows`.
    ///
    /// Each row is a full property map. The node is matched on
    /// `(label, key)`, created when absent, and its properties are replaced
    /// by the row otherwise.
    fn upsert_nodes_cypher(&self, label: &str, key: &str, _properties: &[&str]) -> String {
        format!("UNWIND $rows AS row MERGE (n:{label} {{{key}: row.{key}}}) SET n = row")
    }
}
