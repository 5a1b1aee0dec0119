//! Graph abstraction layer for backend-agnostic database access.
//!
//! This module provides a trait-based abstraction over graph databases,
//! enabling the same ingestion and query code to work with different
//! backends (Neo4j, PostgreSQL + Apache AGE).
//!
//! # Architecture
//!
//! - [`CypherExecutor`] - Execute Cypher queries (required for all graph backends)
//! - [`Transaction`] - Session lifecycle (commit/rollback)
//! - [`GraphClient`] - Connection pool, sessions and shutdown
//! - [`Backend`] - Opening a client from a [`Config`](crate::config::Config)
//!
//! # Usage
//!
//! ```ignore
//! use retrieval_datastore::graph::{GraphClient, QueryExt, Transaction};
//!
//! let session = client.begin().await?;
//! session
//!     .query("UNWIND $rows AS row MERGE (n:Amenity {id: row.id}) SET n = row")
//!     .param("rows", rows)
//!     .run()
//!     .await?;
//! session.commit().await?;
//!
//! let rows = client
//!     .query("MATCH (a:Amenity) RETURN count(a) AS count")
//!     .fetch_all()
//!     .await?;
//! ```

mod cypher;
mod macros;
mod query;
mod row;
mod traits;

pub mod backends;

#[cfg(test)]
pub(crate) mod testing;

pub use backends::Backend;
pub use cypher::{extract_return_columns, ParseError};
pub use query::{Query, QueryExt};
pub use row::{Params, Row, RowStream};
pub use traits::{CypherExecutor, GraphClient, Transaction};

// Re-export macro (defined at crate root via #[macro_export])
#[doc(inline)]
pub use crate::cypher;
