//! Query builder for fluent Cypher query construction.

use futures::{StreamExt, TryStreamExt};
use serde::Serialize;

use crate::error::DatastoreError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::CypherExecutor;

/// A builder for constructing and executing Cypher queries.
///
/// `Query` provides a fluent API for adding parameters and executing
/// queries against any [`CypherExecutor`]. A parameter that fails to
/// serialize is reported when the query runs.
///
/// # Example
///
/// ```ignore
/// let rows = Query::new(&session, "MATCH (a:Amenity {id: $id}) RETURN properties(a) AS a")
///     .param("id", 35)
///     .fetch_all()
///     .await?;
/// ```
pub struct Query<'a, E: CypherExecutor + ?Sized> {
    executor: &'a E,
    cypher: String,
    params: Params,
    invalid: Option<DatastoreError>,
}

impl<'a, E: CypherExecutor + ?Sized> Query<'a, E> {
    /// Creates a new query builder.
    pub fn new(executor: &'a E, cypher: &str) -> Self {
        Self {
            executor,
            cypher: cypher.to_string(),
            params: Params::new(),
            invalid: None,
        }
    }

    /// Adds a parameter to the query.
    ///
    /// Parameters are referenced in Cypher using `$name` syntax.
    pub fn param<T: Serialize>(mut self, name: &str, value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(json_value) => {
                self.params.insert(name.to_string(), json_value);
            }
            Err(e) if self.invalid.is_none() => {
                self.invalid = Some(DatastoreError::Internal(format!(
                    "failed to serialize parameter '{}': {}",
                    name, e
                )));
            }
            Err(_) => {}
        }
        self
    }

    /// Adds every entry of an existing parameter map.
    pub fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    /// Executes the query and returns a stream of rows.
    pub async fn execute(self) -> Result<RowStream<'a>, DatastoreError> {
        if let Some(err) = self.invalid {
            return Err(err);
        }
        self.executor
            .execute_cypher(&self.cypher, self.params)
            .await
    }

    /// Executes the query and collects all rows into a vector.
    pub async fn fetch_all(self) -> Result<Vec<Row>, DatastoreError> {
        self.execute().await?.try_collect().await
    }

    /// Executes the query and returns the first row, if any.
    pub async fn fetch_one(self) -> Result<Option<Row>, DatastoreError> {
        let mut stream = self.execute().await?;
        stream.next().await.transpose()
    }

    /// Executes the query without returning results.
    pub async fn run(self) -> Result<(), DatastoreError> {
        if let Some(err) = self.invalid {
            return Err(err);
        }
        self.executor.run_cypher(&self.cypher, self.params).await
    }
}

/// Extension trait providing a convenient `query()` method.
///
/// Implemented for all [`CypherExecutor`] types, so sessions and clients
/// both support `executor.query("...")`.
pub trait QueryExt: CypherExecutor {
    /// Creates a new query builder for this executor.
    fn query(&self, cypher: &str) -> Query<'_, Self>
    where
        Self: Sized,
    {
        Query::new(self, cypher)
    }
}

impl<E: CypherExecutor> QueryExt for E {}
