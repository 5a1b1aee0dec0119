//! Row and streaming types for query results.

use std::collections::HashMap;
use std::pin::Pin;

use futures::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::DatastoreError;

/// Parameters for Cypher queries.
///
/// A map of parameter names to JSON values; backends translate the values
/// into their native parameter types.
pub type Params = HashMap<String, JsonValue>;

/// A stream of rows from a query result.
///
/// Rows are fetched on demand, not loaded all at once.
pub type RowStream<'a> = Pin<Box<dyn Stream<Item = Result<Row, DatastoreError>> + Send + 'a>>;

/// A single result record: column names mapped to JSON values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    data: HashMap<String, JsonValue>,
}

impl Row {
    /// Creates a new row from a map of column names to values.
    pub fn new(data: HashMap<String, JsonValue>) -> Self {
        Self { data }
    }

    /// Gets a value from the row by column name, deserializing to the requested type.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count: i64 = row.get("count")?;
    /// let amenity: Amenity = row.get("a")?;
    /// ```
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, DatastoreError> {
        let value = self
            .data
            .get(key)
            .ok_or_else(|| DatastoreError::Internal(format!("column not found: {}", key)))?;
        decode(key, value)
    }

    /// Gets a value from the row, returning `None` if the key is missing or null.
    ///
    /// Still returns an error if the key exists but deserialization fails.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DatastoreError> {
        match self.data.get(key) {
            Some(v) if v.is_null() => Ok(None),
            Some(v) => decode(key, v).map(Some),
            None => Ok(None),
        }
    }

    /// Returns all column names in this row.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consumes the row and returns the underlying data map.
    pub fn into_inner(self) -> HashMap<String, JsonValue> {
        self.data
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: &JsonValue) -> Result<T, DatastoreError> {
    serde_json::from_value(value.clone())
        .map_err(|e| DatastoreError::Internal(format!("failed to deserialize '{}': {}", key, e)))
}

impl From<HashMap<String, JsonValue>> for Row {
    fn from(data: HashMap<String, JsonValue>) -> Self {
        Self::new(data)
    }
}
