//! Datastore error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::BackendKind;
use crate::models::EntityId;

/// Errors surfaced by the datastore client and its components.
///
/// Nothing in this crate retries: every error reaches the caller, who owns
/// the retry policy.
#[derive(Error, Debug)]
pub enum DatastoreError {
    // Backend errors
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {message}")]
    Query { message: String, query: String },

    #[error("Write failed for {label} (ids {first_id}..={last_id}): {message}")]
    Write {
        label: String,
        first_id: EntityId,
        last_id: EntityId,
        message: String,
    },

    #[error("Write failed for {relationship} relationships: {message}")]
    RelationshipWrite {
        relationship: String,
        message: String,
    },

    // Dataset errors
    #[error("Dataset format error in {file} at row {row}, column '{column}': {message}")]
    DatasetFormat {
        file: String,
        row: u64,
        column: String,
        message: String,
    },

    #[error("Cannot read dataset {}: {source}", path.display())]
    DatasetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Lifecycle errors
    #[error("Unsupported backend: this client implements '{expected}' but config selects '{found}'")]
    UnsupportedBackend {
        expected: BackendKind,
        found: BackendKind,
    },

    #[error("Datastore is not ready. Call initialize_data first.")]
    NotReady,

    #[error("Datastore handle is closed")]
    ClosedHandle,

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DatastoreError {
    /// Wraps a failed batch write with the label and id range of the batch.
    ///
    /// Lifecycle and connection errors pass through unchanged.
    pub(crate) fn into_write(self, label: &str, first_id: EntityId, last_id: EntityId) -> Self {
        match self {
            err @ (DatastoreError::ClosedHandle | DatastoreError::Connection(_)) => err,
            err => DatastoreError::Write {
                label: label.to_string(),
                first_id,
                last_id,
                message: err.to_string(),
            },
        }
    }

    /// Wraps a failed relationship merge with the relationship type.
    ///
    /// Lifecycle and connection errors pass through unchanged.
    pub(crate) fn into_relationship_write(self, relationship: &str) -> Self {
        match self {
            err @ (DatastoreError::ClosedHandle | DatastoreError::Connection(_)) => err,
            err => DatastoreError::RelationshipWrite {
                relationship: relationship.to_string(),
                message: err.to_string(),
            },
        }
    }
}
