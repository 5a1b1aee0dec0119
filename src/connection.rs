//! Connection management: one backend client per configuration.
//!
//! [`ConnectionManager`] owns the pooled client, hands out sessions and
//! enforces the once-only close. The ingest and query paths go through it
//! and never see backend connection details.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::error::DatastoreError;
use crate::graph::{Backend, GraphClient, Transaction};

/// Owns a pooled graph client.
pub struct ConnectionManager<C: GraphClient> {
    client: C,
    closed: AtomicBool,
}

impl<C: Backend> ConnectionManager<C> {
    /// Opens the backend selected by `config` and verifies it is reachable.
    pub async fn open(config: &Config) -> Result<Self, DatastoreError> {
        let client = C::open(config).await?;
        tracing::info!("Connected to {} backend", C::KIND);
        Ok(Self::new(client))
    }
}

impl<C: GraphClient> ConnectionManager<C> {
    /// Wraps an already connected client.
    pub fn new(client: C) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The auto-commit executor.
    pub fn client(&self) -> Result<&C, DatastoreError> {
        if self.is_closed() {
            return Err(DatastoreError::ClosedHandle);
        }
        Ok(&self.client)
    }

    /// Begins a session on a pooled connection.
    ///
    /// Dropping the session unfinished, including when the owning future is
    /// cancelled, releases its connection and discards its writes.
    pub async fn acquire_session(&self) -> Result<C::Session, DatastoreError> {
        self.client()?.begin().await
    }

    /// Runs `f` in a fresh session, committing on `Ok` and rolling back on
    /// `Err`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// manager
    ///     .with_session(|session| async move {
    ///         session.query(&cypher).param("rows", rows).run().await
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_session<F, Fut, R>(&self, f: F) -> Result<R, DatastoreError>
    where
        F: FnOnce(Arc<C::Session>) -> Fut,
        Fut: Future<Output = Result<R, DatastoreError>>,
    {
        let session = Arc::new(self.acquire_session().await?);
        let outcome = f(Arc::clone(&session)).await;

        let session = Arc::try_unwrap(session).map_err(|_| {
            DatastoreError::Internal("session still referenced after its closure returned".into())
        })?;

        match outcome {
            Ok(value) => {
                session.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    tracing::warn!("Rollback after failed session also failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Releases the pooled connections.
    ///
    /// A second close fails with [`DatastoreError::ClosedHandle`].
    pub async fn close(&self) -> Result<(), DatastoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(DatastoreError::ClosedHandle);
        }
        self.client.close().await
    }
}
