//! Graph initialization: batched node upserts followed by relationships.
//!
//! Every record becomes one node matched on `(label, id)`. Each batch is
//! committed in its own session, so a failure leaves earlier batches in
//! place and reports the id range of the batch that was rejected.

mod edges;

pub use edges::{flight_airport_edges, EdgeRule};

use crate::config::IngestConfig;
use crate::connection::ConnectionManager;
use crate::cypher;
use crate::dataset::Dataset;
use crate::error::DatastoreError;
use crate::graph::{GraphClient, QueryExt};
use crate::models::{GraphNode, KEY_PROPERTY};

/// Writes a [`Dataset`] into the graph.
#[derive(Debug, Clone)]
pub struct GraphInitializer {
    batch_size: usize,
    edges: Vec<EdgeRule>,
}

impl Default for GraphInitializer {
    fn default() -> Self {
        Self::new(&IngestConfig::default())
    }
}

impl GraphInitializer {
    pub fn new(config: &IngestConfig) -> Self {
        let edges = if config.link_flights_to_airports {
            flight_airport_edges()
        } else {
            Vec::new()
        };
        Self {
            batch_size: config.batch_size.max(1),
            edges,
        }
    }

    /// Replaces the relationship rules.
    pub fn with_edges(mut self, edges: Vec<EdgeRule>) -> Self {
        self.edges = edges;
        self
    }

    /// Upserts every record, then merges the relationships whose endpoint
    /// labels were both written by this call.
    ///
    /// Running it again with the same dataset leaves the graph unchanged.
    pub async fn initialize<C: GraphClient>(
        &self,
        connection: &ConnectionManager<C>,
        dataset: &Dataset,
    ) -> Result<(), DatastoreError> {
        let mut written = Vec::new();

        self.upsert_all(connection, &dataset.airports, &mut written).await?;
        self.upsert_all(connection, &dataset.amenities, &mut written).await?;
        self.upsert_all(connection, &dataset.flights, &mut written).await?;
        self.upsert_all(connection, &dataset.policies, &mut written).await?;

        for rule in self.edges.iter().filter(|rule| rule.applies_to(&written)) {
            let (prune, merge) = (rule.prune_cypher(), rule.cypher());
            connection
                .with_session(|session| async move {
                    session.query(&prune).run().await?;
                    session.query(&merge).run().await
                })
                .await
                .map_err(|e| e.into_relationship_write(rule.relationship))?;
            tracing::debug!(
                "Merged {} relationships ({} -> {})",
                rule.relationship,
                rule.from_label,
                rule.to_label
            );
        }

        Ok(())
    }

    async fn upsert_all<C: GraphClient, N: GraphNode>(
        &self,
        connection: &ConnectionManager<C>,
        records: &[N],
        written: &mut Vec<&'static str>,
    ) -> Result<(), DatastoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let statement =
            connection
                .client()?
                .upsert_nodes_cypher(N::LABEL, KEY_PROPERTY, N::COLUMNS);

        let mut batches = 0usize;
        for batch in records.chunks(self.batch_size) {
            let first_id = batch.first().map(N::id).unwrap_or_default();
            let last_id = batch.last().map(N::id).unwrap_or_default();

            let rows = batch
                .iter()
                .map(N::properties)
                .collect::<Result<Vec<_>, _>>()?;

            let statement = statement.as_str();
            connection
                .with_session(|session| async move {
                    cypher!(session, statement, rows = rows).run().await
                })
                .await
                .map_err(|e| e.into_write(N::LABEL, first_id, last_id))?;

            batches += 1;
            tracing::debug!(
                "Upserted {} batch {} (ids {}..={})",
                N::LABEL,
                batches,
                first_id,
                last_id
            );
        }

        tracing::info!(
            "Upserted {} {} nodes in {} batches",
            records.len(),
            N::LABEL,
            batches
        );
        written.push(N::LABEL);
        Ok(())
    }
}
