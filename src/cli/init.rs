//! Init command handler.

use color_eyre::Result;

use crate::client::create_with;
use crate::config::Settings;

use super::App;

impl App {
    /// Run the init command: connect, load every configured dataset and
    /// write it into the graph.
    pub async fn run_init(&self) -> Result<()> {
        let settings = Settings::load()?;
        tracing::info!(
            "Loaded configuration for {} backend",
            settings.datastore.kind()
        );

        let store = create_with(&settings.datastore, &settings.ingest).await?;

        let outcome = async {
            let dataset = store.load_dataset(&settings.dataset).await?;
            if dataset.is_empty() {
                tracing::warn!("No dataset paths configured; nothing to write");
            }
            store.initialize_data(&dataset).await?;

            for (label, count) in dataset.counts() {
                tracing::info!("{}: {} records", label, count);
            }
            Ok::<_, crate::error::DatastoreError>(())
        }
        .await;

        // Release the pool even when loading failed.
        let closed = store.close().await;
        outcome?;
        closed?;

        tracing::info!("Initialization complete");
        Ok(())
    }
}
