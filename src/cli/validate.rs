//! Validate command handler.

use color_eyre::Result;

use crate::config::Settings;
use crate::dataset;

use super::App;

impl App {
    /// Run the validate command: parse every configured dataset and report
    /// counts without touching the backend.
    pub async fn run_validate(&self) -> Result<()> {
        let settings = Settings::load()?;
        let paths = settings.dataset;

        let dataset = tokio::task::spawn_blocking(move || dataset::load(&paths)).await??;

        for (label, count) in dataset.counts() {
            println!("{:<10} {}", label, count);
        }
        tracing::info!("Datasets are valid");
        Ok(())
    }
}
