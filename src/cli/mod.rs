//! CLI module for the datastore.
//!
//! Subcommands:
//! - `init`: Load the configured datasets into the configured backend
//! - `validate`: Parse the configured datasets without connecting

mod init;
mod validate;

use clap::{Parser, Subcommand};

/// Retrieval Datastore - knowledge graph loader
#[derive(Parser)]
#[command(name = "datastore")]
#[command(about = "Load retrieval datasets into a graph backend")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load the datasets and initialize the graph
    Init,

    /// Parse the datasets and report record counts
    Validate,
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> color_eyre::Result<()> {
        match self.command {
            Command::Init => self.run_init().await,
            Command::Validate => self.run_validate().await,
        }
    }
}
