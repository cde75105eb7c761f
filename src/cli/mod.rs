//! CLI interface for fraudscan

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod commit;
pub mod output;
pub mod run;
pub mod status;

/// fraudscan: client for the FraudProof Ledger detection demo
#[derive(Parser)]
#[command(name = "fraudscan")]
#[command(about = "Client for the FraudProof Ledger fraud-detection demo", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories
#[derive(Subcommand)]
pub enum Commands {
    /// Run a fraud analysis, optionally committing the proof
    Run(run::RunCommand),
    /// Commit a proof reference to the ledger directly
    Commit(commit::CommitCommand),
    /// Check connectivity to the detection service
    Status(status::StatusCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(run_cmd) => run_cmd.execute().await,
            Commands::Commit(commit_cmd) => commit_cmd.execute().await,
            Commands::Status(status_cmd) => status_cmd.execute().await,
        }
    }
}
