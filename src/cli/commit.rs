//! Commit command - submits a proof reference to the ledger directly.

use anyhow::Result;
use clap::Parser;

use crate::config::ConfigManager;
use crate::scanner::{CommitRequest, DetectionBackend, HttpBackend};

/// Commit command options - records an already-analyzed proof on the ledger.
#[derive(Parser)]
pub struct CommitCommand {
    /// Proof hash from a previous analysis.
    #[arg(value_name = "PROOF_HASH")]
    pub proof_hash: String,

    /// Transaction identifier, if the analysis reported one.
    #[arg(long)]
    pub transaction_id: Option<String>,

    /// Detection service base URL (overrides settings and environment).
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
}

impl CommitCommand {
    /// Executes the commit and prints the ledger receipt.
    pub async fn execute(self) -> Result<()> {
        let config = ConfigManager::new();
        let base_url = match self.base_url {
            Some(url) => url,
            None => config.base_url()?,
        };

        let backend = HttpBackend::with_timeout(&base_url, config.timeout()?)?;
        let request = CommitRequest {
            proof_hash: self.proof_hash,
            transaction_id: self.transaction_id,
        };

        let receipt = backend.commit(&request).await?;
        println!(
            "Committed in block {}: {}",
            receipt.block_number, receipt.tx_hash
        );
        Ok(())
    }
}
