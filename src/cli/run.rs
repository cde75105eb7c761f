//! Run command - drives one analyze (and optionally commit) cycle.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use crate::cli::output;
use crate::config::ConfigManager;
use crate::scanner::{HttpBackend, Signal, TransactionCategory, WorkflowController};

/// Run command options - runs a fraud analysis against the detection service.
#[derive(Parser)]
pub struct RunCommand {
    /// Forced outcome signal: fraud or legit.
    #[arg(value_name = "SIGNAL")]
    pub signal: String,

    /// Transaction category: vehicle, bank, ecommerce, or ethereum
    /// (defaults to the configured category).
    #[arg(long)]
    pub category: Option<String>,

    /// Number of synthetic samples to score.
    #[arg(long, default_value = "1")]
    pub samples: u32,

    /// Also commit the resulting proof to the ledger.
    #[arg(long)]
    pub commit: bool,

    /// Detection service base URL (overrides settings and environment).
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
}

impl RunCommand {
    /// Executes one analysis cycle and renders the result.
    pub async fn execute(self) -> Result<()> {
        let config = ConfigManager::new();
        let base_url = match self.base_url {
            Some(url) => url,
            None => config.base_url()?,
        };
        debug!(base_url = %base_url, "Resolved detection service URL");

        let signal: Signal = self.signal.parse()?;
        let category: TransactionCategory = match self.category {
            Some(name) => name.parse()?,
            None => config.default_category()?,
        };

        let backend = HttpBackend::with_timeout(&base_url, config.timeout()?)?;
        let mut controller =
            WorkflowController::new(Box::new(backend)).with_policy(config.risk_policy()?);
        controller.select_category(category);
        controller.select_signal(signal);
        controller.set_num_samples(self.samples);

        println!("Broadcasting {signal} transaction ({category})...");
        let result = controller.run_analysis().await?;
        output::print_result(&result);

        if self.commit {
            println!();
            let outcome = controller.commit_proof().await?;
            output::print_commit_outcome(&outcome);
        }

        Ok(())
    }
}
