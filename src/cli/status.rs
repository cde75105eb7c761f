//! Status command - probes the detection service's health endpoint.

use anyhow::Result;
use clap::Parser;

use crate::config::ConfigManager;
use crate::scanner::HttpBackend;

/// Status command options - checks connectivity to the detection service.
#[derive(Parser)]
pub struct StatusCommand {
    /// Detection service base URL (overrides settings and environment).
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
}

impl StatusCommand {
    /// Probes the service and prints its banner.
    pub async fn execute(self) -> Result<()> {
        let config = ConfigManager::new();
        let base_url = match self.base_url {
            Some(url) => url,
            None => config.base_url()?,
        };

        let backend = HttpBackend::with_timeout(&base_url, config.timeout()?)?;
        let info = backend.health().await?;

        println!("Status:  {}", info.status);
        if let Some(service) = &info.service {
            println!("Service: {service}");
        }
        if !info.supported_types.is_empty() {
            println!("Types:   {}", info.supported_types.join(", "));
        }
        if let Some(threshold) = info.fraud_threshold {
            println!("Server fraud threshold: {threshold}");
        }
        if let Some(timestamp) = info.timestamp {
            println!("Server time: {timestamp}");
        }
        Ok(())
    }
}
