//! Configuration management for the scanner settings file.
//!
//! Settings live in `~/.fraudscan/settings.json`. Everything is optional;
//! missing values fall back to the defaults the demo shipped with, and
//! `FRAUDSCAN_BASE_URL` overrides the configured service URL.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::scanner::{RiskPolicy, TransactionCategory};

/// Base URL used when neither the environment nor the settings file
/// provides one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/test";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding the service base URL.
pub const BASE_URL_ENV: &str = "FRAUDSCAN_BASE_URL";

/// Scanner settings file contents.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScannerSettings {
    /// Detection service base URL.
    #[serde(default, rename = "baseUrl")]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default, rename = "timeoutSecs")]
    pub timeout_secs: Option<u64>,

    /// Category preselected when a session starts.
    #[serde(default, rename = "defaultCategory")]
    pub default_category: Option<String>,

    /// Risk derivation policy overrides.
    #[serde(default)]
    pub risk: Option<RiskPolicyConfig>,
}

/// Risk policy overrides; unset fields keep their defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RiskPolicyConfig {
    /// Score above which a transaction is classified High.
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Whether a score exactly at the threshold counts as High.
    #[serde(default)]
    pub inclusive: Option<bool>,

    /// Whether a forced Fraud signal overrides the numeric score.
    #[serde(default, rename = "signalOverride")]
    pub signal_override: Option<bool>,
}

/// Manager for the scanner settings file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    settings_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self {
            settings_path: Self::default_settings_path(),
        }
    }
}

impl ConfigManager {
    /// Creates a manager pointing at the default settings location.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager with a custom settings path (used in testing).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            settings_path: path,
        }
    }

    /// Returns the default settings path (~/.fraudscan/settings.json).
    #[must_use]
    pub fn default_settings_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fraudscan")
            .join("settings.json")
    }

    /// Loads settings, returning defaults when the file does not exist.
    pub fn load_settings(&self) -> Result<ScannerSettings> {
        if !self.settings_path.exists() {
            return Ok(ScannerSettings::default());
        }

        let content = std::fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings file: {:?}", self.settings_path))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {:?}", self.settings_path))
    }

    /// Saves settings, creating parent directories as needed.
    pub fn save_settings(&self, settings: &ScannerSettings) -> Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;

        std::fs::write(&self.settings_path, content)
            .with_context(|| format!("Failed to write settings file: {:?}", self.settings_path))?;

        Ok(())
    }

    /// Resolves the service base URL: environment first, then the settings
    /// file, then the built-in default.
    pub fn base_url(&self) -> Result<String> {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            return Ok(url);
        }
        let settings = self.load_settings()?;
        Ok(settings
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()))
    }

    /// Resolves the request timeout.
    pub fn timeout(&self) -> Result<Duration> {
        let settings = self.load_settings()?;
        Ok(Duration::from_secs(
            settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        ))
    }

    /// Resolves the category preselected at session start.
    pub fn default_category(&self) -> Result<TransactionCategory> {
        let settings = self.load_settings()?;
        match settings.default_category {
            Some(name) => name
                .parse()
                .with_context(|| format!("Invalid defaultCategory in settings: {name}")),
            None => Ok(TransactionCategory::default()),
        }
    }

    /// Resolves the risk derivation policy.
    pub fn risk_policy(&self) -> Result<RiskPolicy> {
        let settings = self.load_settings()?;
        let mut policy = RiskPolicy::default();
        if let Some(overrides) = settings.risk {
            if let Some(threshold) = overrides.threshold {
                policy.threshold = threshold;
            }
            if let Some(inclusive) = overrides.inclusive {
                policy.inclusive = inclusive;
            }
            if let Some(signal_override) = overrides.signal_override {
                policy.signal_override = signal_override;
            }
        }
        Ok(policy)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("settings.json"));

        let settings = manager.load_settings().unwrap();
        assert!(settings.base_url.is_none());
        assert_eq!(manager.timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(
            manager.default_category().unwrap(),
            TransactionCategory::Vehicle
        );
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("nested").join("settings.json"));

        let settings = ScannerSettings {
            base_url: Some("http://10.0.0.5:8000/test".to_string()),
            timeout_secs: Some(5),
            default_category: Some("ethereum".to_string()),
            risk: Some(RiskPolicyConfig {
                threshold: Some(60.0),
                inclusive: Some(true),
                signal_override: Some(false),
            }),
        };
        manager.save_settings(&settings).unwrap();

        assert_eq!(manager.timeout().unwrap(), Duration::from_secs(5));
        assert_eq!(
            manager.default_category().unwrap(),
            TransactionCategory::Ethereum
        );
        let policy = manager.risk_policy().unwrap();
        assert_eq!(policy.threshold, 60.0);
        assert!(policy.inclusive);
        assert!(!policy.signal_override);
    }

    #[test]
    fn partial_risk_overrides_keep_remaining_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("settings.json"));
        manager
            .save_settings(&ScannerSettings {
                risk: Some(RiskPolicyConfig {
                    threshold: Some(75.0),
                    ..RiskPolicyConfig::default()
                }),
                ..ScannerSettings::default()
            })
            .unwrap();

        let policy = manager.risk_policy().unwrap();
        assert_eq!(policy.threshold, 75.0);
        assert!(!policy.inclusive);
        assert!(policy.signal_override);
    }

    #[test]
    fn invalid_default_category_is_reported() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("settings.json"));
        manager
            .save_settings(&ScannerSettings {
                default_category: Some("casino".to_string()),
                ..ScannerSettings::default()
            })
            .unwrap();

        assert!(manager.default_category().is_err());
    }
}
