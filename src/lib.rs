//! # fraudproof-scanner
//!
//! Client-side orchestration for the FraudProof Ledger fraud-detection demo.
//!
//! ## Features
//!
//! - Two-phase analyze/commit workflow with an explicit state machine
//! - Shape-tolerant normalization of detection service responses
//! - Configurable risk derivation policy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fraudproof_scanner::scanner::{HttpBackend, Signal, WorkflowController};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let backend = HttpBackend::new("http://localhost:8000/test")?;
//! let mut controller = WorkflowController::new(Box::new(backend));
//! controller.select_signal(Signal::Fraud);
//! let result = controller.run_analysis().await?;
//! println!("score: {}", result.fraud_score);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod scanner;

pub use crate::cli::Cli;

/// The current version of fraudproof-scanner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
