//! Session state owned by the workflow controller.
//!
//! The session is single-owner: it is mutated only through the operations on
//! [`WorkflowController`](crate::scanner::controller::WorkflowController),
//! and rendering layers receive immutable [`SessionSnapshot`] values instead
//! of touching it directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::scanner::error::ScanError;
use crate::scanner::normalize::CanonicalResult;

/// Transaction domain the operator selected for the test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionCategory {
    /// Vehicle insurance claims.
    #[default]
    Vehicle,
    /// Bank account transactions.
    Bank,
    /// E-commerce purchases.
    Ecommerce,
    /// Ledger-native (Ethereum) transactions.
    Ethereum,
}

impl TransactionCategory {
    /// Wire name used by the detection service.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionCategory::Vehicle => "vehicle",
            TransactionCategory::Bank => "bank",
            TransactionCategory::Ecommerce => "ecommerce",
            TransactionCategory::Ethereum => "ethereum",
        }
    }
}

impl fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionCategory {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vehicle" => Ok(TransactionCategory::Vehicle),
            "bank" => Ok(TransactionCategory::Bank),
            "ecommerce" => Ok(TransactionCategory::Ecommerce),
            "ethereum" | "eth" => Ok(TransactionCategory::Ethereum),
            other => Err(ScanError::Validation(format!(
                "unknown transaction category '{other}' (expected vehicle, bank, ecommerce, or ethereum)"
            ))),
        }
    }
}

/// Forced outcome signal: the operator's expected ground truth for the run.
///
/// Used both as the requested test input and as a classification override
/// (see [`RiskPolicy`](crate::scanner::normalize::RiskPolicy)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Expect the service to score this run as fraudulent.
    Fraud,
    /// Expect the service to score this run as legitimate.
    Legitimate,
}

impl Signal {
    /// Label used in the analyze request's `fraud_label` field.
    #[must_use]
    pub fn wire_label(self) -> &'static str {
        match self {
            Signal::Fraud => "fraud",
            Signal::Legitimate => "non-fraud",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Fraud => f.write_str("fraud"),
            Signal::Legitimate => f.write_str("legitimate"),
        }
    }
}

impl FromStr for Signal {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fraud" => Ok(Signal::Fraud),
            "legit" | "legitimate" | "non-fraud" => Ok(Signal::Legitimate),
            other => Err(ScanError::Validation(format!(
                "unknown signal '{other}' (expected fraud or legit)"
            ))),
        }
    }
}

/// Workflow phase. Transitions only through [`Phase::can_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No analysis in flight and no unconsumed result.
    Idle,
    /// An analyze request is outstanding.
    Running,
    /// A normalized result is available.
    ResultReady,
    /// A commit request is outstanding.
    Committing,
    /// The proof has been recorded on the ledger.
    Committed,
    /// The last operation failed; see the session's error record.
    Error,
}

impl Phase {
    /// Whether `next` is a legal successor of `self`.
    ///
    /// Idle, Committed, and Error are stable quiescent states; there is no
    /// terminal state since the operator may always restart the cycle.
    #[must_use]
    pub fn can_transition(self, next: Phase) -> bool {
        use Phase::{Committed, Committing, Error, Idle, ResultReady, Running};
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, ResultReady | Error)
                | (ResultReady, Committing | Idle)
                | (Committing, Committed | Error)
                | (Committed, Idle)
                | (Error, Idle | ResultReady)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::ResultReady => "result-ready",
            Phase::Committing => "committing",
            Phase::Committed => "committed",
            Phase::Error => "error",
        };
        f.write_str(label)
    }
}

/// Which operation produced the session's error record.
///
/// Consumed by `retry` to decide which phase to return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedOperation {
    /// `run_analysis` failed; retry restarts from Idle.
    Analysis,
    /// `commit_proof` failed; retry returns to ResultReady with the
    /// result retained.
    Commit,
}

/// Description of the most recent failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionError {
    /// Human-readable failure message, as surfaced to the operator.
    pub message: String,
    /// The operation that failed.
    pub operation: FailedOperation,
    /// Whether re-invoking the operation can succeed without new input.
    pub retryable: bool,
}

/// Mutable workflow session, owned by the controller.
#[derive(Debug)]
pub struct SessionState {
    category: TransactionCategory,
    signal: Option<Signal>,
    phase: Phase,
    last_result: Option<CanonicalResult>,
    last_error: Option<SessionError>,
}

impl SessionState {
    /// Creates a fresh session in the Idle phase.
    #[must_use]
    pub fn new(category: TransactionCategory) -> Self {
        Self {
            category,
            signal: None,
            phase: Phase::Idle,
            last_result: None,
            last_error: None,
        }
    }

    /// Currently selected transaction category.
    #[must_use]
    pub fn category(&self) -> TransactionCategory {
        self.category
    }

    /// Currently selected forced signal, if any.
    #[must_use]
    pub fn signal(&self) -> Option<Signal> {
        self.signal
    }

    /// Current workflow phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The last normalized result, if one is live.
    #[must_use]
    pub fn last_result(&self) -> Option<&CanonicalResult> {
        self.last_result.as_ref()
    }

    /// The most recent failure record, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub(crate) fn set_category(&mut self, category: TransactionCategory) {
        self.category = category;
    }

    pub(crate) fn set_signal(&mut self, signal: Signal) {
        self.signal = Some(signal);
    }

    /// Moves to `next`, rejecting transitions outside the table.
    pub(crate) fn transition(&mut self, next: Phase) -> Result<(), ScanError> {
        if !self.phase.can_transition(next) {
            return Err(ScanError::Validation(format!(
                "illegal phase transition {} -> {}",
                self.phase, next
            )));
        }
        self.phase = next;
        Ok(())
    }

    /// Stores a fresh result, replacing (never mutating) the previous one.
    pub(crate) fn store_result(&mut self, result: CanonicalResult) {
        self.last_result = Some(result);
        self.last_error = None;
    }

    pub(crate) fn record_error(&mut self, error: SessionError) {
        self.last_error = Some(error);
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Drops the live result when a new analysis cycle begins.
    pub(crate) fn clear_result(&mut self) {
        self.last_result = None;
    }

    /// Immutable view for rendering layers.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            category: self.category,
            signal: self.signal,
            phase: self.phase,
            last_result: self.last_result.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Immutable point-in-time view of the session, safe to hand to renderers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Selected transaction category.
    pub category: TransactionCategory,
    /// Selected forced signal, if any.
    pub signal: Option<Signal>,
    /// Phase at snapshot time.
    pub phase: Phase,
    /// The live result, if any.
    pub last_result: Option<CanonicalResult>,
    /// The most recent failure, if any.
    pub last_error: Option<SessionError>,
}
