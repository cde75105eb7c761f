//! Result normalization: raw transport payloads to canonical records.
//!
//! The detection service has shipped three response generations; callers
//! should never need to know which one answered. All three decode through a
//! single untagged serde union and collapse into [`CanonicalResult`].
//!
//! Everything here is pure: no I/O, no session access beyond the values
//! passed in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scanner::error::ScanError;
use crate::scanner::session::Signal;

/// Two-way risk classification shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Fraud detected.
    High,
    /// Transaction appears legitimate.
    Low,
}

impl RiskLevel {
    /// Validates a transport-supplied risk label.
    ///
    /// The service historically emitted a four-way scale; HIGH and CRITICAL
    /// collapse to [`RiskLevel::High`], LOW and MEDIUM to [`RiskLevel::Low`].
    /// Anything else is treated as absent so the caller falls back to the
    /// derivation rule; levels are never taken from the trust boundary
    /// unvalidated.
    #[must_use]
    pub fn from_transport(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "HIGH" | "CRITICAL" => Some(RiskLevel::High),
            "LOW" | "MEDIUM" => Some(RiskLevel::Low),
            _ => None,
        }
    }
}

/// Risk derivation policy applied when the transport supplies no usable
/// risk level.
///
/// The boundary behaviour has shifted across service revisions, so it is
/// configuration rather than code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Score above which a transaction is classified High.
    pub threshold: f64,
    /// Whether a score exactly at the threshold is High (`>=`) or Low (`>`).
    pub inclusive: bool,
    /// Whether a forced Fraud signal classifies High regardless of score.
    ///
    /// Some service variants return scores inconsistent with the requested
    /// signal; the demo intentionally biases toward the requested ground
    /// truth.
    pub signal_override: bool,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            threshold: 50.0,
            inclusive: false,
            signal_override: true,
        }
    }
}

impl RiskPolicy {
    /// Classifies a normalized score under this policy.
    #[must_use]
    pub fn classify(&self, fraud_score: f64, signal: Option<Signal>) -> RiskLevel {
        let over = if self.inclusive {
            fraud_score >= self.threshold
        } else {
            fraud_score > self.threshold
        };
        let forced = self.signal_override && signal == Some(Signal::Fraud);
        if over || forced {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }
}

/// Opaque reference to the proof backing a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProofReference {
    /// The service already wrote the proof to the ledger; committing again
    /// would duplicate it.
    Recorded {
        /// Ledger transaction hash assigned by the service.
        tx_hash: String,
    },
    /// Commit-eligible: the proof exists only in the service's own store.
    Pending {
        /// Proof hash (or joined set of persisted-record identifiers).
        proof_hash: String,
        /// Transaction identifier to carry on the commit request, if known.
        transaction_id: Option<String>,
    },
}

/// Normalized, shape-independent representation of an analyze response.
///
/// Created once per completed analyze call and fully replaced (never
/// mutated) by the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalResult {
    /// Fraud score in [0, 100].
    pub fraud_score: f64,
    /// Derived or validated risk classification.
    pub risk: RiskLevel,
    /// Proof reference, when the service persisted one.
    pub proof: Option<ProofReference>,
    /// Number of underlying samples the score was aggregated over (>= 1).
    pub sample_count: u32,
    /// Human-readable summary.
    pub message: String,
}

// ── Raw transport shapes ─────────────────────────────────────────────

/// One scored sample inside a `results` array.
#[derive(Debug, Deserialize)]
struct RawSample {
    fraud_score: f64,
    #[serde(default)]
    risk_level: Option<String>,
    #[serde(default)]
    database_id: Option<i64>,
    #[serde(default)]
    blockchain_tx: Option<String>,
}

/// Batch shape: aggregated multi-sample runs.
#[derive(Debug, Deserialize)]
struct RawBatch {
    results: Vec<RawSample>,
    total_samples: u32,
}

/// Single-item wrapper shape: a one-element `results` array.
#[derive(Debug, Deserialize)]
struct RawWrapper {
    results: Vec<RawSample>,
}

/// Flat shape: a single result at the top level.
#[derive(Debug, Deserialize)]
struct RawFlat {
    score: f64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    proof_hash: Option<String>,
    #[serde(default)]
    risk_level: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
}

/// The three response generations, discriminated structurally.
///
/// Variant order matters for untagged deserialization: a batch payload also
/// satisfies the wrapper shape, so `Batch` (which requires `total_samples`)
/// must be tried first. `Flat` requires `score` and cannot collide with
/// either.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawResponse {
    Batch(RawBatch),
    Wrapper(RawWrapper),
    Flat(RawFlat),
}

// ── Normalization ────────────────────────────────────────────────────

/// Maps a raw analyze payload into a [`CanonicalResult`].
///
/// `signal` is the operator's forced signal for the run; `policy` governs
/// risk derivation when the payload carries no usable risk level.
pub fn normalize(
    payload: &Value,
    signal: Option<Signal>,
    policy: &RiskPolicy,
) -> Result<CanonicalResult, ScanError> {
    let raw: RawResponse = serde_json::from_value(payload.clone()).map_err(|e| {
        ScanError::Normalization(format!("payload matches no supported response shape: {e}"))
    })?;

    match raw {
        RawResponse::Flat(flat) => normalize_flat(flat, signal, policy),
        RawResponse::Wrapper(wrapper) => normalize_wrapper(wrapper, signal, policy),
        RawResponse::Batch(batch) => normalize_batch(batch, signal, policy),
    }
}

fn normalize_flat(
    flat: RawFlat,
    signal: Option<Signal>,
    policy: &RiskPolicy,
) -> Result<CanonicalResult, ScanError> {
    let fraud_score = rescale_score(flat.score)?;
    let risk = resolve_risk(flat.risk_level.as_deref(), fraud_score, signal, policy);
    let proof = flat.proof_hash.map(|proof_hash| ProofReference::Pending {
        proof_hash,
        transaction_id: flat.transaction_id,
    });

    Ok(CanonicalResult {
        fraud_score,
        risk,
        proof,
        sample_count: 1,
        message: flat.message.unwrap_or_else(|| default_message(risk)),
    })
}

fn normalize_wrapper(
    wrapper: RawWrapper,
    signal: Option<Signal>,
    policy: &RiskPolicy,
) -> Result<CanonicalResult, ScanError> {
    let first = wrapper
        .results
        .into_iter()
        .next()
        .ok_or_else(|| ScanError::Normalization("results array is empty".to_string()))?;

    let fraud_score = rescale_score(first.fraud_score)?;
    let risk = resolve_risk(first.risk_level.as_deref(), fraud_score, signal, policy);
    let proof = sample_proof(&first);

    Ok(CanonicalResult {
        fraud_score,
        risk,
        proof,
        sample_count: 1,
        message: default_message(risk),
    })
}

fn normalize_batch(
    batch: RawBatch,
    signal: Option<Signal>,
    policy: &RiskPolicy,
) -> Result<CanonicalResult, ScanError> {
    if batch.results.is_empty() {
        return Err(ScanError::Normalization(
            "batch results array is empty".to_string(),
        ));
    }
    if batch.total_samples == 0 {
        return Err(ScanError::Normalization(
            "total_samples must be at least 1".to_string(),
        ));
    }

    let mut sum = 0.0;
    for sample in &batch.results {
        sum += rescale_score(sample.fraud_score)?;
    }
    let fraud_score = sum / batch.results.len() as f64;

    // Risk comes from the first element's explicit level when present;
    // the aggregate score only feeds the derivation fallback.
    let explicit = batch.results[0].risk_level.as_deref();
    let risk = resolve_risk(explicit, fraud_score, signal, policy);

    let identifiers: Vec<String> = batch
        .results
        .iter()
        .filter_map(|s| {
            s.blockchain_tx
                .clone()
                .or_else(|| s.database_id.map(|id| id.to_string()))
        })
        .collect();
    let proof = if identifiers.is_empty() {
        None
    } else {
        Some(ProofReference::Pending {
            proof_hash: identifiers.join(","),
            transaction_id: None,
        })
    };

    Ok(CanonicalResult {
        fraud_score,
        risk,
        proof,
        sample_count: batch.total_samples,
        message: default_message(risk),
    })
}

/// Proof reference for a single wrapped sample.
///
/// A `blockchain_tx` means the service auto-committed server-side; a bare
/// `database_id` is a commit-eligible persisted record.
fn sample_proof(sample: &RawSample) -> Option<ProofReference> {
    if let Some(tx_hash) = &sample.blockchain_tx {
        return Some(ProofReference::Recorded {
            tx_hash: tx_hash.clone(),
        });
    }
    sample.database_id.map(|id| ProofReference::Pending {
        proof_hash: id.to_string(),
        transaction_id: None,
    })
}

/// Brings a raw score into the canonical [0, 100] range.
///
/// Values in [0, 1] are treated as fractional probabilities and rescaled;
/// everything else is clamped. Non-finite scores are rejected.
fn rescale_score(raw: f64) -> Result<f64, ScanError> {
    if !raw.is_finite() {
        return Err(ScanError::Normalization(format!(
            "fraud score is not a finite number: {raw}"
        )));
    }
    let score = if (0.0..=1.0).contains(&raw) {
        raw * 100.0
    } else {
        raw
    };
    Ok(score.clamp(0.0, 100.0))
}

fn resolve_risk(
    explicit: Option<&str>,
    fraud_score: f64,
    signal: Option<Signal>,
    policy: &RiskPolicy,
) -> RiskLevel {
    explicit
        .and_then(RiskLevel::from_transport)
        .unwrap_or_else(|| policy.classify(fraud_score, signal))
}

/// Summary used when the service supplied none, matching the wording the
/// demo has always shown.
fn default_message(risk: RiskLevel) -> String {
    match risk {
        RiskLevel::High => "High probability of fraud.".to_string(),
        RiskLevel::Low => "Transaction appears safe.".to_string(),
    }
}
