//! Workflow controller: the analyze/commit state machine.
//!
//! The controller owns the session and is the only writer to it. Callers
//! drive it through [`run_analysis`](WorkflowController::run_analysis),
//! [`commit_proof`](WorkflowController::commit_proof), and
//! [`retry`](WorkflowController::retry), and observe it through immutable
//! snapshots.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::scanner::backend::{AnalyzeRequest, CommitReceipt, CommitRequest, DetectionBackend};
use crate::scanner::error::ScanError;
use crate::scanner::normalize::{normalize, CanonicalResult, ProofReference, RiskPolicy};
use crate::scanner::session::{
    FailedOperation, Phase, SessionError, SessionSnapshot, SessionState, Signal,
    TransactionCategory,
};

/// Handle for an issued analyze request.
///
/// Carries the request's sequence number and the signal it was built with,
/// so a settle is matched against the request that produced it rather than
/// whatever the session holds by then.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnalysisTicket {
    seq: u64,
    signal: Signal,
}

/// Outcome of a commit operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// The service recorded the proof during analysis; no commit call was
    /// issued.
    AlreadyRecorded {
        /// Ledger transaction hash reported by the service.
        tx_hash: String,
    },
    /// The ledger accepted the proof.
    Committed {
        /// Receipt returned by the ledger service.
        receipt: CommitReceipt,
    },
}

/// Drives the two-phase analyze/commit workflow against a detection backend.
pub struct WorkflowController {
    backend: Box<dyn DetectionBackend>,
    session: SessionState,
    policy: RiskPolicy,
    num_samples: u32,
    /// Next sequence number to hand out.
    next_seq: u64,
    /// Sequence number whose settle may still be applied. Settles carrying
    /// any other number are stale and discarded (last-request-wins).
    current_seq: Option<u64>,
    /// Outcome of the live result's commit, kept for idempotent re-commit.
    commit_outcome: Option<CommitOutcome>,
}

impl WorkflowController {
    /// Creates a controller with the default category and risk policy.
    #[must_use]
    pub fn new(backend: Box<dyn DetectionBackend>) -> Self {
        Self {
            backend,
            session: SessionState::new(TransactionCategory::default()),
            policy: RiskPolicy::default(),
            num_samples: 1,
            next_seq: 0,
            current_seq: None,
            commit_outcome: None,
        }
    }

    /// Replaces the risk derivation policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RiskPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Selects the transaction category for subsequent runs.
    pub fn select_category(&mut self, category: TransactionCategory) {
        self.session.set_category(category);
    }

    /// Selects the forced outcome signal for subsequent runs.
    pub fn select_signal(&mut self, signal: Signal) {
        self.session.set_signal(signal);
    }

    /// Sets how many synthetic samples each analyze call requests.
    pub fn set_num_samples(&mut self, num_samples: u32) {
        self.num_samples = num_samples.max(1);
    }

    /// Immutable view of the session for rendering.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Runs one analysis cycle: validate, issue the request, normalize the
    /// response, and store the result.
    ///
    /// Fails synchronously with a validation error when no signal is
    /// selected (no network call is made) or while a request is already in
    /// flight.
    pub async fn run_analysis(&mut self) -> Result<CanonicalResult, ScanError> {
        let (ticket, request) = self.begin_analysis()?;
        let outcome = self.backend.analyze(&request).await;
        match self.settle_analysis(ticket, outcome)? {
            Some(result) => Ok(result),
            // Unreachable in the composed flow: nothing can issue a newer
            // request while this one holds the Running phase.
            None => Err(ScanError::Validation(
                "analysis was superseded by a newer request".to_string(),
            )),
        }
    }

    /// Validates the selection and moves to Running, returning the ticket
    /// and request for the caller to dispatch.
    ///
    /// The Running transition happens before any network activity so that
    /// observers see progress immediately.
    pub(crate) fn begin_analysis(
        &mut self,
    ) -> Result<(AnalysisTicket, AnalyzeRequest), ScanError> {
        let signal = self.session.signal().ok_or_else(|| {
            ScanError::Validation(
                "select a fraud or legitimate signal before running analysis".to_string(),
            )
        })?;

        match self.session.phase() {
            Phase::Running | Phase::Committing => {
                return Err(ScanError::Validation(
                    "a request is already in flight; wait for it to settle".to_string(),
                ));
            }
            Phase::Idle => {}
            // Quiescent states: restart the cycle from Idle.
            Phase::ResultReady | Phase::Committed | Phase::Error => {
                self.session.transition(Phase::Idle)?;
                self.session.clear_result();
                self.session.clear_error();
                self.commit_outcome = None;
            }
        }

        self.session.transition(Phase::Running)?;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.current_seq = Some(seq);

        let request = AnalyzeRequest::new(self.session.category(), signal, self.num_samples);
        info!(
            seq,
            category = %request.transaction_type,
            fraud_label = %request.fraud_label,
            "Analysis started"
        );

        Ok((AnalysisTicket { seq, signal }, request))
    }

    /// Applies the outcome of an analyze request.
    ///
    /// Returns `Ok(None)` when the ticket is stale (an earlier request's
    /// response arriving after a newer request began), in which case the
    /// session is left untouched. Responses are thereby applied in
    /// request-issue order, not response-arrival order.
    pub(crate) fn settle_analysis(
        &mut self,
        ticket: AnalysisTicket,
        outcome: Result<serde_json::Value, ScanError>,
    ) -> Result<Option<CanonicalResult>, ScanError> {
        if self.current_seq != Some(ticket.seq) {
            debug!(seq = ticket.seq, "Discarding stale analysis response");
            return Ok(None);
        }
        self.current_seq = None;

        let result = outcome.and_then(|payload| {
            normalize(&payload, Some(ticket.signal), &self.policy)
        });

        match result {
            Ok(result) => {
                info!(
                    seq = ticket.seq,
                    fraud_score = result.fraud_score,
                    risk = ?result.risk,
                    "Analysis complete"
                );
                self.session.store_result(result.clone());
                self.session.transition(Phase::ResultReady)?;
                Ok(Some(result))
            }
            Err(err) => {
                warn!(seq = ticket.seq, error = %err, "Analysis failed");
                self.session.record_error(SessionError {
                    message: err.to_string(),
                    operation: FailedOperation::Analysis,
                    retryable: err.is_retryable(),
                });
                self.session.transition(Phase::Error)?;
                Err(err)
            }
        }
    }

    /// Commits the live result's proof to the ledger.
    ///
    /// Idempotent: a result the service already recorded resolves without a
    /// network call, and a second invocation after a successful commit
    /// resolves immediately from the cached receipt. At most one commit
    /// call ever reaches the wire per result.
    pub async fn commit_proof(&mut self) -> Result<CommitOutcome, ScanError> {
        if self.session.phase() == Phase::Committed {
            return self.commit_outcome.clone().ok_or_else(|| {
                ScanError::Validation("no commit outcome recorded for this session".to_string())
            });
        }

        if self.session.phase() != Phase::ResultReady {
            return Err(ScanError::Validation(format!(
                "commit requires a completed analysis (phase is {})",
                self.session.phase()
            )));
        }

        let proof = self
            .session
            .last_result()
            .and_then(|r| r.proof.clone())
            .ok_or_else(|| {
                ScanError::CommitConflict(
                    "result carries no proof reference to commit".to_string(),
                )
            })?;

        match proof {
            ProofReference::Recorded { tx_hash } => {
                info!(tx_hash = %tx_hash, "Proof already recorded by the service");
                self.session.transition(Phase::Committing)?;
                self.session.transition(Phase::Committed)?;
                let outcome = CommitOutcome::AlreadyRecorded { tx_hash };
                self.commit_outcome = Some(outcome.clone());
                Ok(outcome)
            }
            ProofReference::Pending {
                proof_hash,
                transaction_id,
            } => {
                self.session.transition(Phase::Committing)?;
                let request = CommitRequest {
                    proof_hash,
                    transaction_id,
                };

                let commit_result = self.backend.commit(&request).await;
                match commit_result {
                    Ok(receipt) => {
                        info!(
                            block_number = receipt.block_number,
                            tx_hash = %receipt.tx_hash,
                            "Proof committed to ledger"
                        );
                        self.session.transition(Phase::Committed)?;
                        let outcome = CommitOutcome::Committed { receipt };
                        self.commit_outcome = Some(outcome.clone());
                        Ok(outcome)
                    }
                    Err(err) => {
                        warn!(error = %err, "Commit failed");
                        // The unsent commitment is never dropped: the result
                        // stays live and the operation remains retryable.
                        self.session.record_error(SessionError {
                            message: err.to_string(),
                            operation: FailedOperation::Commit,
                            retryable: true,
                        });
                        self.session.transition(Phase::Error)?;
                        Err(err)
                    }
                }
            }
        }
    }

    /// Recovers from the Error phase, returning to the phase the failed
    /// operation started from.
    ///
    /// Idempotent and input-device-agnostic: calling it outside the Error
    /// phase is a no-op.
    pub fn retry(&mut self) -> Result<(), ScanError> {
        if self.session.phase() != Phase::Error {
            return Ok(());
        }

        let origin = self
            .session
            .last_error()
            .map_or(FailedOperation::Analysis, |e| e.operation);

        match origin {
            FailedOperation::Analysis => self.session.transition(Phase::Idle)?,
            FailedOperation::Commit => self.session.transition(Phase::ResultReady)?,
        }
        self.session.clear_error();
        debug!(?origin, "Recovered from error phase");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::scanner::normalize::RiskLevel;
    use crate::scanner::test_utils::ScriptedBackend;
    use serde_json::json;

    fn controller_with(backend: ScriptedBackend) -> WorkflowController {
        WorkflowController::new(Box::new(backend))
    }

    #[tokio::test]
    async fn analysis_happy_path() {
        let backend = ScriptedBackend::new(vec![Ok(json!({
            "results": [{"fraud_score": 72, "database_id": 9}]
        }))]);
        let log = backend.request_log();
        let mut controller = controller_with(backend);
        controller.select_category(TransactionCategory::Bank);
        controller.select_signal(Signal::Fraud);

        let result = controller.run_analysis().await.unwrap();
        assert_eq!(result.fraud_score, 72.0);
        assert_eq!(result.risk, RiskLevel::High);

        let snap = controller.snapshot();
        assert_eq!(snap.phase, Phase::ResultReady);
        assert_eq!(snap.last_result.unwrap().sample_count, 1);

        let requests = log.analyzes();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].transaction_type, TransactionCategory::Bank);
        assert_eq!(requests[0].fraud_label, "fraud");
        assert_eq!(requests[0].num_samples, 1);
    }

    #[tokio::test]
    async fn missing_signal_never_reaches_the_network() {
        let backend = ScriptedBackend::new(vec![Ok(json!({"score": 10}))]);
        let log = backend.request_log();
        let mut controller = controller_with(backend);

        let err = controller.run_analysis().await.unwrap_err();
        assert!(matches!(err, ScanError::Validation(_)));
        assert_eq!(controller.snapshot().phase, Phase::Idle);
        assert_eq!(log.analyze_count(), 0);
    }

    #[test]
    fn begin_sets_running_synchronously() {
        let mut controller = controller_with(ScriptedBackend::new(vec![]));
        controller.select_signal(Signal::Legitimate);

        let (_, request) = controller.begin_analysis().unwrap();
        assert_eq!(controller.snapshot().phase, Phase::Running);
        assert_eq!(request.fraud_label, "non-fraud");
    }

    #[test]
    fn second_analysis_while_running_is_rejected() {
        let mut controller = controller_with(ScriptedBackend::new(vec![]));
        controller.select_signal(Signal::Fraud);

        let _ = controller.begin_analysis().unwrap();
        let err = controller.begin_analysis().unwrap_err();
        assert!(matches!(err, ScanError::Validation(_)));
        assert_eq!(controller.snapshot().phase, Phase::Running);
    }

    #[test]
    fn stale_settle_is_discarded_and_newer_result_kept() {
        let mut controller = controller_with(ScriptedBackend::new(vec![]));
        controller.select_signal(Signal::Legitimate);

        // First request times out; its response straggles in later.
        let (first, _) = controller.begin_analysis().unwrap();
        let err = controller
            .settle_analysis(first, Err(ScanError::Transport("timed out".to_string())))
            .unwrap_err();
        assert!(matches!(err, ScanError::Transport(_)));
        controller.retry().unwrap();

        let (second, _) = controller.begin_analysis().unwrap();
        let applied = controller
            .settle_analysis(second, Ok(json!({"score": 30})))
            .unwrap();
        assert!(applied.is_some());

        // The straggler from the first request must not overwrite anything.
        let stale = controller
            .settle_analysis(first, Ok(json!({"score": 99})))
            .unwrap();
        assert!(stale.is_none());
        let snap = controller.snapshot();
        assert_eq!(snap.phase, Phase::ResultReady);
        assert_eq!(snap.last_result.unwrap().fraud_score, 30.0);
    }

    #[tokio::test]
    async fn analysis_transport_failure_retains_no_partial_result() {
        let backend =
            ScriptedBackend::new(vec![Err(ScanError::Transport("connection refused".into()))]);
        let mut controller = controller_with(backend);
        controller.select_signal(Signal::Fraud);

        let err = controller.run_analysis().await.unwrap_err();
        assert!(matches!(err, ScanError::Transport(_)));

        let snap = controller.snapshot();
        assert_eq!(snap.phase, Phase::Error);
        assert!(snap.last_result.is_none());
        assert!(snap.last_error.unwrap().retryable);

        // Retry restarts the cycle from Idle.
        controller.retry().unwrap();
        assert_eq!(controller.snapshot().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn malformed_body_surfaces_normalization_error() {
        let backend = ScriptedBackend::new(vec![Ok(json!({"verdict": "fraud"}))]);
        let mut controller = controller_with(backend);
        controller.select_signal(Signal::Fraud);

        let err = controller.run_analysis().await.unwrap_err();
        assert!(matches!(err, ScanError::Normalization(_)));
        assert_eq!(controller.snapshot().phase, Phase::Error);
    }

    #[tokio::test]
    async fn commit_happy_path_then_cached_second_call() {
        let backend = ScriptedBackend::new(vec![Ok(json!({
            "score": 80,
            "proof_hash": "0xabc",
            "transaction_id": "tx-7"
        }))])
        .with_commit_responses(vec![Ok(CommitReceipt {
            block_number: 1234,
            tx_hash: "0xfeed".to_string(),
        })]);
        let log = backend.request_log();
        let mut controller = controller_with(backend);
        controller.select_signal(Signal::Fraud);
        controller.run_analysis().await.unwrap();

        let outcome = controller.commit_proof().await.unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Committed {
                receipt: CommitReceipt {
                    block_number: 1234,
                    tx_hash: "0xfeed".to_string(),
                }
            }
        );
        assert_eq!(controller.snapshot().phase, Phase::Committed);

        let commits = log.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].proof_hash, "0xabc");
        assert_eq!(commits[0].transaction_id.as_deref(), Some("tx-7"));

        // Second commit resolves from the cache; the wire sees nothing new.
        let again = controller.commit_proof().await.unwrap();
        assert_eq!(again, outcome);
        assert_eq!(log.commit_count(), 1);
    }

    #[tokio::test]
    async fn already_recorded_proof_skips_the_commit_call() {
        let backend = ScriptedBackend::new(vec![Ok(json!({
            "results": [{"fraud_score": 90, "blockchain_tx": "0xdead"}]
        }))]);
        let log = backend.request_log();
        let mut controller = controller_with(backend);
        controller.select_signal(Signal::Fraud);
        controller.run_analysis().await.unwrap();

        let outcome = controller.commit_proof().await.unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::AlreadyRecorded {
                tx_hash: "0xdead".to_string(),
            }
        );
        assert_eq!(controller.snapshot().phase, Phase::Committed);
        assert_eq!(log.commit_count(), 0);
    }

    #[tokio::test]
    async fn commit_without_proof_is_a_conflict() {
        let backend = ScriptedBackend::new(vec![Ok(json!({"score": 40}))]);
        let mut controller = controller_with(backend);
        controller.select_signal(Signal::Legitimate);
        controller.run_analysis().await.unwrap();

        let err = controller.commit_proof().await.unwrap_err();
        assert!(matches!(err, ScanError::CommitConflict(_)));
        // State untouched: the same record stays available.
        assert_eq!(controller.snapshot().phase, Phase::ResultReady);
    }

    #[tokio::test]
    async fn commit_failure_keeps_result_for_retry() {
        let backend = ScriptedBackend::new(vec![Ok(json!({
            "score": 80,
            "proof_hash": "0xabc"
        }))])
        .with_commit_responses(vec![
            Err(ScanError::Transport("ledger unreachable".into())),
            Ok(CommitReceipt {
                block_number: 42,
                tx_hash: "0xbeef".to_string(),
            }),
        ]);
        let mut controller = controller_with(backend);
        controller.select_signal(Signal::Fraud);
        controller.run_analysis().await.unwrap();

        let err = controller.commit_proof().await.unwrap_err();
        assert!(matches!(err, ScanError::Transport(_)));

        let snap = controller.snapshot();
        assert_eq!(snap.phase, Phase::Error);
        // The result is retained so a retry can reuse the same record.
        assert!(snap.last_result.is_some());

        controller.retry().unwrap();
        assert_eq!(controller.snapshot().phase, Phase::ResultReady);

        let outcome = controller.commit_proof().await.unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed { .. }));
        assert_eq!(controller.snapshot().phase, Phase::Committed);
    }

    #[tokio::test]
    async fn commit_before_analysis_is_rejected() {
        let mut controller = controller_with(ScriptedBackend::new(vec![]));
        let err = controller.commit_proof().await.unwrap_err();
        assert!(matches!(err, ScanError::Validation(_)));
    }

    #[tokio::test]
    async fn new_cycle_replaces_the_previous_result() {
        let backend = ScriptedBackend::new(vec![
            Ok(json!({"score": 90, "proof_hash": "0x1"})),
            Ok(json!({"score": 10})),
        ]);
        let mut controller = controller_with(backend);
        controller.select_signal(Signal::Fraud);
        controller.run_analysis().await.unwrap();
        assert_eq!(
            controller.snapshot().last_result.unwrap().fraud_score,
            90.0
        );

        controller.select_signal(Signal::Legitimate);
        let result = controller.run_analysis().await.unwrap();
        assert_eq!(result.fraud_score, 10.0);
        assert_eq!(result.risk, RiskLevel::Low);
    }

    #[test]
    fn retry_outside_error_phase_is_a_no_op() {
        let mut controller = controller_with(ScriptedBackend::new(vec![]));
        controller.retry().unwrap();
        assert_eq!(controller.snapshot().phase, Phase::Idle);
    }
}
