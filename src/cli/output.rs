//! Display formatting for analysis results and commit receipts.
//!
//! Pure formatting functions kept separate from the command modules so they
//! can be unit tested without a terminal.

use crate::scanner::{CanonicalResult, CommitOutcome, ProofReference, RiskLevel};

/// Returns an ANSI-colored risk badge matching the demo's verdict wording.
pub(crate) fn format_risk_badge(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::High => "\x1b[31mFRAUD DETECTED\x1b[0m",
        RiskLevel::Low => "\x1b[32mLEGITIMATE\x1b[0m",
    }
}

/// Formats the proof line shown under a result.
pub(crate) fn format_proof_line(proof: Option<&ProofReference>) -> String {
    match proof {
        Some(ProofReference::Recorded { tx_hash }) => {
            format!("Proof:  recorded on ledger ({tx_hash})")
        }
        Some(ProofReference::Pending {
            proof_hash,
            transaction_id,
        }) => match transaction_id {
            Some(id) => format!("Proof:  {proof_hash} (transaction {id}, not yet committed)"),
            None => format!("Proof:  {proof_hash} (not yet committed)"),
        },
        None => "Proof:  none".to_string(),
    }
}

/// Prints a normalized analysis result.
pub(crate) fn print_result(result: &CanonicalResult) {
    println!();
    println!("  {}", format_risk_badge(result.risk));
    println!("  Score:  {:.0} / 100", result.fraud_score);
    if result.sample_count > 1 {
        println!("  Samples: {}", result.sample_count);
    }
    println!("  {}", format_proof_line(result.proof.as_ref()));
    println!("  {}", result.message);
}

/// Prints the outcome of a commit operation.
pub(crate) fn print_commit_outcome(outcome: &CommitOutcome) {
    match outcome {
        CommitOutcome::AlreadyRecorded { tx_hash } => {
            println!("Already committed: {tx_hash}");
        }
        CommitOutcome::Committed { receipt } => {
            println!(
                "Committed in block {}: {}",
                receipt.block_number, receipt.tx_hash
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn risk_badges_carry_color_codes() {
        assert!(format_risk_badge(RiskLevel::High).contains("FRAUD DETECTED"));
        assert!(format_risk_badge(RiskLevel::High).starts_with("\x1b[31m"));
        assert!(format_risk_badge(RiskLevel::Low).starts_with("\x1b[32m"));
    }

    #[test]
    fn proof_line_variants() {
        assert_eq!(format_proof_line(None), "Proof:  none");
        let recorded = ProofReference::Recorded {
            tx_hash: "0xdead".to_string(),
        };
        assert!(format_proof_line(Some(&recorded)).contains("recorded on ledger"));
        let pending = ProofReference::Pending {
            proof_hash: "0xabc".to_string(),
            transaction_id: Some("tx-9".to_string()),
        };
        let line = format_proof_line(Some(&pending));
        assert!(line.contains("0xabc"));
        assert!(line.contains("tx-9"));
    }
}
