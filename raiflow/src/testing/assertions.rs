//! Assertions over runs and evidence.

use crate::evidence::{Evidence, EvidencePayload};
use crate::pipeline::{FailureKind, PairStatus, RunResult};

/// Returns the value of the first metric of `metric_type`.
#[must_use]
pub fn find_metric(evidence: &[Evidence], metric_type: &str) -> Option<f64> {
    evidence.iter().find_map(|e| match e.payload() {
        EvidencePayload::Metric(m) if m.metric_type == metric_type => Some(m.value),
        _ => None,
    })
}

/// Asserts every pair of `assessment` ended in `status`.
///
/// # Panics
///
/// Panics if no pair matches or any has another status.
pub fn assert_pair_status(run: &RunResult, assessment: &str, status: PairStatus) {
    let pairs: Vec<_> = run.pairs.iter().filter(|p| p.assessment.name == assessment).collect();
    assert!(!pairs.is_empty(), "no pairs for assessment '{assessment}'");
    for pair in pairs {
        assert_eq!(
            pair.status(),
            status,
            "pair {} on {:?} is {}, expected {status}",
            pair.assessment,
            pair.artifact_ids,
            pair.status()
        );
    }
}

/// Asserts `assessment` failed with `kind`.
///
/// # Panics
///
/// Panics if there is no such failure record.
pub fn assert_failed_with(run: &RunResult, assessment: &str, kind: FailureKind) {
    assert!(
        run.failures
            .iter()
            .any(|f| f.assessment.name == assessment && f.kind == kind),
        "expected '{assessment}' to fail with {kind}, failures: {:?}",
        run.failures
    );
}
