//! Per-pair records and the result of a run.

use super::{FailureRecord, InvalidTransition, PairStatus, RunStatus};
use crate::evidence::{AssessmentRef, Evidence};
use crate::matcher::{SkipReason, SkippedAssessment};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};

/// Lifecycle of one (assessment, artifacts) pair within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRecord {
    /// The assessment.
    pub assessment: AssessmentRef,
    /// Artifact ids, in slot order.
    pub artifact_ids: Vec<String>,
    status: PairStatus,
    /// Invocation id, set when the pair starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    /// Why the pair was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    /// Wall-clock duration of the invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Evidence items produced.
    #[serde(default)]
    pub evidence_count: usize,
}

impl PairRecord {
    /// Creates a pending record.
    #[must_use]
    pub fn new(assessment: AssessmentRef, artifact_ids: Vec<String>) -> Self {
        Self {
            assessment,
            artifact_ids,
            status: PairStatus::Pending,
            invocation_id: None,
            skip_reason: None,
            duration_ms: None,
            evidence_count: 0,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> PairStatus {
        self.status
    }

    /// Moves to `next`, rejecting regressions.
    pub fn transition(&mut self, next: PairStatus) -> Result<(), InvalidTransition> {
        if self.status.can_transition_to(next) {
            self.status = next;
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    /// Identity used to match pairs across runs.
    #[must_use]
    pub fn key(&self) -> (AssessmentRef, Vec<String>) {
        (self.assessment.clone(), self.artifact_ids.clone())
    }
}

/// Everything a run produced.
///
/// Handed by value to the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Run id.
    pub run_id: String,
    /// The run this one retried, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<String>,
    /// Final status.
    pub status: RunStatus,
    /// When execution began.
    pub started_at: Timestamp,
    /// When the last pair finished.
    pub completed_at: Timestamp,
    /// One record per planned pair, in plan order.
    pub pairs: Vec<PairRecord>,
    /// Valid evidence from succeeded pairs.
    pub evidence: Vec<Evidence>,
    /// One record per failed pair.
    pub failures: Vec<FailureRecord>,
    /// Assessments the matcher left out.
    pub skipped: Vec<SkippedAssessment>,
    /// Cancellation reason, if the run was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<String>,
}

impl RunResult {
    fn count(&self, status: PairStatus) -> usize {
        self.pairs.iter().filter(|p| p.status() == status).count()
    }

    /// Pairs that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(PairStatus::Succeeded)
    }

    /// Pairs that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(PairStatus::Failed)
    }

    /// Pairs that were skipped.
    #[must_use]
    pub fn skipped_pairs(&self) -> usize {
        self.count(PairStatus::Skipped)
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.is_some()
    }

    /// Recomputes [`RunResult::status`] from the pair records.
    pub fn refresh_status(&mut self) {
        self.status = RunStatus::from_counts(self.succeeded(), self.failed());
    }
}
