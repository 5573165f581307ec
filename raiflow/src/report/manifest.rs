//! The run manifest: what ran, what failed, what was skipped and why.

use crate::evidence::AssessmentRef;
use crate::matcher::{SkipReason, SkippedAssessment};
use crate::pipeline::{FailureKind, FailureRecord, PairRecord, PairStatus};
use serde::{Deserialize, Serialize};

/// One manifest line: a planned pair, or an assessment the matcher skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The assessment.
    pub assessment: AssessmentRef,
    /// Artifact ids; empty for a skipped assessment.
    pub artifact_ids: Vec<String>,
    /// Final status.
    pub status: PairStatus,
    /// Evidence items produced.
    pub evidence_count: usize,
    /// Failure kind, for failed pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Skip reason, for skipped pairs and assessments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    /// Failure message or unmet requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Invocation duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ManifestEntry {
    pub(crate) fn from_pair(record: &PairRecord, failures: &[FailureRecord]) -> Self {
        let failure = failures
            .iter()
            .find(|f| f.assessment == record.assessment && f.artifact_ids == record.artifact_ids);
        Self {
            assessment: record.assessment.clone(),
            artifact_ids: record.artifact_ids.clone(),
            status: record.status(),
            evidence_count: record.evidence_count,
            failure: failure.map(|f| f.kind),
            skip_reason: record.skip_reason,
            detail: failure.map(|f| f.message.clone()),
            duration_ms: record.duration_ms,
        }
    }

    pub(crate) fn from_skipped(skipped: &SkippedAssessment) -> Self {
        Self {
            assessment: skipped.assessment.clone(),
            artifact_ids: Vec::new(),
            status: PairStatus::Skipped,
            evidence_count: 0,
            failure: None,
            skip_reason: Some(skipped.reason),
            detail: Some(skipped.detail.clone()),
            duration_ms: None,
        }
    }
}

/// Counts over the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Manifest entries.
    pub total: usize,
    /// Pairs that succeeded.
    pub succeeded: usize,
    /// Pairs that failed.
    pub failed: usize,
    /// Skipped pairs plus skipped assessments.
    pub skipped: usize,
    /// Evidence items.
    pub evidence: usize,
}

impl ReportSummary {
    pub(crate) fn from_manifest(manifest: &[ManifestEntry], evidence: usize) -> Self {
        let count = |s: PairStatus| manifest.iter().filter(|e| e.status == s).count();
        Self {
            total: manifest.len(),
            succeeded: count(PairStatus::Succeeded),
            failed: count(PairStatus::Failed),
            skipped: count(PairStatus::Skipped),
            evidence,
        }
    }
}
