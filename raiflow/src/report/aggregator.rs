//! Aggregating a run into a fingerprinted report.

use super::{ManifestEntry, ReportSummary};
use crate::errors::EvidenceValidationError;
use crate::evidence::{Evidence, EvidenceType};
use crate::pipeline::{FailureRecord, RunResult, RunStatus};
use crate::utils::{sha256_hex, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The aggregated, order-independent result of a run.
///
/// Built only by [`EvidenceAggregator::aggregate`]; fields are read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry_of: Option<String>,
    status: RunStatus,
    started_at: Timestamp,
    completed_at: Timestamp,
    fingerprint: String,
    summary: ReportSummary,
    manifest: Vec<ManifestEntry>,
    evidence: Vec<Evidence>,
    failures: Vec<FailureRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cancelled: Option<String>,
}

impl Report {
    /// Id of the aggregated run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Id of the run this one retried.
    #[must_use]
    pub fn retry_of(&self) -> Option<&str> {
        self.retry_of.as_deref()
    }

    /// Final run status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// When the run started.
    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// When the run completed.
    #[must_use]
    pub fn completed_at(&self) -> Timestamp {
        self.completed_at
    }

    /// SHA-256 over the canonical evidence content.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Manifest counts.
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        self.summary
    }

    /// One entry per pair and per skipped assessment.
    #[must_use]
    pub fn manifest(&self) -> &[ManifestEntry] {
        &self.manifest
    }

    /// Evidence in canonical order.
    #[must_use]
    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    /// Failure records.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Cancellation reason, if the run was cancelled.
    #[must_use]
    pub fn cancelled(&self) -> Option<&str> {
        self.cancelled.as_deref()
    }

    /// Evidence of one type.
    pub fn evidence_of_type(&self, evidence_type: EvidenceType) -> impl Iterator<Item = &Evidence> {
        self.evidence.iter().filter(move |e| e.evidence_type() == evidence_type)
    }

    /// Evidence produced by one assessment.
    pub fn evidence_for(&self, assessment: &str) -> impl Iterator<Item = &'_ Evidence> + '_ {
        let assessment = assessment.to_string();
        self.evidence.iter().filter(move |e| e.assessment().name == assessment)
    }

    /// Re-checks every payload and the fingerprint.
    pub fn validate(&self) -> Result<(), EvidenceValidationError> {
        for (i, evidence) in self.evidence.iter().enumerate() {
            evidence.payload().validate().map_err(|e| {
                EvidenceValidationError::for_field(format!("evidence[{i}]"), e.to_string())
            })?;
        }
        let expected = fingerprint(&self.evidence);
        if expected != self.fingerprint {
            return Err(EvidenceValidationError::for_field(
                "fingerprint",
                format!("expected {expected}, found {}", self.fingerprint),
            ));
        }
        Ok(())
    }
}

/// Sorts evidence into canonical order: artifact ids, then assessment name
/// and version, then canonical content.
pub fn sort_evidence(evidence: &mut Vec<Evidence>) {
    let mut keyed: Vec<(String, Evidence)> = evidence
        .drain(..)
        .map(|e| (e.canonical_content(), e))
        .collect();
    keyed.sort_by(|(ca, a), (cb, b)| {
        a.artifact_ids()
            .cmp(b.artifact_ids())
            .then_with(|| a.assessment().cmp(b.assessment()))
            .then_with(|| ca.cmp(cb))
    });
    evidence.extend(keyed.into_iter().map(|(_, e)| e));
}

/// SHA-256 over the canonical content of `evidence` in canonical order.
///
/// Independent of the input order, invocation ids and timestamps.
#[must_use]
pub fn fingerprint(evidence: &[Evidence]) -> String {
    let mut sorted = evidence.to_vec();
    sort_evidence(&mut sorted);
    fingerprint_sorted(&sorted)
}

/// Fingerprint of evidence already in canonical order.
fn fingerprint_sorted(sorted: &[Evidence]) -> String {
    let contents: Vec<String> = sorted.iter().map(Evidence::canonical_content).collect();
    sha256_hex(format!("[{}]", contents.join(",")).as_bytes())
}

/// Turns run results into reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidenceAggregator;

impl EvidenceAggregator {
    /// Creates an aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Aggregates a run. Always succeeds, even for a fully failed run.
    #[must_use]
    pub fn aggregate(&self, run: RunResult) -> Report {
        let RunResult {
            run_id,
            retry_of,
            status,
            started_at,
            completed_at,
            pairs,
            mut evidence,
            failures,
            skipped,
            cancelled,
        } = run;

        sort_evidence(&mut evidence);
        let fingerprint = fingerprint_sorted(&evidence);

        let mut manifest: Vec<ManifestEntry> = pairs
            .iter()
            .map(|p| ManifestEntry::from_pair(p, &failures))
            .chain(skipped.iter().map(ManifestEntry::from_skipped))
            .collect();
        manifest.sort_by(|a, b| {
            a.assessment
                .cmp(&b.assessment)
                .then_with(|| a.artifact_ids.cmp(&b.artifact_ids))
        });
        let summary = ReportSummary::from_manifest(&manifest, evidence.len());

        debug!(run_id = %run_id, entries = manifest.len(), "Manifest built");
        info!(
            run_id = %run_id,
            status = %status,
            fingerprint = %fingerprint,
            evidence = summary.evidence,
            failed = summary.failed,
            skipped = summary.skipped,
            "Report aggregated"
        );

        Report {
            run_id,
            retry_of,
            status,
            started_at,
            completed_at,
            fingerprint,
            summary,
            manifest,
            evidence,
            failures,
            cancelled,
        }
    }
}

/// Aggregates a run with the default aggregator.
#[must_use]
pub fn aggregate(run: RunResult) -> Report {
    EvidenceAggregator::new().aggregate(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{AssessmentRef, EvidenceDraft, Provenance};
    use crate::matcher::{SkipReason, SkippedAssessment};
    use crate::pipeline::{FailureKind, PairRecord, PairStatus};
    use crate::utils::now_utc;
    use pretty_assertions::assert_eq;

    fn evidence(assessment: &str, artifact: &str, value: f64, invocation: &str) -> Evidence {
        Evidence::from_draft(
            EvidenceDraft::metric("score", value),
            AssessmentRef::new(assessment, "1.0"),
            Provenance {
                artifact_ids: vec![artifact.to_string()],
                invocation_id: invocation.to_string(),
                produced_at: now_utc(),
            },
            0,
        )
        .unwrap()
    }

    fn run(evidence: Vec<Evidence>) -> RunResult {
        RunResult {
            run_id: "run-1".to_string(),
            retry_of: None,
            status: RunStatus::Complete,
            started_at: now_utc(),
            completed_at: now_utc(),
            pairs: Vec::new(),
            evidence,
            failures: Vec::new(),
            skipped: Vec::new(),
            cancelled: None,
        }
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = evidence("fairness", "dataset:x:1", 0.1, "i1");
        let b = evidence("privacy", "dataset:x:1", 0.2, "i2");
        let c = evidence("fairness", "dataset:a:2", 0.3, "i3");

        let forward = aggregate(run(vec![a.clone(), b.clone(), c.clone()]));
        let backward = aggregate(run(vec![c, b, a]));
        assert_eq!(forward.fingerprint(), backward.fingerprint());
        assert_eq!(forward.evidence(), backward.evidence());
        assert_eq!(forward.evidence()[0].artifact_ids(), &["dataset:a:2".to_string()]);
    }

    #[test]
    fn test_fingerprint_ignores_invocation_details() {
        let first = aggregate(run(vec![evidence("fairness", "d", 0.1, "i1")]));
        let second = aggregate(run(vec![evidence("fairness", "d", 0.1, "i9")]));
        assert_eq!(first.fingerprint(), second.fingerprint());

        let changed = aggregate(run(vec![evidence("fairness", "d", 0.2, "i1")]));
        assert_ne!(first.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn test_manifest_for_failed_run() {
        let mut failed = PairRecord::new(AssessmentRef::new("fairness", "1.0"), vec!["d".to_string()]);
        failed.transition(PairStatus::Running).unwrap();
        failed.transition(PairStatus::Failed).unwrap();

        let mut result = run(Vec::new());
        result.status = RunStatus::Failed;
        result.pairs = vec![failed];
        result.failures = vec![FailureRecord::new(
            AssessmentRef::new("fairness", "1.0"),
            vec!["d".to_string()],
            FailureKind::Timeout,
            "exceeded timeout of 10 ms",
        )];
        result.skipped = vec![SkippedAssessment {
            assessment: AssessmentRef::new("privacy", "1.0"),
            reason: SkipReason::CapabilityUnmet,
            detail: "training: dataset, role=training".to_string(),
        }];

        let report = aggregate(result);
        assert_eq!(report.status(), RunStatus::Failed);
        assert_eq!(
            report.summary(),
            ReportSummary {
                total: 2,
                succeeded: 0,
                failed: 1,
                skipped: 1,
                evidence: 0,
            }
        );
        assert_eq!(report.manifest()[0].failure, Some(FailureKind::Timeout));
        assert_eq!(report.manifest()[1].skip_reason, Some(SkipReason::CapabilityUnmet));
        assert!(report.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_tampering() {
        let report = aggregate(run(vec![evidence("fairness", "d", 0.1, "i1")]));
        assert!(report.validate().is_ok());

        let mut value = serde_json::to_value(&report).unwrap();
        value["evidence"][0]["evidence"]["data"]["value"] = serde_json::json!(0.9);
        let tampered: Report = serde_json::from_value(value).unwrap();
        let err = tampered.validate().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("fingerprint"));
    }

    #[test]
    fn test_free_fingerprint_matches_report() {
        let items = vec![evidence("b", "d", 1.0, "i1"), evidence("a", "d", 2.0, "i2")];
        let report = aggregate(run(items.clone()));
        assert_eq!(fingerprint(&items), report.fingerprint());
    }
}
