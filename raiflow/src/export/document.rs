//! The JSON document sent to governance destinations.

use super::ExportConfig;
use crate::errors::ExportError;
use crate::evidence::{AssessmentRef, Evidence, EvidencePayload, EvidenceType, Provenance};
use crate::pipeline::RunStatus;
use crate::report::{ManifestEntry, Report, ReportSummary};
use crate::utils::{format_rfc3339_millis, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Document type tag.
pub const DOCUMENT_TYPE: &str = "assessments";

/// Source block identifying the producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Producer name.
    pub source: String,
    /// Producer version.
    pub version: String,
}

/// One exported evidence item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedEvidence {
    /// Evidence id.
    pub id: String,
    /// Type tag.
    #[serde(rename = "type")]
    pub evidence_type: EvidenceType,
    /// Producing assessment.
    pub assessment: AssessmentRef,
    /// Typed payload.
    pub evidence: EvidencePayload,
    /// Additional labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Provenance metadata.
    pub provenance: Provenance,
    /// RFC 3339 production time.
    pub timestamp: String,
}

impl From<&Evidence> for ExportedEvidence {
    fn from(evidence: &Evidence) -> Self {
        Self {
            id: evidence.id().to_string(),
            evidence_type: evidence.evidence_type(),
            assessment: evidence.assessment().clone(),
            evidence: evidence.payload().clone(),
            labels: evidence.labels().clone(),
            provenance: evidence.provenance().clone(),
            timestamp: format_rfc3339_millis(&evidence.provenance().produced_at),
        }
    }
}

/// A report rendered for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Always [`DOCUMENT_TYPE`].
    #[serde(rename = "$type")]
    pub doc_type: String,
    /// Governance tenant, when the destination has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Run id.
    pub run_id: String,
    /// Id of the run this one retried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<String>,
    /// Report fingerprint; the idempotency key.
    pub fingerprint: String,
    /// Run status.
    pub status: RunStatus,
    /// Run start.
    pub started_at: Timestamp,
    /// Run end.
    pub completed_at: Timestamp,
    /// Targeted use case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_case_id: Option<String>,
    /// Targeted policy pack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_pack_id: Option<String>,
    /// Producer metadata.
    pub metadata: SourceMetadata,
    /// Manifest counts.
    pub summary: ReportSummary,
    /// Per-pair manifest.
    pub manifest: Vec<ManifestEntry>,
    /// Evidence in canonical order.
    pub evidences: Vec<ExportedEvidence>,
}

impl ExportDocument {
    /// Renders `report` for a destination.
    #[must_use]
    pub fn build(report: &Report, config: &ExportConfig, tenant: Option<String>) -> Self {
        Self {
            doc_type: DOCUMENT_TYPE.to_string(),
            tenant,
            run_id: report.run_id().to_string(),
            retry_of: report.retry_of().map(ToString::to_string),
            fingerprint: report.fingerprint().to_string(),
            status: report.status(),
            started_at: report.started_at(),
            completed_at: report.completed_at(),
            use_case_id: config.use_case_id.clone(),
            policy_pack_id: config.policy_pack_id.clone(),
            metadata: SourceMetadata {
                source: config.source.clone(),
                version: config.source_version.clone(),
            },
            summary: report.summary(),
            manifest: report.manifest().to_vec(),
            evidences: report.evidence().iter().map(ExportedEvidence::from).collect(),
        }
    }

    /// Serializes the document body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ExportError> {
        serde_json::to_vec(self).map_err(|e| ExportError::Serialization(e.to_string()))
    }

    /// Serializes the document for humans.
    pub fn to_pretty_json(&self) -> Result<String, ExportError> {
        serde_json::to_string_pretty(self).map_err(|e| ExportError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::match_assessments;
    use crate::pipeline::{ExecutorConfig, PipelineExecutor};
    use crate::registry::AssessmentRegistry;
    use crate::report::aggregate;
    use crate::testing::{fixtures, StaticAssessment};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn sample_report() -> Report {
        let registry = AssessmentRegistry::new();
        registry
            .register(Arc::new(StaticAssessment::metric("fairness", "1.0", 0.1)))
            .unwrap();
        let artifacts = fixtures::credit_artifacts().unwrap();
        let plan = match_assessments(&artifacts, &registry);
        let run = PipelineExecutor::new(ExecutorConfig::default())
            .execute(&plan, &artifacts)
            .await
            .unwrap();
        aggregate(run)
    }

    #[tokio::test]
    async fn test_document_shape() {
        let report = sample_report().await;
        let config = ExportConfig::new().with_policy_pack("pp-7");
        let document = ExportDocument::build(&report, &config, Some("acme".to_string()));
        let value: serde_json::Value = serde_json::from_slice(&document.to_bytes().unwrap()).unwrap();

        assert_eq!(value["$type"], "assessments");
        assert_eq!(value["tenant"], "acme");
        assert_eq!(value["fingerprint"], report.fingerprint());
        assert_eq!(value["policy_pack_id"], "pp-7");
        assert_eq!(value["metadata"]["source"], "raiflow");
        assert_eq!(value["evidences"][0]["type"], "metric");
        assert_eq!(value["evidences"][0]["evidence"]["data"]["type"], "fairness_score");
        assert!(value.get("use_case_id").is_none());
    }

    #[tokio::test]
    async fn test_document_roundtrip() {
        let report = sample_report().await;
        let document = ExportDocument::build(&report, &ExportConfig::new(), None);
        let parsed: ExportDocument = serde_json::from_slice(&document.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, document);
    }
}
