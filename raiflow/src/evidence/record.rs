//! Evidence records and the drafts assessments return.

use super::{
    EvidencePayload, EvidenceType, FigurePayload, MetricPayload, ModelProfilerPayload,
    ProfilerPayload, TablePayload,
};
use crate::errors::EvidenceValidationError;
use crate::utils::{canonical_json, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of an assessment: name plus version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssessmentRef {
    /// Assessment name.
    pub name: String,
    /// Assessment version.
    pub version: String,
}

impl AssessmentRef {
    /// Creates an assessment reference.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for AssessmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl PartialOrd for AssessmentRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AssessmentRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| crate::registry::compare_versions(&self.version, &other.version))
    }
}

/// Evidence as returned by an assessment, before provenance is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDraft {
    /// The typed payload.
    pub payload: EvidencePayload,
    /// Additional labels, e.g. `sensitive_feature = gender`.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl EvidenceDraft {
    /// Creates a draft from a payload.
    #[must_use]
    pub fn new(payload: EvidencePayload) -> Self {
        Self {
            payload,
            labels: BTreeMap::new(),
        }
    }

    /// A metric draft.
    #[must_use]
    pub fn metric(metric_type: impl Into<String>, value: f64) -> Self {
        Self::new(EvidencePayload::Metric(MetricPayload {
            metric_type: metric_type.into(),
            value,
            subtype: None,
            dataset_variant: None,
        }))
    }

    /// A table draft.
    #[must_use]
    pub fn table(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self::new(EvidencePayload::Table(TablePayload {
            name: name.into(),
            columns,
            rows,
        }))
    }

    /// A data profile draft.
    #[must_use]
    pub fn profiler(results: BTreeMap<String, Value>) -> Self {
        Self::new(EvidencePayload::Profiler(ProfilerPayload { results }))
    }

    /// A model profile draft.
    #[must_use]
    pub fn model_profiler(
        model_name: impl Into<String>,
        parameters: BTreeMap<String, Value>,
        feature_names: Vec<String>,
    ) -> Self {
        Self::new(EvidencePayload::ModelProfiler(ModelProfilerPayload {
            model_name: model_name.into(),
            parameters,
            feature_names,
        }))
    }

    /// A figure draft.
    #[must_use]
    pub fn figure(name: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(EvidencePayload::Figure(FigurePayload {
            name: name.into(),
            description: None,
            media_type: media_type.into(),
            data,
        }))
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Returns the type tag.
    #[must_use]
    pub fn evidence_type(&self) -> EvidenceType {
        self.payload.evidence_type()
    }
}

/// Where a piece of evidence came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Artifacts the invocation ran against, in slot order.
    pub artifact_ids: Vec<String>,
    /// The invocation that produced the evidence.
    pub invocation_id: String,
    /// When the invocation completed.
    pub produced_at: Timestamp,
}

/// A validated, immutable piece of evidence.
///
/// Fields are only readable. Evidence is built by the executor from an
/// [`EvidenceDraft`] after the payload passes validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    id: String,
    assessment: AssessmentRef,
    evidence: EvidencePayload,
    labels: BTreeMap<String, String>,
    provenance: Provenance,
}

impl Evidence {
    pub(crate) fn from_draft(
        draft: EvidenceDraft,
        assessment: AssessmentRef,
        provenance: Provenance,
        index: usize,
    ) -> Result<Self, EvidenceValidationError> {
        draft.payload.validate()?;
        Ok(Self {
            id: format!("{}-{index}", provenance.invocation_id),
            assessment,
            evidence: draft.payload,
            labels: draft.labels,
            provenance,
        })
    }

    /// Unique id: invocation id plus position.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The producing assessment.
    #[must_use]
    pub fn assessment(&self) -> &AssessmentRef {
        &self.assessment
    }

    /// The typed payload.
    #[must_use]
    pub fn payload(&self) -> &EvidencePayload {
        &self.evidence
    }

    /// The type tag.
    #[must_use]
    pub fn evidence_type(&self) -> EvidenceType {
        self.evidence.evidence_type()
    }

    /// Additional labels.
    #[must_use]
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Provenance metadata.
    #[must_use]
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Artifact ids the evidence is about.
    #[must_use]
    pub fn artifact_ids(&self) -> &[String] {
        &self.provenance.artifact_ids
    }

    /// The reproducible part of the evidence.
    ///
    /// Excludes the invocation id and timestamp, so re-running an assessment
    /// on unchanged artifacts yields equal content.
    #[must_use]
    pub fn content(&self) -> Value {
        serde_json::json!({
            "assessment": {
                "name": self.assessment.name,
                "version": self.assessment.version,
            },
            "artifact_ids": self.provenance.artifact_ids,
            "evidence": serde_json::to_value(&self.evidence).unwrap_or(Value::Null),
            "labels": self.labels,
        })
    }

    /// Canonical JSON of [`Evidence::content`].
    #[must_use]
    pub fn canonical_content(&self) -> String {
        canonical_json(&self.content())
    }
}
