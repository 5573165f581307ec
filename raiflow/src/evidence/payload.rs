//! Evidence payload variants and their schemas.

use crate::errors::EvidenceValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The type tag of an evidence payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    /// A single named metric value.
    Metric,
    /// A named table.
    Table,
    /// A free-form data profile.
    Profiler,
    /// A description of a model.
    ModelProfiler,
    /// An encoded image.
    Figure,
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "metric"),
            Self::Table => write!(f, "table"),
            Self::Profiler => write!(f, "profiler"),
            Self::ModelProfiler => write!(f, "model_profiler"),
            Self::Figure => write!(f, "figure"),
        }
    }
}

/// A metric value, e.g. `accuracy_score = 0.91`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPayload {
    /// Metric identifier.
    #[serde(rename = "type")]
    pub metric_type: String,
    /// Metric value; must be finite.
    pub value: f64,
    /// Metric family refinement, e.g. `disaggregated`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Dataset variant the metric was computed on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_variant: Option<String>,
}

/// A named table with homogeneous rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePayload {
    /// Table name.
    pub name: String,
    /// Column names.
    pub columns: Vec<String>,
    /// Rows, each `columns.len()` wide.
    pub rows: Vec<Vec<Value>>,
}

/// A free-form profile of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerPayload {
    /// Profile results.
    pub results: BTreeMap<String, Value>,
}

/// A description of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfilerPayload {
    /// Model name.
    pub model_name: String,
    /// Hyperparameters.
    pub parameters: BTreeMap<String, Value>,
    /// Feature names.
    pub feature_names: Vec<String>,
}

/// An encoded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigurePayload {
    /// Figure title.
    pub name: String,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Media type, e.g. `image/png`.
    pub media_type: String,
    /// Raw image bytes, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// A typed evidence payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EvidencePayload {
    /// See [`MetricPayload`].
    Metric(MetricPayload),
    /// See [`TablePayload`].
    Table(TablePayload),
    /// See [`ProfilerPayload`].
    Profiler(ProfilerPayload),
    /// See [`ModelProfilerPayload`].
    ModelProfiler(ModelProfilerPayload),
    /// See [`FigurePayload`].
    Figure(FigurePayload),
}

impl EvidencePayload {
    /// Returns the type tag.
    #[must_use]
    pub fn evidence_type(&self) -> EvidenceType {
        match self {
            Self::Metric(_) => EvidenceType::Metric,
            Self::Table(_) => EvidenceType::Table,
            Self::Profiler(_) => EvidenceType::Profiler,
            Self::ModelProfiler(_) => EvidenceType::ModelProfiler,
            Self::Figure(_) => EvidenceType::Figure,
        }
    }

    /// Checks the payload against the schema for its type.
    pub fn validate(&self) -> Result<(), EvidenceValidationError> {
        match self {
            Self::Metric(m) => {
                require_non_empty("type", &m.metric_type)?;
                if !m.value.is_finite() {
                    return Err(EvidenceValidationError::for_field("value", "must be finite"));
                }
                Ok(())
            }
            Self::Table(t) => {
                require_non_empty("name", &t.name)?;
                if t.columns.is_empty() {
                    return Err(EvidenceValidationError::for_field("columns", "must not be empty"));
                }
                let unique: BTreeSet<&String> = t.columns.iter().collect();
                if unique.len() != t.columns.len() {
                    return Err(EvidenceValidationError::for_field("columns", "must be unique"));
                }
                if let Some((i, row)) = t.rows.iter().enumerate().find(|(_, r)| r.len() != t.columns.len()) {
                    return Err(EvidenceValidationError::for_field(
                        format!("rows[{i}]"),
                        format!("has {} cells, expected {}", row.len(), t.columns.len()),
                    ));
                }
                Ok(())
            }
            Self::Profiler(p) => {
                if p.results.is_empty() {
                    return Err(EvidenceValidationError::for_field("results", "must not be empty"));
                }
                Ok(())
            }
            Self::ModelProfiler(p) => {
                require_non_empty("model_name", &p.model_name)?;
                if p.feature_names.is_empty() {
                    return Err(EvidenceValidationError::for_field(
                        "feature_names",
                        "must not be empty",
                    ));
                }
                Ok(())
            }
            Self::Figure(fig) => {
                require_non_empty("name", &fig.name)?;
                if !fig.media_type.starts_with("image/") {
                    return Err(EvidenceValidationError::for_field(
                        "media_type",
                        format!("'{}' is not an image type", fig.media_type),
                    ));
                }
                if fig.data.is_empty() {
                    return Err(EvidenceValidationError::for_field("data", "must not be empty"));
                }
                Ok(())
            }
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), EvidenceValidationError> {
    if value.trim().is_empty() {
        Err(EvidenceValidationError::for_field(field, "must not be empty"))
    } else {
        Ok(())
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
