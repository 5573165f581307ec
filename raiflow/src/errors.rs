//! Error types for the raiflow orchestration core.
//!
//! Errors are split by where they surface:
//!
//! - setup errors ([`ArtifactError`], [`RegistryError`]) are raised before a
//!   run starts and abort it;
//! - assessment errors ([`AssessmentError`]) are returned by plugins and
//!   recorded as pair failures, never propagated;
//! - export errors ([`ExportError`]) surface after retries are exhausted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for raiflow operations.
#[derive(Debug, Error)]
pub enum RaiflowError {
    /// An artifact could not be wrapped or used.
    #[error("{0}")]
    Artifact(#[from] ArtifactError),

    /// A registry operation failed.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// Evidence failed schema validation.
    #[error("{0}")]
    Evidence(#[from] EvidenceValidationError),

    /// Export to a governance destination failed.
    #[error("{0}")]
    Export(#[from] ExportError),

    /// A pair status regression was attempted.
    #[error("{0}")]
    Transition(#[from] crate::pipeline::InvalidTransition),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RaiflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl RaiflowError {
    /// Returns true if this error is raised before a run starts.
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        matches!(self, Self::Artifact(_) | Self::Registry(_))
    }
}

/// Structured metadata about an error for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "RAI-002-DUPLICATE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Errors raised while wrapping or assembling artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    /// The raw object is neither model-like nor dataset-like.
    #[error("Unsupported artifact kind for '{name}': {reason}")]
    UnsupportedArtifactKind {
        /// Name reported by the raw object.
        name: String,
        /// Why no kind could be inferred.
        reason: String,
    },

    /// The same artifact was supplied twice to one run.
    #[error("Artifact '{id}' supplied more than once")]
    DuplicateArtifact {
        /// The duplicated artifact id.
        id: String,
    },

    /// The raw object changed after it was wrapped.
    #[error("Artifact '{id}' changed after wrapping; wrap it again")]
    StaleArtifact {
        /// The stale artifact id.
        id: String,
    },

    /// A plan references an artifact the run was not given.
    #[error("Artifact '{id}' is not part of this run")]
    UnknownArtifact {
        /// The missing artifact id.
        id: String,
    },
}

impl ArtifactError {
    /// Returns structured diagnostics for this error.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        match self {
            Self::UnsupportedArtifactKind { name, .. } => {
                ContractErrorInfo::new("RAI-001-UNSUPPORTED_KIND", self.to_string())
                    .with_fix_hint("Pass a kind hint or expose an inference operation or columns.")
                    .with_context_entry("artifact", name.clone())
            }
            Self::DuplicateArtifact { id } => {
                ContractErrorInfo::new("RAI-003-DUPLICATE_ARTIFACT", self.to_string())
                    .with_fix_hint("Assessment and training datasets must be distinct objects.")
                    .with_context_entry("artifact", id.clone())
            }
            Self::StaleArtifact { id } => {
                ContractErrorInfo::new("RAI-004-STALE_ARTIFACT", self.to_string())
                    .with_context_entry("artifact", id.clone())
            }
            Self::UnknownArtifact { id } => {
                ContractErrorInfo::new("RAI-005-UNKNOWN_ARTIFACT", self.to_string())
                    .with_context_entry("artifact", id.clone())
            }
        }
    }
}

/// Errors raised by the assessment registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An assessment with the same name and version is already registered.
    #[error("Assessment '{name}' version '{version}' is already registered")]
    DuplicateAssessment {
        /// Assessment name.
        name: String,
        /// Assessment version.
        version: String,
    },

    /// A requested assessment is not registered.
    #[error("Assessment '{name}'{} is not registered", version_suffix(.version))]
    AssessmentNotFound {
        /// Assessment name.
        name: String,
        /// Requested version, if pinned.
        version: Option<String>,
    },

    /// The assessment definition is malformed.
    #[error("Invalid assessment definition '{name}': {reason}")]
    InvalidDefinition {
        /// Assessment name as given.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The process-wide registry has not been initialized.
    #[error("Assessment registry is not initialized")]
    NotInitialized,
}

impl RegistryError {
    /// Returns structured diagnostics for this error.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        let code = match self {
            Self::DuplicateAssessment { .. } => "RAI-002-DUPLICATE",
            Self::AssessmentNotFound { .. } => "RAI-006-NOT_FOUND",
            Self::InvalidDefinition { .. } => "RAI-007-INVALID_DEFINITION",
            Self::NotInitialized => "RAI-008-REGISTRY_UNINITIALIZED",
        };
        let info = ContractErrorInfo::new(code, self.to_string());
        match self {
            Self::DuplicateAssessment { .. } => {
                info.with_fix_hint("Bump the assessment version instead of re-registering it.")
            }
            Self::NotInitialized => info.with_fix_hint("Call init_global_registry() first."),
            _ => info,
        }
    }
}

/// Error returned by an assessment's `run`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssessmentError {
    /// The assessment failed internally.
    #[error("{0}")]
    Internal(String),

    /// The supplied parameters are not usable.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// An artifact lacked the data the assessment needed at run time.
    #[error("Artifact '{artifact}' cannot be used: {reason}")]
    UnusableArtifact {
        /// The artifact id.
        artifact: String,
        /// Why it could not be used.
        reason: String,
    },
}

impl AssessmentError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<anyhow::Error> for AssessmentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Error raised when an evidence payload does not match its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceValidationError {
    /// Error message.
    pub message: String,
    /// Field that caused the error, if applicable.
    pub field: Option<String>,
}

impl EvidenceValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl std::fmt::Display for EvidenceValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref field) = self.field {
            write!(f, "Field '{}': {}", field, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for EvidenceValidationError {}

fn version_suffix(version: &Option<String>) -> String {
    version
        .as_ref()
        .map(|v| format!(" version '{v}'"))
        .unwrap_or_default()
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Errors raised by the governance exporter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// The destination refused the report; retrying will not help.
    #[error("Export rejected{}: {message}", status_suffix(.status))]
    Rejected {
        /// HTTP-like status code, when the destination has one.
        status: Option<u16>,
        /// Reason given by the destination.
        message: String,
    },

    /// Transient failures persisted past the retry limit.
    #[error("Export failed after {attempts} attempts: {last_error}")]
    Failed {
        /// Number of delivery attempts made.
        attempts: usize,
        /// The error from the last attempt.
        last_error: String,
    },

    /// The report could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The exporter is misconfigured.
    #[error("Export configuration error: {0}")]
    Configuration(String),
}

impl ExportError {
    /// Returns true if the destination explicitly refused the report.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_duplicate_assessment_message() {
        let err = RegistryError::DuplicateAssessment {
            name: "fairness".to_string(),
            version: "1.0.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Assessment 'fairness' version '1.0.0' is already registered"
        );
        assert_eq!(err.error_info().code, "RAI-002-DUPLICATE");
        assert!(err.error_info().fix_hint.is_some());
    }

    #[test]
    fn test_not_found_message_with_and_without_version() {
        let pinned = RegistryError::AssessmentNotFound {
            name: "privacy".to_string(),
            version: Some("2.0".to_string()),
        };
        assert_eq!(pinned.to_string(), "Assessment 'privacy' version '2.0' is not registered");

        let any = RegistryError::AssessmentNotFound {
            name: "privacy".to_string(),
            version: None,
        };
        assert_eq!(any.to_string(), "Assessment 'privacy' is not registered");
    }

    #[test]
    fn test_artifact_error_info_context() {
        let err = ArtifactError::UnsupportedArtifactKind {
            name: "blob".to_string(),
            reason: "no operations or columns".to_string(),
        };
        let info = err.error_info();
        assert_eq!(info.code, "RAI-001-UNSUPPORTED_KIND");
        assert_eq!(info.context.get("artifact"), Some(&"blob".to_string()));

        let dict = info.to_dict();
        assert!(dict.contains_key("fix_hint"));
        assert!(dict.contains_key("context"));
    }

    #[test]
    fn test_setup_error_classification() {
        let setup: RaiflowError = ArtifactError::StaleArtifact { id: "x".into() }.into();
        assert!(setup.is_setup_error());

        let export: RaiflowError = ExportError::Configuration("missing tenant".into()).into();
        assert!(!export.is_setup_error());

        let serde: RaiflowError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(serde, RaiflowError::Serialization(_)));
        assert!(!serde.is_setup_error());
    }

    #[test]
    fn test_assessment_error_from_anyhow() {
        let err: AssessmentError = anyhow::anyhow!("division by zero").context("computing parity").into();
        assert_eq!(err, AssessmentError::Internal("computing parity: division by zero".to_string()));
    }

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            EvidenceValidationError::for_field("value", "must be finite").to_string(),
            "Field 'value': must be finite"
        );
        assert_eq!(EvidenceValidationError::new("empty table").to_string(), "empty table");
    }

    #[test]
    fn test_export_error_display() {
        let rejected = ExportError::Rejected {
            status: Some(401),
            message: "bad api key".to_string(),
        };
        assert_eq!(rejected.to_string(), "Export rejected (401): bad api key");
        assert!(rejected.is_rejected());

        let failed = ExportError::Failed {
            attempts: 3,
            last_error: "connection reset".to_string(),
        };
        assert_eq!(failed.to_string(), "Export failed after 3 attempts: connection reset");
        assert!(!failed.is_rejected());
    }
}
