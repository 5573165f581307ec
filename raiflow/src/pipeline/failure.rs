//! Pair-level failure records.

use crate::evidence::AssessmentRef;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Why a pair failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The invocation exceeded the configured timeout.
    Timeout,
    /// The assessment returned an error or panicked.
    AssessmentInternalError,
    /// Evidence had an undeclared type or failed its schema.
    SchemaViolation,
    /// The run was cancelled while the pair was in flight.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::AssessmentInternalError => write!(f, "assessment_internal_error"),
            Self::SchemaViolation => write!(f, "schema_violation"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Record of one failed pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The assessment that failed.
    pub assessment: AssessmentRef,
    /// Artifacts it ran against.
    pub artifact_ids: Vec<String>,
    /// Failure kind.
    pub kind: FailureKind,
    /// Error message.
    pub message: String,
    /// When the failure was recorded.
    pub timestamp: Timestamp,
    /// Additional context, e.g. the timeout in milliseconds.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, Value>,
}

impl FailureRecord {
    /// Creates a failure record stamped with the current time.
    #[must_use]
    pub fn new(
        assessment: AssessmentRef,
        artifact_ids: Vec<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            assessment,
            artifact_ids,
            kind,
            message: message.into(),
            timestamp: now_utc(),
            context: BTreeMap::new(),
        }
    }

    /// Adds context.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on [{}] {}: {}",
            self.assessment,
            self.artifact_ids.join(", "),
            self.kind,
            self.message
        )
    }
}
