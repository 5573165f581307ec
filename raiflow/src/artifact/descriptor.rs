//! Introspection contract for raw models and datasets.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;

/// Data modality reported by a raw object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Rows of numeric or categorical columns.
    Tabular,
    /// Free text.
    Text,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tabular => write!(f, "tabular"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// What a raw object exposes, as seen by the artifact wrapper.
///
/// The descriptor is the only view the wrapper has of a raw object.
/// Two calls to [`RawArtifact::describe`] on an unchanged object must
/// return equal descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Human-readable name.
    pub name: String,
    /// Exposed operations, e.g. `predict`, `predict_proba`.
    #[serde(default)]
    pub operations: BTreeSet<String>,
    /// Feature column names.
    #[serde(default)]
    pub feature_columns: Vec<String>,
    /// Label column name.
    #[serde(default)]
    pub label_column: Option<String>,
    /// Sensitive attribute column names.
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
    /// Number of rows, for datasets.
    #[serde(default)]
    pub rows: Option<usize>,
    /// Data modality.
    #[serde(default)]
    pub modality: Option<Modality>,
    /// Self-declared capability tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Digest of the underlying content, if the object can compute one.
    #[serde(default)]
    pub content_digest: Option<String>,
}

impl ArtifactDescriptor {
    /// Creates a descriptor with only a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds an exposed operation.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operations.insert(operation.into());
        self
    }

    /// Sets the feature columns.
    #[must_use]
    pub fn with_features<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the label column.
    #[must_use]
    pub fn with_label(mut self, column: impl Into<String>) -> Self {
        self.label_column = Some(column.into());
        self
    }

    /// Sets the sensitive attribute columns.
    #[must_use]
    pub fn with_sensitive<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the row count.
    #[must_use]
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Sets the modality.
    #[must_use]
    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = Some(modality);
        self
    }

    /// Adds a self-declared tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Sets the content digest.
    #[must_use]
    pub fn with_content_digest(mut self, digest: impl Into<String>) -> Self {
        self.content_digest = Some(digest.into());
        self
    }

    /// Returns true if any inference operation is exposed.
    #[must_use]
    pub fn is_model_like(&self) -> bool {
        self.operations
            .iter()
            .any(|op| super::Capability::from_operation(op).is_some())
    }

    /// Returns true if the descriptor shows dataset structure.
    #[must_use]
    pub fn is_dataset_like(&self) -> bool {
        !self.feature_columns.is_empty()
            || self.label_column.is_some()
            || !self.sensitive_columns.is_empty()
            || self.rows.is_some()
    }
}

/// A raw model or dataset that can be wrapped into an [`super::Artifact`].
///
/// Implementations only describe themselves; the wrapper never mutates them.
/// `as_any` lets assessments reach the concrete type they know how to use.
pub trait RawArtifact: Send + Sync + fmt::Debug + 'static {
    /// Describes the object's current structure.
    fn describe(&self) -> ArtifactDescriptor;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
}
