//! In-process raw artifacts: tabular datasets and classification models.

use super::{ArtifactDescriptor, Modality, RawArtifact};
use crate::utils::compute_digest;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Tag declared by [`TabularData`], for assessments that read its rows.
pub const IN_MEMORY_TABULAR: &str = "in_memory_tabular";

/// Tag declared by [`ModelArtifact`], for assessments that call its classifier.
pub const IN_MEMORY_CLASSIFIER: &str = "in_memory_classifier";

/// A named column of sensitive attribute values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveColumn {
    /// Column name, e.g. `gender`.
    pub name: String,
    /// One group value per row.
    pub values: Vec<String>,
}

/// The contents of a [`TabularData`] at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularFrame {
    /// Feature column names.
    pub feature_names: Vec<String>,
    /// Feature rows, each `feature_names.len()` wide.
    pub rows: Vec<Vec<f64>>,
    /// Label column name and one label per row.
    pub labels: Option<(String, Vec<f64>)>,
    /// Sensitive attribute columns.
    pub sensitive: Vec<SensitiveColumn>,
}

/// A tabular dataset held in memory.
///
/// Contents sit behind a lock so the owner can still change them after
/// wrapping; the change is visible to the wrapper as a stale descriptor.
#[derive(Debug)]
pub struct TabularData {
    name: String,
    frame: RwLock<TabularFrame>,
}

impl TabularData {
    /// Creates a dataset from feature names and rows.
    #[must_use]
    pub fn new(name: impl Into<String>, feature_names: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            frame: RwLock::new(TabularFrame {
                feature_names,
                rows,
                ..Default::default()
            }),
        }
    }

    /// Adds a label column.
    #[must_use]
    pub fn with_labels(mut self, column: impl Into<String>, labels: Vec<f64>) -> Self {
        self.frame.get_mut().labels = Some((column.into(), labels));
        self
    }

    /// Adds a sensitive attribute column.
    #[must_use]
    pub fn with_sensitive(mut self, column: impl Into<String>, values: Vec<String>) -> Self {
        self.frame.get_mut().sensitive.push(SensitiveColumn {
            name: column.into(),
            values,
        });
        self
    }

    /// Returns the dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> TabularFrame {
        self.frame.read().clone()
    }

    /// Mutates the contents in place.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut TabularFrame),
    {
        f(&mut self.frame.write());
    }
}

impl RawArtifact for TabularData {
    fn describe(&self) -> ArtifactDescriptor {
        let frame = self.frame.read();
        let content = serde_json::to_value(&*frame).unwrap_or(Value::Null);

        let mut desc = ArtifactDescriptor::new(&self.name)
            .with_features(frame.feature_names.iter().cloned())
            .with_sensitive(frame.sensitive.iter().map(|c| c.name.clone()))
            .with_rows(frame.rows.len())
            .with_modality(Modality::Tabular)
            .with_tag(IN_MEMORY_TABULAR)
            .with_content_digest(compute_digest(&content));
        if let Some((label, _)) = &frame.labels {
            desc = desc.with_label(label.clone());
        }
        desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A binary classifier over numeric feature rows.
pub trait Classifier: Send + Sync {
    /// Predicts one label per row.
    fn predict(&self, rows: &[Vec<f64>]) -> anyhow::Result<Vec<f64>>;

    /// Predicts the positive-class probability per row, if supported.
    fn predict_proba(&self, _rows: &[Vec<f64>]) -> Option<anyhow::Result<Vec<f64>>> {
        None
    }

    /// Returns true if [`Classifier::predict_proba`] is implemented.
    fn supports_proba(&self) -> bool {
        false
    }
}

/// A classification model wrapped for assessment.
pub struct ModelArtifact {
    name: String,
    classifier: Arc<dyn Classifier>,
    feature_names: Vec<String>,
    parameters: BTreeMap<String, Value>,
}

impl ModelArtifact {
    /// Creates a model artifact around a classifier.
    #[must_use]
    pub fn new(name: impl Into<String>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            name: name.into(),
            classifier,
            feature_names: Vec::new(),
            parameters: BTreeMap::new(),
        }
    }

    /// Sets the feature names the model was trained on.
    #[must_use]
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }

    /// Records a hyperparameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Returns the model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying classifier.
    #[must_use]
    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// Returns the feature names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Returns the recorded hyperparameters.
    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }
}

impl fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelArtifact")
            .field("name", &self.name)
            .field("feature_names", &self.feature_names)
            .field("supports_proba", &self.classifier.supports_proba())
            .finish_non_exhaustive()
    }
}

impl RawArtifact for ModelArtifact {
    fn describe(&self) -> ArtifactDescriptor {
        let mut desc = ArtifactDescriptor::new(&self.name)
            .with_operation("predict")
            .with_features(self.feature_names.iter().cloned())
            .with_modality(Modality::Tabular)
            .with_tag(IN_MEMORY_CLASSIFIER);
        if self.classifier.supports_proba() {
            desc = desc.with_operation("predict_proba");
        }
        let params = serde_json::to_value(&self.parameters).unwrap_or(Value::Null);
        desc.with_content_digest(compute_digest(&params))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ThresholdClassifier;

    #[test]
    fn test_tabular_descriptor() {
        let data = TabularData::new("credit", vec!["income".into()], vec![vec![1.0], vec![2.0]])
            .with_labels("default", vec![0.0, 1.0])
            .with_sensitive("gender", vec!["f".into(), "m".into()]);

        let desc = data.describe();
        assert_eq!(desc.rows, Some(2));
        assert_eq!(desc.label_column.as_deref(), Some("default"));
        assert_eq!(desc.sensitive_columns, vec!["gender".to_string()]);
        assert!(desc.content_digest.is_some());
        assert!(desc.tags.contains(IN_MEMORY_TABULAR));
    }

    #[test]
    fn test_tabular_descriptor_changes_on_update() {
        let data = TabularData::new("credit", vec!["income".into()], vec![vec![1.0]]);
        let before = data.describe();
        assert_eq!(before, data.describe());

        data.update(|frame| frame.rows.push(vec![3.0]));
        assert_ne!(before, data.describe());
    }

    #[test]
    fn test_model_descriptor_operations() {
        let plain = ModelArtifact::new("clf", Arc::new(ThresholdClassifier::new(0, 0.5)));
        let desc = plain.describe();
        assert!(desc.operations.contains("predict"));
        assert!(!desc.operations.contains("predict_proba"));
        assert!(desc.tags.contains(IN_MEMORY_CLASSIFIER));

        let proba = ModelArtifact::new("clf", Arc::new(ThresholdClassifier::new(0, 0.5).with_proba()));
        assert!(proba.describe().operations.contains("predict_proba"));
    }
}
