//! Shared fixtures: a small credit dataset and a classifier for it.
//!
//! The classifier thresholds `income` at 4.5 and gets 6 of the 8 rows
//! right.

use serde_json::json;
use std::sync::Arc;

use super::ThresholdClassifier;
use crate::artifact::{wrap, ArtifactSet, CapabilityHints, DatasetRole, ModelArtifact, TabularData};
use crate::errors::ArtifactError;

/// Feature names of the credit fixtures.
#[must_use]
pub fn credit_features() -> Vec<String> {
    vec!["income".to_string(), "debt".to_string()]
}

/// Eight labelled rows with a `gender` sensitive column.
#[must_use]
pub fn credit_dataset() -> Arc<TabularData> {
    let rows = vec![
        vec![1.0, 0.5],
        vec![2.0, 0.4],
        vec![3.0, 0.9],
        vec![4.0, 0.2],
        vec![5.0, 0.1],
        vec![6.0, 0.3],
        vec![7.0, 0.8],
        vec![8.0, 0.6],
    ];
    let gender = ["f", "m", "f", "m", "f", "m", "f", "m"].map(String::from).to_vec();
    Arc::new(
        TabularData::new("credit", credit_features(), rows)
            .with_labels("default", vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0])
            .with_sensitive("gender", gender),
    )
}

/// Unlabelled rows the model was trained on.
#[must_use]
pub fn credit_training_dataset() -> Arc<TabularData> {
    Arc::new(TabularData::new(
        "credit_train",
        credit_features(),
        vec![vec![1.5, 0.2], vec![6.5, 0.7], vec![3.5, 0.4]],
    ))
}

/// A classifier over the credit features, with probabilities.
#[must_use]
pub fn credit_model() -> Arc<ModelArtifact> {
    Arc::new(
        ModelArtifact::new("credit_classifier", Arc::new(ThresholdClassifier::new(0, 4.5).with_proba()))
            .with_feature_names(credit_features())
            .with_parameter("threshold", json!(4.5))
            .with_parameter("feature", json!("income")),
    )
}

/// The credit model and assessment dataset, wrapped.
pub fn credit_artifacts() -> Result<ArtifactSet, ArtifactError> {
    ArtifactSet::from_artifacts([wrap(credit_model(), None)?, wrap(credit_dataset(), None)?])
}

/// The credit model with both assessment and training datasets, wrapped.
pub fn credit_artifacts_with_training() -> Result<ArtifactSet, ArtifactError> {
    let training = wrap(
        credit_training_dataset(),
        Some(CapabilityHints::new().with_role(DatasetRole::Training)),
    )?;
    ArtifactSet::from_artifacts([wrap(credit_model(), None)?, wrap(credit_dataset(), None)?, training])
}
