//! Built-in assessments over [`TabularData`] and [`ModelArtifact`].
//!
//! - `performance`: accuracy, precision, recall and F1, plus a per-group table
//! - `model_fairness`: demographic and accuracy parity per sensitive column
//! - `data_profiler`: shape, label balance and group counts of a dataset
//! - `model_profiler`: name, hyperparameters and features of a model

use super::{Assessment, AssessmentRegistry, Requirements, Slot};
use crate::artifact::{
    Artifact, Capability, CapabilityPredicate, DatasetRole, ModelArtifact, TabularData,
    TabularFrame, IN_MEMORY_CLASSIFIER, IN_MEMORY_TABULAR,
};
use crate::errors::{AssessmentError, RegistryError};
use crate::evidence::{EvidenceDraft, EvidenceType};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Returns one instance of every built-in assessment.
#[must_use]
pub fn builtin_assessments() -> Vec<Arc<dyn Assessment>> {
    vec![
        Arc::new(PerformanceAssessment),
        Arc::new(ModelFairnessAssessment),
        Arc::new(DataProfilerAssessment),
        Arc::new(ModelProfilerAssessment),
    ]
}

/// Registers every built-in assessment.
pub fn register_builtins(registry: &AssessmentRegistry) -> Result<(), RegistryError> {
    for assessment in builtin_assessments() {
        registry.register(assessment)?;
    }
    Ok(())
}

fn in_memory_tabular() -> Capability {
    Capability::Custom(IN_MEMORY_TABULAR.to_string())
}

fn in_memory_classifier() -> Capability {
    Capability::Custom(IN_MEMORY_CLASSIFIER.to_string())
}

fn dataset_of(artifact: &Artifact) -> Result<TabularFrame, AssessmentError> {
    let data = artifact
        .downcast_ref::<TabularData>()
        .ok_or_else(|| unusable(artifact, "not a tabular dataset"))?;
    let frame = data.snapshot();

    if let Some((i, _)) = frame
        .rows
        .iter()
        .enumerate()
        .find(|(_, r)| r.len() != frame.feature_names.len())
    {
        return Err(unusable(artifact, &format!("row {i} does not match the feature columns")));
    }
    if frame.labels.as_ref().is_some_and(|(_, l)| l.len() != frame.rows.len()) {
        return Err(unusable(artifact, "label column length differs from row count"));
    }
    if let Some(col) = frame.sensitive.iter().find(|c| c.values.len() != frame.rows.len()) {
        return Err(unusable(
            artifact,
            &format!("sensitive column '{}' length differs from row count", col.name),
        ));
    }
    Ok(frame)
}

fn model_of(artifact: &Artifact) -> Result<&ModelArtifact, AssessmentError> {
    artifact
        .downcast_ref::<ModelArtifact>()
        .ok_or_else(|| unusable(artifact, "not a classification model"))
}

fn unusable(artifact: &Artifact, reason: &str) -> AssessmentError {
    AssessmentError::UnusableArtifact {
        artifact: artifact.id().to_string(),
        reason: reason.to_string(),
    }
}

fn positive_label(params: &Value) -> Result<f64, AssessmentError> {
    match params.get("positive_label") {
        None | Some(Value::Null) => Ok(1.0),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| AssessmentError::InvalidParams("positive_label must be a number".to_string())),
    }
}

/// Labels and predictions for one model on one dataset.
struct Scored {
    labels: Vec<f64>,
    predictions: Vec<f64>,
}

async fn score(
    model_artifact: &Arc<Artifact>,
    data_artifact: &Artifact,
) -> Result<(Scored, TabularFrame), AssessmentError> {
    model_of(model_artifact)?;
    let frame = dataset_of(data_artifact)?;
    let labels = frame
        .labels
        .as_ref()
        .map(|(_, l)| l.clone())
        .ok_or_else(|| unusable(data_artifact, "no label column"))?;

    // Classifiers are synchronous and may be slow; keep them off the async workers.
    let model = Arc::clone(model_artifact);
    let rows = frame.rows.clone();
    let predictions = tokio::task::spawn_blocking(move || -> Result<Vec<f64>, AssessmentError> {
        Ok(model_of(&model)?.classifier().predict(&rows)?)
    })
    .await
    .map_err(|e| AssessmentError::internal(format!("classifier task failed: {e}")))??;

    if predictions.len() != frame.rows.len() {
        return Err(AssessmentError::internal(format!(
            "model returned {} predictions for {} rows",
            predictions.len(),
            frame.rows.len()
        )));
    }
    Ok((Scored { labels, predictions }, frame))
}

#[allow(clippy::float_cmp)]
fn accuracy(pairs: &[(f64, f64)]) -> f64 {
    ratio(pairs.iter().filter(|(y, p)| y == p).count(), pairs.len())
}

#[allow(clippy::cast_precision_loss)]
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Indices of rows per group value, ordered by group.
fn groups(values: &[String]) -> BTreeMap<&str, Vec<usize>> {
    let mut out: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, v) in values.iter().enumerate() {
        out.entry(v.as_str()).or_default().push(i);
    }
    out
}

fn spread(values: impl Iterator<Item = f64>) -> f64 {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min.is_finite() && max.is_finite() {
        max - min
    } else {
        0.0
    }
}

/// Classification performance of a model on an assessment dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceAssessment;

#[async_trait]
impl Assessment for PerformanceAssessment {
    fn name(&self) -> &str {
        "performance"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Accuracy, precision, recall and F1 of a classifier, overall and per sensitive group"
    }

    fn requirements(&self) -> Requirements {
        Requirements::new()
            .slot(Slot::model("model").requiring(CapabilityPredicate::all_of([
                Capability::Predict,
                in_memory_classifier(),
            ])))
            .slot(
                Slot::dataset("assessment_data")
                    .with_role(DatasetRole::Assessment)
                    .requiring(CapabilityPredicate::all_of([
                        Capability::Features,
                        Capability::Labels,
                        in_memory_tabular(),
                    ])),
            )
    }

    fn evidence_types(&self) -> Vec<EvidenceType> {
        vec![EvidenceType::Metric, EvidenceType::Table]
    }

    #[allow(clippy::float_cmp)]
    async fn run(
        &self,
        artifacts: &[Arc<Artifact>],
        params: &Value,
    ) -> Result<Vec<EvidenceDraft>, AssessmentError> {
        let [model, data] = artifacts else {
            return Err(AssessmentError::internal("expected a model and a dataset"));
        };
        let positive = positive_label(params)?;
        let (scored, frame) = score(model, data).await?;

        let pairs: Vec<(f64, f64)> = scored.labels.iter().copied().zip(scored.predictions.iter().copied()).collect();
        let tp = pairs.iter().filter(|(y, p)| *y == positive && *p == positive).count();
        let fp = pairs.iter().filter(|(y, p)| *y != positive && *p == positive).count();
        let fn_ = pairs.iter().filter(|(y, p)| *y == positive && *p != positive).count();

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        let mut drafts = vec![
            EvidenceDraft::metric("accuracy_score", accuracy(&pairs)),
            EvidenceDraft::metric("precision_score", precision),
            EvidenceDraft::metric("recall_score", recall),
            EvidenceDraft::metric("f1_score", f1),
        ];

        for column in &frame.sensitive {
            let rows = groups(&column.values)
                .into_iter()
                .map(|(group, idx)| {
                    let subset: Vec<(f64, f64)> = idx.iter().map(|&i| pairs[i]).collect();
                    vec![json!(group), json!(subset.len()), json!(accuracy(&subset))]
                })
                .collect();
            drafts.push(
                EvidenceDraft::table(
                    "disaggregated_performance",
                    vec!["group".to_string(), "count".to_string(), "accuracy_score".to_string()],
                    rows,
                )
                .with_label("sensitive_feature", &column.name),
            );
        }
        Ok(drafts)
    }
}

/// Group fairness of a model across sensitive attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelFairnessAssessment;

#[async_trait]
impl Assessment for ModelFairnessAssessment {
    fn name(&self) -> &str {
        "model_fairness"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Selection rate and accuracy gaps between sensitive groups"
    }

    fn requirements(&self) -> Requirements {
        Requirements::new()
            .slot(Slot::model("model").requiring(CapabilityPredicate::all_of([
                Capability::Predict,
                in_memory_classifier(),
            ])))
            .slot(
                Slot::dataset("assessment_data")
                    .with_role(DatasetRole::Assessment)
                    .requiring(CapabilityPredicate::all_of([
                        Capability::Features,
                        Capability::Labels,
                        Capability::SensitiveFeatures,
                        in_memory_tabular(),
                    ])),
            )
    }

    fn evidence_types(&self) -> Vec<EvidenceType> {
        vec![EvidenceType::Metric, EvidenceType::Table]
    }

    #[allow(clippy::float_cmp)]
    async fn run(
        &self,
        artifacts: &[Arc<Artifact>],
        params: &Value,
    ) -> Result<Vec<EvidenceDraft>, AssessmentError> {
        let [model, data] = artifacts else {
            return Err(AssessmentError::internal("expected a model and a dataset"));
        };
        let positive = positive_label(params)?;
        let (scored, frame) = score(model, data).await?;
        if frame.sensitive.is_empty() {
            return Err(unusable(data, "no sensitive columns"));
        }

        let pairs: Vec<(f64, f64)> = scored.labels.iter().copied().zip(scored.predictions.iter().copied()).collect();
        let mut drafts = Vec::new();

        for column in &frame.sensitive {
            let per_group: Vec<(&str, usize, f64, f64)> = groups(&column.values)
                .into_iter()
                .map(|(group, idx)| {
                    let subset: Vec<(f64, f64)> = idx.iter().map(|&i| pairs[i]).collect();
                    let selected = subset.iter().filter(|(_, p)| *p == positive).count();
                    (group, subset.len(), ratio(selected, subset.len()), accuracy(&subset))
                })
                .collect();

            let dpd = spread(per_group.iter().map(|g| g.2));
            let apd = spread(per_group.iter().map(|g| g.3));

            drafts.push(
                EvidenceDraft::metric("demographic_parity_difference", dpd)
                    .with_label("sensitive_feature", &column.name),
            );
            drafts.push(
                EvidenceDraft::metric("accuracy_parity_difference", apd)
                    .with_label("sensitive_feature", &column.name),
            );
            drafts.push(
                EvidenceDraft::table(
                    "selection_rates",
                    vec![
                        "group".to_string(),
                        "count".to_string(),
                        "selection_rate".to_string(),
                        "accuracy_score".to_string(),
                    ],
                    per_group
                        .iter()
                        .map(|(g, n, s, a)| vec![json!(g), json!(n), json!(s), json!(a)])
                        .collect(),
                )
                .with_label("sensitive_feature", &column.name),
            );
        }
        Ok(drafts)
    }
}

/// Shape and balance of a tabular dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataProfilerAssessment;

#[async_trait]
impl Assessment for DataProfilerAssessment {
    fn name(&self) -> &str {
        "data_profiler"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Row and column counts, missing values, label balance and group sizes"
    }

    fn requirements(&self) -> Requirements {
        Requirements::new().slot(
            Slot::dataset("data")
                .requiring(CapabilityPredicate::all_of([Capability::Tabular, in_memory_tabular()])),
        )
    }

    fn evidence_types(&self) -> Vec<EvidenceType> {
        vec![EvidenceType::Profiler]
    }

    async fn run(
        &self,
        artifacts: &[Arc<Artifact>],
        _params: &Value,
    ) -> Result<Vec<EvidenceDraft>, AssessmentError> {
        let [data] = artifacts else {
            return Err(AssessmentError::internal("expected one dataset"));
        };
        let frame = dataset_of(data)?;

        let missing = frame.rows.iter().flatten().filter(|v| !v.is_finite()).count();
        let mut results = BTreeMap::new();
        results.insert("row_count".to_string(), json!(frame.rows.len()));
        results.insert("column_count".to_string(), json!(frame.feature_names.len()));
        results.insert("features".to_string(), json!(frame.feature_names));
        results.insert("missing_values".to_string(), json!(missing));

        if let Some((column, labels)) = &frame.labels {
            let mut balance: BTreeMap<String, usize> = BTreeMap::new();
            for label in labels {
                *balance.entry(label.to_string()).or_default() += 1;
            }
            results.insert("label_column".to_string(), json!(column));
            results.insert("label_distribution".to_string(), json!(balance));
        }

        if !frame.sensitive.is_empty() {
            let sizes: BTreeMap<&str, BTreeMap<&str, usize>> = frame
                .sensitive
                .iter()
                .map(|c| {
                    let counts = groups(&c.values).into_iter().map(|(g, idx)| (g, idx.len())).collect();
                    (c.name.as_str(), counts)
                })
                .collect();
            results.insert("sensitive_groups".to_string(), json!(sizes));
        }

        Ok(vec![EvidenceDraft::profiler(results)])
    }
}

/// Static description of a model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelProfilerAssessment;

#[async_trait]
impl Assessment for ModelProfilerAssessment {
    fn name(&self) -> &str {
        "model_profiler"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Model name, hyperparameters and input features"
    }

    fn requirements(&self) -> Requirements {
        Requirements::new().slot(
            Slot::model("model")
                .requiring(CapabilityPredicate::all_of([
                    Capability::Predict,
                    Capability::Features,
                    in_memory_classifier(),
                ])),
        )
    }

    fn evidence_types(&self) -> Vec<EvidenceType> {
        vec![EvidenceType::ModelProfiler]
    }

    async fn run(
        &self,
        artifacts: &[Arc<Artifact>],
        _params: &Value,
    ) -> Result<Vec<EvidenceDraft>, AssessmentError> {
        let [model] = artifacts else {
            return Err(AssessmentError::internal("expected one model"));
        };
        let raw = model_of(model)?;
        Ok(vec![EvidenceDraft::model_profiler(
            raw.name(),
            raw.parameters().clone(),
            raw.feature_names().to_vec(),
        )])
    }
}
