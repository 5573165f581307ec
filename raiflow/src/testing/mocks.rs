//! Mock assessments and models for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::artifact::{Artifact, Classifier};
use crate::errors::AssessmentError;
use crate::evidence::{EvidenceDraft, EvidenceType};
use crate::registry::{Assessment, Requirements, Slot};

fn default_requirements() -> Requirements {
    Requirements::new().slot(Slot::dataset("data"))
}

/// Returns fixed drafts and records the parameters of each call.
#[derive(Debug)]
pub struct StaticAssessment {
    name: String,
    version: String,
    description: String,
    requirements: Requirements,
    evidence_types: Vec<EvidenceType>,
    drafts: Vec<EvidenceDraft>,
    calls: AtomicUsize,
    last_params: Mutex<Option<Value>>,
}

impl StaticAssessment {
    /// Creates an assessment returning `drafts` for one dataset slot.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, drafts: Vec<EvidenceDraft>) -> Self {
        let mut evidence_types: Vec<EvidenceType> = drafts.iter().map(EvidenceDraft::evidence_type).collect();
        evidence_types.sort();
        evidence_types.dedup();
        if evidence_types.is_empty() {
            evidence_types.push(EvidenceType::Metric);
        }
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            requirements: default_requirements(),
            evidence_types,
            drafts,
            calls: AtomicUsize::new(0),
            last_params: Mutex::new(None),
        }
    }

    /// Creates an assessment returning one metric named after itself.
    #[must_use]
    pub fn metric(name: &str, version: &str, value: f64) -> Self {
        Self::new(name, version, vec![EvidenceDraft::metric(format!("{name}_score"), value)])
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replaces the requirements.
    #[must_use]
    pub fn with_requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Replaces the declared evidence types.
    #[must_use]
    pub fn with_evidence_types(mut self, types: Vec<EvidenceType>) -> Self {
        self.evidence_types = types;
        self
    }

    /// Number of completed calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Parameters of the most recent call.
    #[must_use]
    pub fn last_params(&self) -> Option<Value> {
        self.last_params.lock().clone()
    }
}

#[async_trait]
impl Assessment for StaticAssessment {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn requirements(&self) -> Requirements {
        self.requirements.clone()
    }

    fn evidence_types(&self) -> Vec<EvidenceType> {
        self.evidence_types.clone()
    }

    async fn run(&self, _artifacts: &[Arc<Artifact>], params: &Value) -> Result<Vec<EvidenceDraft>, AssessmentError> {
        *self.last_params.lock() = Some(params.clone());
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.drafts.clone())
    }
}

/// Returns an error, for all calls or only the first few.
#[derive(Debug)]
pub struct FailingAssessment {
    name: String,
    version: String,
    message: String,
    failures_left: Option<AtomicUsize>,
    calls: AtomicUsize,
}

impl FailingAssessment {
    /// Fails every call with `message`.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            message: message.into(),
            failures_left: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails the first `n` calls, then returns a metric.
    #[must_use]
    pub fn times(name: impl Into<String>, version: impl Into<String>, n: usize) -> Self {
        Self {
            failures_left: Some(AtomicUsize::new(n)),
            ..Self::new(name, version, "transient assessment error")
        }
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Assessment for FailingAssessment {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn requirements(&self) -> Requirements {
        default_requirements()
    }

    fn evidence_types(&self) -> Vec<EvidenceType> {
        vec![EvidenceType::Metric]
    }

    async fn run(&self, _artifacts: &[Arc<Artifact>], _params: &Value) -> Result<Vec<EvidenceDraft>, AssessmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = match &self.failures_left {
            None => true,
            Some(left) => left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok(),
        };
        if fail {
            Err(AssessmentError::internal(self.message.clone()))
        } else {
            Ok(vec![EvidenceDraft::metric(format!("{}_score", self.name), 1.0)])
        }
    }
}

/// Sleeps before returning a metric.
#[derive(Debug)]
pub struct SlowAssessment {
    name: String,
    version: String,
    delay: Duration,
    requirements: Requirements,
}

impl SlowAssessment {
    /// Creates an assessment taking `delay` to finish.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            delay,
            requirements: default_requirements(),
        }
    }

    /// Replaces the requirements.
    #[must_use]
    pub fn with_requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = requirements;
        self
    }
}

#[async_trait]
impl Assessment for SlowAssessment {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn requirements(&self) -> Requirements {
        self.requirements.clone()
    }

    fn evidence_types(&self) -> Vec<EvidenceType> {
        vec![EvidenceType::Metric]
    }

    async fn run(&self, _artifacts: &[Arc<Artifact>], _params: &Value) -> Result<Vec<EvidenceDraft>, AssessmentError> {
        tokio::time::sleep(self.delay).await;
        let seconds = self.delay.as_secs_f64();
        Ok(vec![EvidenceDraft::metric("elapsed_seconds", seconds)])
    }
}

/// Panics when run.
#[derive(Debug)]
pub struct PanickingAssessment {
    name: String,
    version: String,
}

impl PanickingAssessment {
    /// Creates a panicking assessment.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[async_trait]
impl Assessment for PanickingAssessment {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn requirements(&self) -> Requirements {
        default_requirements()
    }

    fn evidence_types(&self) -> Vec<EvidenceType> {
        vec![EvidenceType::Metric]
    }

    #[allow(clippy::panic)]
    async fn run(&self, _artifacts: &[Arc<Artifact>], _params: &Value) -> Result<Vec<EvidenceDraft>, AssessmentError> {
        panic!("{} exploded", self.name)
    }
}

/// Returns evidence that breaks its contract.
#[derive(Debug)]
pub struct SchemaViolatingAssessment {
    name: String,
    version: String,
    draft: EvidenceDraft,
}

impl SchemaViolatingAssessment {
    /// Declares metrics but returns a table.
    #[must_use]
    pub fn undeclared_type(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            draft: EvidenceDraft::table("results", vec!["k".to_string()], vec![vec![json!(1)]]),
        }
    }

    /// Returns a metric with a non-finite value.
    #[must_use]
    pub fn invalid_payload(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            draft: EvidenceDraft::metric("score", f64::NAN),
        }
    }
}

#[async_trait]
impl Assessment for SchemaViolatingAssessment {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn requirements(&self) -> Requirements {
        default_requirements()
    }

    fn evidence_types(&self) -> Vec<EvidenceType> {
        vec![EvidenceType::Metric]
    }

    async fn run(&self, _artifacts: &[Arc<Artifact>], _params: &Value) -> Result<Vec<EvidenceDraft>, AssessmentError> {
        Ok(vec![
            EvidenceDraft::metric("valid_first", 1.0),
            self.draft.clone(),
        ])
    }
}

/// Predicts 1 when one feature reaches a threshold.
#[derive(Debug, Clone)]
pub struct ThresholdClassifier {
    feature: usize,
    threshold: f64,
    proba: bool,
}

impl ThresholdClassifier {
    /// Thresholds feature `feature` at `threshold`.
    #[must_use]
    pub fn new(feature: usize, threshold: f64) -> Self {
        Self {
            feature,
            threshold,
            proba: false,
        }
    }

    /// Enables `predict_proba`.
    #[must_use]
    pub fn with_proba(mut self) -> Self {
        self.proba = true;
        self
    }

    fn feature_values(&self, rows: &[Vec<f64>]) -> anyhow::Result<Vec<f64>> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                row.get(self.feature)
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("row {i} has no feature {}", self.feature))
            })
            .collect()
    }
}

impl Classifier for ThresholdClassifier {
    fn predict(&self, rows: &[Vec<f64>]) -> anyhow::Result<Vec<f64>> {
        Ok(self
            .feature_values(rows)?
            .into_iter()
            .map(|v| if v >= self.threshold { 1.0 } else { 0.0 })
            .collect())
    }

    fn predict_proba(&self, rows: &[Vec<f64>]) -> Option<anyhow::Result<Vec<f64>>> {
        self.proba.then(|| {
            self.feature_values(rows)
                .map(|values| values.into_iter().map(|v| 1.0 / (1.0 + (self.threshold - v).exp())).collect())
        })
    }

    fn supports_proba(&self) -> bool {
        self.proba
    }
}

/// Wraps a classifier and blocks the calling thread before each prediction.
#[derive(Debug, Clone)]
pub struct BlockingClassifier {
    inner: ThresholdClassifier,
    delay: Duration,
}

impl BlockingClassifier {
    /// Delays every `predict` call of `inner` by `delay`.
    #[must_use]
    pub fn new(inner: ThresholdClassifier, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl Classifier for BlockingClassifier {
    fn predict(&self, rows: &[Vec<f64>]) -> anyhow::Result<Vec<f64>> {
        std::thread::sleep(self.delay);
        self.inner.predict(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_classifier() {
        let clf = ThresholdClassifier::new(0, 2.0).with_proba();
        assert_eq!(clf.predict(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap(), vec![0.0, 1.0, 1.0]);

        let proba = clf.predict_proba(&[vec![2.0]]).unwrap().unwrap();
        assert!((proba[0] - 0.5).abs() < 1e-9);
        assert!(clf.predict(&[vec![]]).is_err());
        assert!(ThresholdClassifier::new(0, 1.0).predict_proba(&[vec![1.0]]).is_none());
    }

    #[tokio::test]
    async fn test_failing_times_recovers() {
        let flaky = FailingAssessment::times("flaky", "1.0", 1);
        assert!(flaky.run(&[], &Value::Null).await.is_err());
        assert!(flaky.run(&[], &Value::Null).await.is_ok());
        assert_eq!(flaky.call_count(), 2);
    }

    #[tokio::test]
    async fn test_static_records_params() {
        let a = StaticAssessment::metric("a", "1.0", 0.3);
        a.run(&[], &json!({"k": 1})).await.unwrap();
        assert_eq!(a.last_params(), Some(json!({"k": 1})));
        assert_eq!(a.call_count(), 1);
        assert_eq!(a.evidence_types(), vec![EvidenceType::Metric]);
    }
}
