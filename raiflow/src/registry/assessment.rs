//! The assessment plugin contract.

use crate::artifact::{Artifact, ArtifactKind, CapabilityPredicate, DatasetRole};
use crate::errors::AssessmentError;
use crate::evidence::{AssessmentRef, EvidenceDraft, EvidenceType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One artifact position an assessment needs filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot name, e.g. `model` or `assessment_data`.
    pub name: String,
    /// Required artifact kind, if any.
    #[serde(default)]
    pub kind: Option<ArtifactKind>,
    /// Required dataset role, if any.
    #[serde(default)]
    pub role: Option<DatasetRole>,
    /// Capabilities the artifact must satisfy.
    #[serde(default)]
    pub predicate: CapabilityPredicate,
}

impl Slot {
    /// A slot accepting any artifact.
    #[must_use]
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            role: None,
            predicate: CapabilityPredicate::Always,
        }
    }

    /// A slot accepting a model.
    #[must_use]
    pub fn model(name: impl Into<String>) -> Self {
        Self {
            kind: Some(ArtifactKind::Model),
            ..Self::any(name)
        }
    }

    /// A slot accepting a dataset.
    #[must_use]
    pub fn dataset(name: impl Into<String>) -> Self {
        Self {
            kind: Some(ArtifactKind::Dataset),
            ..Self::any(name)
        }
    }

    /// Adds a capability predicate (conjoined with any existing one).
    #[must_use]
    pub fn requiring(mut self, predicate: CapabilityPredicate) -> Self {
        self.predicate = std::mem::take(&mut self.predicate).and(predicate);
        self
    }

    /// Restricts the slot to datasets with the given role.
    #[must_use]
    pub fn with_role(mut self, role: DatasetRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Returns true if the artifact can fill this slot.
    #[must_use]
    pub fn accepts(&self, artifact: &Artifact) -> bool {
        self.kind.map_or(true, |k| artifact.kind() == k)
            && self.role.map_or(true, |r| artifact.role() == Some(r))
            && self.predicate.evaluate(artifact.capabilities())
    }

    /// Human-readable requirement, e.g. `model: predict | predict_proba`.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(kind) = self.kind {
            parts.push(kind.to_string());
        }
        if let Some(role) = self.role {
            parts.push(format!("role={role}"));
        }
        if self.predicate != CapabilityPredicate::Always {
            parts.push(self.predicate.describe());
        }
        format!("{}: {}", self.name, parts.join(", "))
    }
}

/// What an assessment needs: one artifact per slot, all distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    slots: Vec<Slot>,
}

impl Requirements {
    /// Creates empty requirements.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a slot.
    #[must_use]
    pub fn slot(mut self, slot: Slot) -> Self {
        self.slots.push(slot);
        self
    }

    /// Returns the slots in declaration order.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }
}

/// A pluggable assessment.
///
/// `run` receives one artifact per declared slot, in slot order, and must
/// not mutate them. It should be idempotent: identical artifacts and
/// parameters give identical evidence. Assessments that cannot guarantee
/// this report `deterministic() == false`.
#[async_trait]
pub trait Assessment: Send + Sync {
    /// Assessment name.
    fn name(&self) -> &str;

    /// Assessment version.
    fn version(&self) -> &str;

    /// Artifact requirements.
    fn requirements(&self) -> Requirements;

    /// Evidence types this assessment may produce.
    fn evidence_types(&self) -> Vec<EvidenceType>;

    /// Short description.
    fn description(&self) -> &str {
        ""
    }

    /// Whether identical inputs always give identical evidence.
    fn deterministic(&self) -> bool {
        true
    }

    /// Runs the assessment.
    async fn run(
        &self,
        artifacts: &[Arc<Artifact>],
        params: &Value,
    ) -> Result<Vec<EvidenceDraft>, AssessmentError>;

    /// Name and version as a reference.
    fn reference(&self) -> AssessmentRef {
        AssessmentRef::new(self.name(), self.version())
    }
}

impl std::fmt::Debug for dyn Assessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assessment")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{wrap, Capability, CapabilityHints};
    use crate::testing::fixtures;

    #[test]
    fn test_slot_accepts_by_kind_and_predicate() {
        let model = wrap(fixtures::credit_model(), None).unwrap();
        let data = wrap(fixtures::credit_dataset(), None).unwrap();

        let slot = Slot::model("model").requiring(CapabilityPredicate::any_of([
            Capability::Predict,
            Capability::PredictProba,
        ]));
        assert!(slot.accepts(&model));
        assert!(!slot.accepts(&data));

        let labelled = Slot::dataset("data").requiring(CapabilityPredicate::has(Capability::Labels));
        assert!(labelled.accepts(&data));
    }

    #[test]
    fn test_slot_role_filter() {
        let training = wrap(
            fixtures::credit_dataset(),
            Some(CapabilityHints::new().with_role(DatasetRole::Training)),
        )
        .unwrap();

        assert!(!Slot::dataset("data").with_role(DatasetRole::Assessment).accepts(&training));
        assert!(Slot::dataset("data").with_role(DatasetRole::Training).accepts(&training));
    }

    #[test]
    fn test_slot_describe() {
        let slot = Slot::dataset("data")
            .requiring(CapabilityPredicate::has(Capability::Labels))
            .requiring(CapabilityPredicate::has(Capability::SensitiveFeatures));
        assert_eq!(slot.describe(), "data: dataset, labels & sensitive_features");
    }
}
