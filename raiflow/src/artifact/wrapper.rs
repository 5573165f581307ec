//! Wrapping raw objects into immutable, capability-tagged artifacts.

use super::{ArtifactDescriptor, Capability, CapabilitySet, Modality, RawArtifact};
use crate::errors::ArtifactError;
use crate::utils::compute_digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether an artifact is a model or a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Something that can be queried for predictions.
    Model,
    /// Rows of data.
    Dataset,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Dataset => write!(f, "dataset"),
        }
    }
}

/// The part a dataset plays in an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetRole {
    /// Data the model is evaluated on.
    #[default]
    Assessment,
    /// Data the model was trained on.
    Training,
}

impl fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assessment => write!(f, "assessment"),
            Self::Training => write!(f, "training"),
        }
    }
}

/// Caller-supplied overrides applied on top of inference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityHints {
    /// Capabilities to force on.
    #[serde(default)]
    pub add: CapabilitySet,
    /// Capabilities to force off.
    #[serde(default)]
    pub remove: CapabilitySet,
    /// Kind to force.
    #[serde(default)]
    pub kind: Option<ArtifactKind>,
    /// Dataset role.
    #[serde(default)]
    pub role: Option<DatasetRole>,
}

impl CapabilityHints {
    /// Creates empty hints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces a capability on.
    #[must_use]
    pub fn with(mut self, capability: Capability) -> Self {
        self.add.insert(capability);
        self
    }

    /// Forces a capability off.
    #[must_use]
    pub fn without(mut self, capability: Capability) -> Self {
        self.remove.insert(capability);
        self
    }

    /// Forces the artifact kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ArtifactKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Sets the dataset role.
    #[must_use]
    pub fn with_role(mut self, role: DatasetRole) -> Self {
        self.role = Some(role);
        self
    }
}

/// A non-fatal observation made while wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ArtifactWarning {
    /// A hint contradicted what inference found; the hint was applied.
    AmbiguousCapability {
        /// What the conflict is about (a capability or `kind`).
        subject: String,
        /// What inference found.
        inferred: String,
        /// What the hint asked for.
        hinted: String,
    },
    /// A self-declared tag was not a valid capability and was dropped.
    IgnoredTag {
        /// The rejected tag.
        tag: String,
    },
}

impl fmt::Display for ArtifactWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousCapability {
                subject,
                inferred,
                hinted,
            } => write!(
                f,
                "ambiguous capability '{subject}': inferred {inferred}, hint says {hinted}"
            ),
            Self::IgnoredTag { tag } => write!(f, "ignored invalid tag '{tag}'"),
        }
    }
}

/// A wrapped model or dataset with a fixed capability set.
///
/// Capabilities are computed once by [`wrap`] and never change. The raw
/// object is shared read-only; if it changes afterwards, [`Artifact::is_stale`]
/// reports it and the executor refuses to use the artifact.
#[derive(Debug, Clone)]
pub struct Artifact {
    id: String,
    name: String,
    kind: ArtifactKind,
    role: Option<DatasetRole>,
    capabilities: CapabilitySet,
    warnings: Vec<ArtifactWarning>,
    descriptor_digest: String,
    raw: Arc<dyn RawArtifact>,
}

impl Artifact {
    /// Stable identifier, `kind:name:hash8`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model or dataset.
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Dataset role, if this is a dataset.
    #[must_use]
    pub fn role(&self) -> Option<DatasetRole> {
        self.role
    }

    /// The immutable capability set.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Returns true if the capability is present.
    #[must_use]
    pub fn has(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Warnings recorded while wrapping.
    #[must_use]
    pub fn warnings(&self) -> &[ArtifactWarning] {
        &self.warnings
    }

    /// The raw object.
    #[must_use]
    pub fn raw(&self) -> &dyn RawArtifact {
        self.raw.as_ref()
    }

    /// Downcasts the raw object to a concrete type.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.raw.as_any().downcast_ref::<T>()
    }

    /// Returns true if the raw object no longer matches what was wrapped.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        descriptor_digest(&self.raw.describe()) != self.descriptor_digest
    }

    /// Returns true if both artifacts wrap the same raw object.
    #[must_use]
    pub fn same_object(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.raw).cast::<()>() == Arc::as_ptr(&other.raw).cast::<()>()
    }
}

fn descriptor_digest(descriptor: &ArtifactDescriptor) -> String {
    let value = serde_json::to_value(descriptor).unwrap_or(serde_json::Value::Null);
    compute_digest(&value)
}

fn infer_capabilities(
    descriptor: &ArtifactDescriptor,
    warnings: &mut Vec<ArtifactWarning>,
) -> CapabilitySet {
    let mut caps: CapabilitySet = descriptor
        .operations
        .iter()
        .filter_map(|op| Capability::from_operation(op))
        .collect();

    if !descriptor.feature_columns.is_empty() {
        caps.insert(Capability::Features);
    }
    if descriptor.label_column.is_some() {
        caps.insert(Capability::Labels);
    }
    if !descriptor.sensitive_columns.is_empty() {
        caps.insert(Capability::SensitiveFeatures);
    }
    match descriptor.modality {
        Some(Modality::Tabular) => {
            caps.insert(Capability::Tabular);
        }
        Some(Modality::Text) => {
            caps.insert(Capability::Text);
        }
        None => {}
    }
    for tag in &descriptor.tags {
        match tag.parse::<Capability>() {
            Ok(c) => {
                caps.insert(c);
            }
            Err(_) => warnings.push(ArtifactWarning::IgnoredTag { tag: tag.clone() }),
        }
    }
    caps
}

fn infer_kind(descriptor: &ArtifactDescriptor) -> Option<ArtifactKind> {
    if descriptor.is_model_like() {
        Some(ArtifactKind::Model)
    } else if descriptor.is_dataset_like() {
        Some(ArtifactKind::Dataset)
    } else {
        None
    }
}

/// Wraps a raw object into an [`Artifact`].
///
/// Hints take precedence over inference. Every conflict between the two is
/// kept as an [`ArtifactWarning::AmbiguousCapability`] on the artifact.
pub fn wrap(
    raw: Arc<dyn RawArtifact>,
    hints: Option<CapabilityHints>,
) -> Result<Artifact, ArtifactError> {
    let hints = hints.unwrap_or_default();
    let descriptor = raw.describe();
    let mut warnings = Vec::new();

    let inferred_kind = infer_kind(&descriptor);
    let kind = match (inferred_kind, hints.kind) {
        (_, Some(hinted)) => {
            if let Some(inferred) = inferred_kind.filter(|k| *k != hinted) {
                warnings.push(ArtifactWarning::AmbiguousCapability {
                    subject: "kind".to_string(),
                    inferred: inferred.to_string(),
                    hinted: hinted.to_string(),
                });
            }
            hinted
        }
        (Some(inferred), None) => inferred,
        (None, None) => {
            return Err(ArtifactError::UnsupportedArtifactKind {
                name: descriptor.name.clone(),
                reason: "no inference operations, columns or rows exposed".to_string(),
            });
        }
    };

    let mut capabilities = infer_capabilities(&descriptor, &mut warnings);

    for capability in &hints.add {
        if capabilities.contains(capability) {
            continue;
        }
        if capability.is_inference() && kind == ArtifactKind::Dataset {
            warnings.push(ArtifactWarning::AmbiguousCapability {
                subject: capability.to_string(),
                inferred: "absent on a dataset".to_string(),
                hinted: "present".to_string(),
            });
        }
        capabilities.insert(capability.clone());
    }
    for capability in &hints.remove {
        if hints.add.contains(capability) {
            warnings.push(ArtifactWarning::AmbiguousCapability {
                subject: capability.to_string(),
                inferred: "added by hint".to_string(),
                hinted: "removed".to_string(),
            });
        } else if capabilities.contains(capability) {
            warnings.push(ArtifactWarning::AmbiguousCapability {
                subject: capability.to_string(),
                inferred: "present".to_string(),
                hinted: "absent".to_string(),
            });
        }
        capabilities.remove(capability);
    }

    let role = match kind {
        ArtifactKind::Dataset => Some(hints.role.unwrap_or_default()),
        ArtifactKind::Model => None,
    };

    let digest = descriptor_digest(&descriptor);
    let id = format!("{kind}:{}:{}", descriptor.name, &digest[..8]);

    for warning in &warnings {
        warn!(artifact = %id, %warning, "Artifact wrapped with warning");
    }
    debug!(
        artifact = %id,
        kind = %kind,
        capabilities = ?capabilities.iter().map(Capability::as_str).collect::<Vec<_>>(),
        "Artifact wrapped"
    );

    Ok(Artifact {
        id,
        name: descriptor.name,
        kind,
        role,
        capabilities,
        warnings,
        descriptor_digest: digest,
        raw,
    })
}

/// The artifacts supplied to one run, keyed and ordered by id.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    artifacts: BTreeMap<String, Arc<Artifact>>,
}

impl ArtifactSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set, rejecting the same object supplied twice.
    pub fn from_artifacts(artifacts: impl IntoIterator<Item = Artifact>) -> Result<Self, ArtifactError> {
        let mut set = Self::new();
        for artifact in artifacts {
            set.insert(artifact)?;
        }
        Ok(set)
    }

    /// Adds an artifact.
    ///
    /// The same raw object may not appear twice, even under different
    /// roles: an assessment dataset cannot double as the training dataset.
    pub fn insert(&mut self, artifact: Artifact) -> Result<(), ArtifactError> {
        let duplicate = self.artifacts.contains_key(artifact.id())
            || self.artifacts.values().any(|a| a.same_object(&artifact));
        if duplicate {
            return Err(ArtifactError::DuplicateArtifact {
                id: artifact.id().to_string(),
            });
        }
        self.artifacts.insert(artifact.id().to_string(), Arc::new(artifact));
        Ok(())
    }

    /// Looks up an artifact by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<Artifact>> {
        self.artifacts.get(id)
    }

    /// Iterates artifacts in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Artifact>> {
        self.artifacts.values()
    }

    /// Number of artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Fails with `StaleArtifact` if any raw object changed since wrapping.
    pub fn ensure_fresh(&self) -> Result<(), ArtifactError> {
        match self.iter().find(|a| a.is_stale()) {
            Some(stale) => Err(ArtifactError::StaleArtifact {
                id: stale.id().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Resolves ids to artifacts, failing on the first unknown id.
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<Arc<Artifact>>, ArtifactError> {
        ids.iter()
            .map(|id| {
                self.get(id)
                    .cloned()
                    .ok_or_else(|| ArtifactError::UnknownArtifact { id: id.clone() })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ModelArtifact, TabularData};
    use crate::testing::{fixtures, ThresholdClassifier};
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Opaque;

    impl RawArtifact for Opaque {
        fn describe(&self) -> ArtifactDescriptor {
            ArtifactDescriptor::new("opaque").with_operation("fit")
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn test_wrap_dataset_infers_capabilities() {
        let artifact = wrap(fixtures::credit_dataset(), None).unwrap();

        assert_eq!(artifact.kind(), ArtifactKind::Dataset);
        assert_eq!(artifact.role(), Some(DatasetRole::Assessment));
        assert!(artifact.has(&Capability::Labels));
        assert!(artifact.has(&Capability::SensitiveFeatures));
        assert!(artifact.has(&Capability::Features));
        assert!(artifact.has(&Capability::Tabular));
        assert!(!artifact.has(&Capability::Predict));
        assert!(artifact.warnings().is_empty());
        assert!(artifact.id().starts_with("dataset:credit:"));
    }

    #[test]
    fn test_wrap_model_infers_capabilities() {
        let artifact = wrap(fixtures::credit_model(), None).unwrap();

        assert_eq!(artifact.kind(), ArtifactKind::Model);
        assert_eq!(artifact.role(), None);
        assert!(artifact.has(&Capability::Predict));
        assert!(artifact.has(&Capability::PredictProba));
        assert!(artifact.downcast_ref::<ModelArtifact>().is_some());
        assert!(artifact.downcast_ref::<TabularData>().is_none());
    }

    #[test]
    fn test_wrap_unsupported_kind() {
        let err = wrap(Arc::new(Opaque), None).unwrap_err();
        assert!(matches!(err, ArtifactError::UnsupportedArtifactKind { ref name, .. } if name == "opaque"));
    }

    #[test]
    fn test_kind_hint_rescues_unknown_object() {
        let hints = CapabilityHints::new()
            .with_kind(ArtifactKind::Dataset)
            .with(Capability::custom("has_raw_pii").unwrap());
        let artifact = wrap(Arc::new(Opaque), Some(hints)).unwrap();

        assert_eq!(artifact.kind(), ArtifactKind::Dataset);
        assert!(artifact.has(&Capability::Custom("has_raw_pii".to_string())));
        assert!(artifact.warnings().is_empty());
    }

    #[test]
    fn test_conflicting_hint_wins_and_warns() {
        let hints = CapabilityHints::new().without(Capability::SensitiveFeatures);
        let artifact = wrap(fixtures::credit_dataset(), Some(hints)).unwrap();

        assert!(!artifact.has(&Capability::SensitiveFeatures));
        assert_eq!(
            artifact.warnings(),
            &[ArtifactWarning::AmbiguousCapability {
                subject: "sensitive_features".to_string(),
                inferred: "present".to_string(),
                hinted: "absent".to_string(),
            }]
        );
    }

    #[test]
    fn test_kind_hint_conflict_warns() {
        let hints = CapabilityHints::new().with_kind(ArtifactKind::Dataset);
        let artifact = wrap(fixtures::credit_model(), Some(hints)).unwrap();

        assert_eq!(artifact.kind(), ArtifactKind::Dataset);
        assert_eq!(artifact.warnings().len(), 1);
    }

    #[test]
    fn test_inference_capability_on_dataset_warns() {
        let hints = CapabilityHints::new().with(Capability::Predict);
        let artifact = wrap(fixtures::credit_dataset(), Some(hints)).unwrap();

        assert!(artifact.has(&Capability::Predict));
        assert_eq!(artifact.warnings().len(), 1);
    }

    #[test]
    fn test_invalid_tag_ignored_with_warning() {
        #[derive(Debug)]
        struct Tagged;
        impl RawArtifact for Tagged {
            fn describe(&self) -> ArtifactDescriptor {
                ArtifactDescriptor::new("tagged").with_rows(3).with_tag("Bad Tag").with_tag("has_raw_pii")
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }

        let artifact = wrap(Arc::new(Tagged), None).unwrap();
        assert!(artifact.has(&Capability::Custom("has_raw_pii".to_string())));
        assert_eq!(
            artifact.warnings(),
            &[ArtifactWarning::IgnoredTag { tag: "Bad Tag".to_string() }]
        );
    }

    #[test]
    fn test_id_is_stable_across_wraps() {
        let raw = fixtures::credit_dataset();
        let a = wrap(raw.clone(), None).unwrap();
        let b = wrap(raw, Some(CapabilityHints::new().with_role(DatasetRole::Training))).unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(b.role(), Some(DatasetRole::Training));
    }

    #[test]
    fn test_mutation_after_wrap_is_detected() {
        let raw = Arc::new(TabularData::new("d", vec!["x".into()], vec![vec![1.0]]));
        let artifact = wrap(raw.clone(), None).unwrap();
        assert!(!artifact.is_stale());

        raw.update(|frame| frame.rows[0][0] = 2.0);
        assert!(artifact.is_stale());

        let set = ArtifactSet::from_artifacts([artifact]).unwrap();
        assert!(matches!(set.ensure_fresh(), Err(ArtifactError::StaleArtifact { .. })));
    }

    #[test]
    fn test_same_dataset_in_two_roles_rejected() {
        let raw = fixtures::credit_dataset();
        let assessment = wrap(raw.clone(), None).unwrap();
        let training = wrap(raw, Some(CapabilityHints::new().with_role(DatasetRole::Training))).unwrap();

        let err = ArtifactSet::from_artifacts([assessment, training]).unwrap_err();
        assert!(matches!(err, ArtifactError::DuplicateArtifact { .. }));
    }

    #[test]
    fn test_artifact_set_orders_and_resolves() {
        let model = wrap(
            Arc::new(ModelArtifact::new("m", Arc::new(ThresholdClassifier::new(0, 0.5)))),
            None,
        )
        .unwrap();
        let data = wrap(fixtures::credit_dataset(), None).unwrap();
        let model_id = model.id().to_string();

        let set = ArtifactSet::from_artifacts([model, data]).unwrap();
        let ids: Vec<&str> = set.iter().map(|a| a.id()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);

        assert_eq!(set.resolve(&[model_id]).unwrap().len(), 1);
        assert!(matches!(
            set.resolve(&["missing".to_string()]),
            Err(ArtifactError::UnknownArtifact { .. })
        ));
    }
}
