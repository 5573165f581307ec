//! Assessment registry and its process-wide instance.

use super::version::{compare_versions, is_valid_name, is_valid_version};
use super::Assessment;
use crate::errors::RegistryError;
use crate::evidence::{AssessmentRef, EvidenceType};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Criteria for [`AssessmentRegistry::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssessmentFilter {
    /// Only assessments with these names.
    pub names: Option<Vec<String>>,
    /// Only assessments that may produce this evidence type.
    pub evidence_type: Option<EvidenceType>,
    /// Only deterministic assessments.
    pub deterministic_only: bool,
    /// Only the highest version of each name.
    pub latest_only: bool,
}

impl AssessmentFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to a set of names.
    #[must_use]
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to assessments producing an evidence type.
    #[must_use]
    pub fn with_evidence_type(mut self, evidence_type: EvidenceType) -> Self {
        self.evidence_type = Some(evidence_type);
        self
    }

    /// Restricts to deterministic assessments.
    #[must_use]
    pub fn deterministic(mut self) -> Self {
        self.deterministic_only = true;
        self
    }

    /// Keeps only the highest version of each name.
    #[must_use]
    pub fn latest(mut self) -> Self {
        self.latest_only = true;
        self
    }

    fn matches(&self, assessment: &dyn Assessment) -> bool {
        self.names
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| n == assessment.name()))
            && self
                .evidence_type
                .map_or(true, |t| assessment.evidence_types().contains(&t))
            && (!self.deterministic_only || assessment.deterministic())
    }
}

/// A request for one registered assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentSelector {
    /// Assessment name.
    pub name: String,
    /// Pinned version; `None` picks the highest.
    pub version: Option<String>,
}

impl AssessmentSelector {
    /// Selects the highest registered version of `name`.
    #[must_use]
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Selects an exact version.
    #[must_use]
    pub fn exact(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }
}

/// Registry of assessments keyed by name and version.
///
/// Reads take a shared lock; registration takes the exclusive lock, so a
/// registration is never observed half-done. Entries are kept sorted by
/// name, then version.
#[derive(Default)]
pub struct AssessmentRegistry {
    entries: RwLock<Vec<Arc<dyn Assessment>>>,
}

impl AssessmentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in assessments.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for assessment in super::builtin::builtin_assessments() {
            if let Err(e) = registry.register(assessment) {
                tracing::warn!(error = %e, "Skipping built-in assessment");
            }
        }
        registry
    }

    /// Registers an assessment.
    ///
    /// Fails with `DuplicateAssessment` if the name and version are taken;
    /// the existing entry is left untouched.
    pub fn register(&self, assessment: Arc<dyn Assessment>) -> Result<(), RegistryError> {
        validate_definition(assessment.as_ref())?;
        let key = assessment.reference();

        let mut entries = self.entries.write();
        match entries.binary_search_by(|e| e.reference().cmp(&key)) {
            Ok(_) => Err(RegistryError::DuplicateAssessment {
                name: key.name,
                version: key.version,
            }),
            Err(pos) => {
                entries.insert(pos, assessment);
                info!(assessment = %key.name, version = %key.version, "Assessment registered");
                Ok(())
            }
        }
    }

    /// Lists assessments matching the filter, ordered by name then version.
    pub fn list(&self, filter: Option<&AssessmentFilter>) -> Vec<Arc<dyn Assessment>> {
        let entries = self.entries.read();
        let mut selected: Vec<Arc<dyn Assessment>> = entries
            .iter()
            .filter(|a| filter.map_or(true, |f| f.matches(a.as_ref())))
            .cloned()
            .collect();
        drop(entries);

        if filter.is_some_and(|f| f.latest_only) {
            // Sorted ascending: keep the last entry of each name.
            let mut latest: Vec<Arc<dyn Assessment>> = Vec::with_capacity(selected.len());
            for a in selected {
                match latest.last() {
                    Some(prev) if prev.name() == a.name() => {
                        let last = latest.len() - 1;
                        latest[last] = a;
                    }
                    _ => latest.push(a),
                }
            }
            selected = latest;
        }
        selected
    }

    /// Looks up an exact name and version.
    pub fn get(&self, name: &str, version: &str) -> Result<Arc<dyn Assessment>, RegistryError> {
        self.entries
            .read()
            .iter()
            .find(|a| a.name() == name && a.version() == version)
            .cloned()
            .ok_or_else(|| RegistryError::AssessmentNotFound {
                name: name.to_string(),
                version: Some(version.to_string()),
            })
    }

    /// Looks up the highest registered version of a name.
    pub fn latest(&self, name: &str) -> Result<Arc<dyn Assessment>, RegistryError> {
        self.entries
            .read()
            .iter()
            .filter(|a| a.name() == name)
            .max_by(|a, b| compare_versions(a.version(), b.version()))
            .cloned()
            .ok_or_else(|| RegistryError::AssessmentNotFound {
                name: name.to_string(),
                version: None,
            })
    }

    /// Resolves every selector, failing on the first unknown one.
    pub fn select(
        &self,
        selectors: &[AssessmentSelector],
    ) -> Result<Vec<Arc<dyn Assessment>>, RegistryError> {
        let mut selected: Vec<Arc<dyn Assessment>> = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let found = match &selector.version {
                Some(v) => self.get(&selector.name, v)?,
                None => self.latest(&selector.name)?,
            };
            if !selected.iter().any(|s| s.reference() == found.reference()) {
                selected.push(found);
            }
        }
        selected.sort_by_key(|a| a.reference());
        Ok(selected)
    }

    /// Number of registered assessments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// References of all registered assessments, in order.
    #[must_use]
    pub fn references(&self) -> Vec<AssessmentRef> {
        self.entries.read().iter().map(|a| a.reference()).collect()
    }
}

impl std::fmt::Debug for AssessmentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssessmentRegistry")
            .field("assessments", &self.references())
            .finish()
    }
}

fn validate_definition(assessment: &dyn Assessment) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidDefinition {
        name: assessment.name().to_string(),
        reason: reason.to_string(),
    };

    if !is_valid_name(assessment.name()) {
        return Err(invalid("name must match ^[A-Za-z][A-Za-z0-9_.-]*$"));
    }
    if !is_valid_version(assessment.version()) {
        return Err(invalid("version must be dotted numeric, e.g. 1.2.0"));
    }
    if assessment.requirements().slots().is_empty() {
        return Err(invalid("at least one artifact slot is required"));
    }
    if assessment.evidence_types().is_empty() {
        return Err(invalid("at least one evidence type must be declared"));
    }
    Ok(())
}

static GLOBAL_REGISTRY: RwLock<Option<Arc<AssessmentRegistry>>> = RwLock::new(None);

/// Initializes the process-wide registry.
///
/// Returns the existing instance if already initialized.
pub fn init_global_registry(with_builtins: bool) -> Arc<AssessmentRegistry> {
    let mut slot = GLOBAL_REGISTRY.write();
    if let Some(existing) = slot.as_ref() {
        debug!("Assessment registry already initialized");
        return existing.clone();
    }
    let registry = Arc::new(if with_builtins {
        AssessmentRegistry::with_builtins()
    } else {
        AssessmentRegistry::new()
    });
    *slot = Some(registry.clone());
    info!(assessments = registry.len(), "Assessment registry initialized");
    registry
}

/// Returns the process-wide registry.
pub fn global_registry() -> Result<Arc<AssessmentRegistry>, RegistryError> {
    GLOBAL_REGISTRY
        .read()
        .clone()
        .ok_or(RegistryError::NotInitialized)
}

/// Drops the process-wide registry.
///
/// Holders of an `Arc` from before teardown keep a working registry.
pub fn teardown_global_registry() {
    if GLOBAL_REGISTRY.write().take().is_some() {
        info!("Assessment registry torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticAssessment;
    use pretty_assertions::assert_eq;

    fn names(list: &[Arc<dyn Assessment>]) -> Vec<String> {
        list.iter().map(|a| a.reference().to_string()).collect()
    }

    #[test]
    fn test_register_and_list_sorted() {
        let registry = AssessmentRegistry::new();
        registry.register(Arc::new(StaticAssessment::metric("privacy", "1.0.0", 0.1))).unwrap();
        registry.register(Arc::new(StaticAssessment::metric("fairness", "1.10.0", 0.2))).unwrap();
        registry.register(Arc::new(StaticAssessment::metric("fairness", "1.9.0", 0.3))).unwrap();

        assert_eq!(
            names(&registry.list(None)),
            vec!["fairness@1.9.0", "fairness@1.10.0", "privacy@1.0.0"]
        );
    }

    #[test]
    fn test_duplicate_rejected_without_overwrite() {
        let registry = AssessmentRegistry::new();
        let original = Arc::new(StaticAssessment::metric("fairness", "1.0.0", 0.2).with_description("original"));
        registry.register(original).unwrap();

        let err = registry
            .register(Arc::new(StaticAssessment::metric("fairness", "1.0.0", 0.9).with_description("impostor")))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateAssessment {
                name: "fairness".to_string(),
                version: "1.0.0".to_string(),
            }
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("fairness", "1.0.0").unwrap().description(), "original");
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        let registry = AssessmentRegistry::new();
        let bad_name = registry.register(Arc::new(StaticAssessment::metric("9lives", "1.0", 0.0)));
        assert!(matches!(bad_name, Err(RegistryError::InvalidDefinition { .. })));

        let bad_version = registry.register(Arc::new(StaticAssessment::metric("ok", "v1", 0.0)));
        assert!(matches!(bad_version, Err(RegistryError::InvalidDefinition { .. })));

        let no_slots = registry.register(Arc::new(
            StaticAssessment::metric("ok", "1.0", 0.0).with_requirements(crate::registry::Requirements::new()),
        ));
        assert!(matches!(no_slots, Err(RegistryError::InvalidDefinition { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_and_latest() {
        let registry = AssessmentRegistry::new();
        registry.register(Arc::new(StaticAssessment::metric("fairness", "1.2.0", 0.2))).unwrap();
        registry.register(Arc::new(StaticAssessment::metric("fairness", "2.0.0-rc.1", 0.2))).unwrap();
        registry.register(Arc::new(StaticAssessment::metric("fairness", "1.10.0", 0.2))).unwrap();

        assert_eq!(registry.latest("fairness").unwrap().version(), "2.0.0-rc.1");
        assert!(registry.get("fairness", "1.2.0").is_ok());
        assert_eq!(
            registry.get("fairness", "3.0").unwrap_err(),
            RegistryError::AssessmentNotFound {
                name: "fairness".to_string(),
                version: Some("3.0".to_string()),
            }
        );
        assert!(registry.latest("privacy").is_err());
    }

    #[test]
    fn test_filter_by_name_type_and_latest() {
        let registry = AssessmentRegistry::new();
        registry.register(Arc::new(StaticAssessment::metric("fairness", "1.0", 0.2))).unwrap();
        registry.register(Arc::new(StaticAssessment::metric("fairness", "2.0", 0.2))).unwrap();
        registry.register(Arc::new(StaticAssessment::metric("privacy", "1.0", 0.2))).unwrap();

        let by_name = AssessmentFilter::new().with_names(["fairness"]);
        assert_eq!(names(&registry.list(Some(&by_name))), vec!["fairness@1.0", "fairness@2.0"]);

        let latest = AssessmentFilter::new().latest();
        assert_eq!(names(&registry.list(Some(&latest))), vec!["fairness@2.0", "privacy@1.0"]);

        let tables = AssessmentFilter::new().with_evidence_type(EvidenceType::Table);
        assert!(registry.list(Some(&tables)).is_empty());
    }

    #[test]
    fn test_select_resolves_or_fails() {
        let registry = AssessmentRegistry::new();
        registry.register(Arc::new(StaticAssessment::metric("fairness", "1.0", 0.2))).unwrap();
        registry.register(Arc::new(StaticAssessment::metric("fairness", "2.0", 0.2))).unwrap();

        let picked = registry
            .select(&[AssessmentSelector::latest("fairness"), AssessmentSelector::exact("fairness", "1.0")])
            .unwrap();
        assert_eq!(names(&picked), vec!["fairness@1.0", "fairness@2.0"]);

        let missing = registry.select(&[AssessmentSelector::latest("privacy")]);
        assert!(matches!(missing, Err(RegistryError::AssessmentNotFound { .. })));
    }

    #[test]
    fn test_concurrent_reads_during_registration() {
        let registry = Arc::new(AssessmentRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let name = format!("assessment_{i}");
                    registry.register(Arc::new(StaticAssessment::metric(&name, "1.0", 0.0))).unwrap();
                    registry.list(None).len()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap() >= 1);
        }
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_global_registry_lifecycle() {
        teardown_global_registry();
        assert_eq!(global_registry().unwrap_err(), RegistryError::NotInitialized);

        let registry = init_global_registry(true);
        assert!(!registry.is_empty());
        assert!(Arc::ptr_eq(&registry, &init_global_registry(false)));
        assert!(Arc::ptr_eq(&registry, &global_registry().unwrap()));

        teardown_global_registry();
        assert!(global_registry().is_err());
        // Earlier handles keep working after teardown.
        assert!(registry.latest("performance").is_ok());
    }
}
