//! The output of matching: what will run and what will not.

use crate::evidence::AssessmentRef;
use crate::registry::Assessment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Why an assessment or pair did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No subset of the supplied artifacts satisfies the requirements.
    CapabilityUnmet,
    /// The run was cancelled before the pair started.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapabilityUnmet => write!(f, "capability_unmet"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One assessment bound to one artifact per slot.
#[derive(Clone)]
pub struct PlannedPair {
    assessment: Arc<dyn Assessment>,
    artifact_ids: Vec<String>,
}

impl PlannedPair {
    /// Creates a pair. `artifact_ids` follow the assessment's slot order.
    #[must_use]
    pub fn new(assessment: Arc<dyn Assessment>, artifact_ids: Vec<String>) -> Self {
        Self {
            assessment,
            artifact_ids,
        }
    }

    /// The assessment to run.
    #[must_use]
    pub fn assessment(&self) -> &Arc<dyn Assessment> {
        &self.assessment
    }

    /// Name and version of the assessment.
    #[must_use]
    pub fn reference(&self) -> AssessmentRef {
        self.assessment.reference()
    }

    /// Artifact ids, one per slot.
    #[must_use]
    pub fn artifact_ids(&self) -> &[String] {
        &self.artifact_ids
    }

    /// Identity used to order pairs and match them across runs.
    #[must_use]
    pub fn key(&self) -> (AssessmentRef, Vec<String>) {
        (self.reference(), self.artifact_ids.clone())
    }
}

impl fmt::Debug for PlannedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedPair")
            .field("assessment", &self.reference().to_string())
            .field("artifact_ids", &self.artifact_ids)
            .finish()
    }
}

/// An assessment that was considered and will not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAssessment {
    /// The skipped assessment.
    pub assessment: AssessmentRef,
    /// Why it was skipped.
    pub reason: SkipReason,
    /// The unmet requirement, human-readable.
    pub detail: String,
}

/// Ordered pairs to execute, plus the assessments left out.
#[derive(Debug, Clone, Default)]
pub struct MatchPlan {
    pairs: Vec<PlannedPair>,
    skipped: Vec<SkippedAssessment>,
}

impl MatchPlan {
    /// Builds a plan, sorting pairs by assessment then artifact ids and
    /// skipped entries by assessment.
    #[must_use]
    pub fn new(mut pairs: Vec<PlannedPair>, mut skipped: Vec<SkippedAssessment>) -> Self {
        pairs.sort_by_cached_key(PlannedPair::key);
        pairs.dedup_by(|a, b| a.key() == b.key());
        skipped.sort_by(|a, b| a.assessment.cmp(&b.assessment));
        Self { pairs, skipped }
    }

    /// Pairs in execution order.
    #[must_use]
    pub fn pairs(&self) -> &[PlannedPair] {
        &self.pairs
    }

    /// Assessments with no satisfying artifact subset.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedAssessment] {
        &self.skipped
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if there is nothing to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Keeps only the pairs accepted by `keep`.
    #[must_use]
    pub fn retain<F>(mut self, mut keep: F) -> Self
    where
        F: FnMut(&PlannedPair) -> bool,
    {
        self.pairs.retain(|p| keep(p));
        self
    }
}
