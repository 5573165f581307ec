//! Assigning artifacts to assessment slots.

use super::{MatchPlan, PlannedPair, SkipReason, SkippedAssessment};
use crate::artifact::{Artifact, ArtifactSet};
use crate::errors::RegistryError;
use crate::registry::{Assessment, AssessmentRegistry, AssessmentSelector};
use std::sync::Arc;
use tracing::debug;

/// Matches every registered assessment against the artifacts.
///
/// Pure and deterministic: the plan depends only on the artifact ids and
/// capabilities and the registry contents, never on insertion order.
pub fn match_assessments(artifacts: &ArtifactSet, registry: &AssessmentRegistry) -> MatchPlan {
    plan_for(artifacts, &registry.list(None))
}

/// Matches only the requested assessments.
///
/// An unknown name or version fails before anything is planned.
pub fn match_selected(
    artifacts: &ArtifactSet,
    registry: &AssessmentRegistry,
    selection: &[AssessmentSelector],
) -> Result<MatchPlan, RegistryError> {
    let assessments = registry.select(selection)?;
    Ok(plan_for(artifacts, &assessments))
}

fn plan_for(artifacts: &ArtifactSet, assessments: &[Arc<dyn Assessment>]) -> MatchPlan {
    let mut pairs = Vec::new();
    let mut skipped = Vec::new();

    for assessment in assessments {
        match assignments(assessment.as_ref(), artifacts) {
            Ok(subsets) => {
                debug!(
                    assessment = %assessment.reference(),
                    pairs = subsets.len(),
                    "Assessment matched"
                );
                pairs.extend(subsets.into_iter().map(|ids| PlannedPair::new(assessment.clone(), ids)));
            }
            Err(detail) => {
                debug!(assessment = %assessment.reference(), %detail, "Assessment skipped");
                skipped.push(SkippedAssessment {
                    assessment: assessment.reference(),
                    reason: SkipReason::CapabilityUnmet,
                    detail,
                });
            }
        }
    }

    MatchPlan::new(pairs, skipped)
}

/// All distinct-artifact assignments, or a description of the unmet slot.
fn assignments(assessment: &dyn Assessment, artifacts: &ArtifactSet) -> Result<Vec<Vec<String>>, String> {
    let requirements = assessment.requirements();
    let mut candidates: Vec<Vec<&Arc<Artifact>>> = Vec::with_capacity(requirements.slots().len());

    for slot in requirements.slots() {
        let fits: Vec<&Arc<Artifact>> = artifacts.iter().filter(|a| slot.accepts(a)).collect();
        if fits.is_empty() {
            return Err(slot.describe());
        }
        candidates.push(fits);
    }

    let mut out = Vec::new();
    let mut current = Vec::with_capacity(candidates.len());
    product(&candidates, &mut current, &mut out);

    if out.is_empty() {
        let names: Vec<&str> = requirements.slots().iter().map(|s| s.name.as_str()).collect();
        return Err(format!("no distinct artifacts for slots {}", names.join(", ")));
    }
    Ok(out)
}

/// Cartesian product over slot candidates, skipping repeated artifacts.
fn product(candidates: &[Vec<&Arc<Artifact>>], current: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    let Some((first, rest)) = candidates.split_first() else {
        out.push(current.clone());
        return;
    };
    for artifact in first {
        if current.iter().any(|id| id == artifact.id()) {
            continue;
        }
        current.push(artifact.id().to_string());
        product(rest, current, out);
        current.pop();
    }
}
