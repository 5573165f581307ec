//! Capability matching.
//!
//! This module provides:
//! - `match_assessments`, planning every applicable (assessment, artifacts) pair
//! - `match_selected`, planning only explicitly requested assessments
//! - `MatchPlan` with its ordered pairs and skipped assessments

mod matching;
mod plan;

pub use matching::{match_assessments, match_selected};
pub use plan::{MatchPlan, PlannedPair, SkipReason, SkippedAssessment};
