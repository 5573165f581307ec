//! Testing utilities for assessment pipelines.
//!
//! This module provides:
//! - Mock assessments (static, failing, slow, panicking, schema-violating)
//! - A threshold classifier and credit dataset fixtures
//! - Assertions over run results

mod assertions;
pub mod fixtures;
mod mocks;

pub use assertions::{assert_failed_with, assert_pair_status, find_metric};
pub use mocks::{
    BlockingClassifier, FailingAssessment, PanickingAssessment, SchemaViolatingAssessment, SlowAssessment,
    StaticAssessment, ThresholdClassifier,
};
