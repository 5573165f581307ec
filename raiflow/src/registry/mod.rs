//! Assessment registry.
//!
//! This module provides:
//! - The `Assessment` plugin trait and its `Requirements`
//! - `AssessmentRegistry`, keyed by name and version
//! - A process-wide registry with explicit init and teardown
//! - Built-in assessments

mod assessment;
mod builtin;
mod store;
mod version;

pub use assessment::{Assessment, Requirements, Slot};
pub use builtin::{
    builtin_assessments, register_builtins, DataProfilerAssessment, ModelFairnessAssessment,
    ModelProfilerAssessment, PerformanceAssessment,
};
pub use store::{
    global_registry, init_global_registry, teardown_global_registry, AssessmentFilter,
    AssessmentRegistry, AssessmentSelector,
};
pub use version::{compare_versions, is_valid_name, is_valid_version};
