//! Pipeline execution.
//!
//! This module provides:
//! - `PipelineExecutor`, running a match plan in a bounded worker pool
//! - Pair and run status machines
//! - Failure records with their kinds
//! - Cooperative cancellation
//! - Re-running only the failed pairs of a previous run

mod cancellation;
mod config;
mod executor;
mod failure;
mod run;
mod status;

#[cfg(test)]
mod integration_tests;

pub use cancellation::{CancelCallback, CancellationToken};
pub use config::ExecutorConfig;
pub use executor::PipelineExecutor;
pub use failure::{FailureKind, FailureRecord};
pub use run::{PairRecord, RunResult};
pub use status::{InvalidTransition, PairStatus, RunStatus};
