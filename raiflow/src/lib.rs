//! # Raiflow
//!
//! Orchestration core for responsible-AI assessments.
//!
//! Raiflow takes a model and its datasets, finds every registered assessment
//! that can run against them, runs those assessments concurrently, and
//! turns their outputs into one fingerprinted report for a governance
//! system:
//!
//! - **Artifact wrapping**: models and datasets are introspected once into a
//!   fixed capability vocabulary
//! - **Assessment registry**: versioned, pluggable assessments declaring
//!   the capabilities they require
//! - **Capability matching**: a deterministic plan of assessment and
//!   artifact pairs, with unmet requirements recorded as skips
//! - **Pipeline execution**: bounded concurrency, per-pair timeouts,
//!   failure isolation and cancellation
//! - **Evidence aggregation**: an order-independent, content-addressed report
//! - **Governance export**: idempotent delivery with bounded retries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use raiflow::prelude::*;
//!
//! let artifacts = ArtifactSet::from_artifacts([wrap(model, None)?, wrap(dataset, None)?])?;
//! let registry = AssessmentRegistry::with_builtins();
//!
//! let plan = match_assessments(&artifacts, &registry);
//! let run = PipelineExecutor::new(ExecutorConfig::new()).execute(&plan, &artifacts).await?;
//! let report = aggregate(run);
//!
//! let receipt = GovernanceExporter::default()
//!     .export(&report, &LocalSink::new("reports"))
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod artifact;
pub mod errors;
pub mod events;
pub mod evidence;
pub mod export;
pub mod matcher;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifact::{
        wrap, Artifact, ArtifactKind, ArtifactSet, Capability, CapabilityHints,
        CapabilityPredicate, DatasetRole, ModelArtifact, RawArtifact, TabularData,
    };
    pub use crate::errors::{
        ArtifactError, AssessmentError, ExportError, RaiflowError, RegistryError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::evidence::{AssessmentRef, Evidence, EvidenceDraft, EvidencePayload, EvidenceType};
    pub use crate::export::{
        ExportConfig, ExportDestination, ExportReceipt, GovernanceCredentials,
        GovernanceExporter, InMemoryGovernance, LocalSink,
    };
    #[cfg(feature = "http")]
    pub use crate::export::HttpDestination;
    pub use crate::matcher::{match_assessments, MatchPlan};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        CancellationToken, ExecutorConfig, PipelineExecutor, RunResult, RunStatus,
    };
    pub use crate::registry::{Assessment, AssessmentRegistry, Requirements, Slot};
    pub use crate::report::{aggregate, EvidenceAggregator, Report};
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
