//! Evidence: the normalized output of every assessment.
//!
//! Payloads are a closed, tagged set of types, each with its own schema.
//! Assessments return [`EvidenceDraft`]s; the executor validates them and
//! attaches provenance to produce immutable [`Evidence`].

mod payload;
mod record;

pub use payload::{
    EvidencePayload, EvidenceType, FigurePayload, MetricPayload, ModelProfilerPayload,
    ProfilerPayload, TablePayload,
};
pub use record::{AssessmentRef, Evidence, EvidenceDraft, Provenance};
