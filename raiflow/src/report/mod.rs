//! Evidence aggregation.
//!
//! This module provides:
//! - `EvidenceAggregator`, turning a `RunResult` into a `Report`
//! - The run manifest and its summary counts
//! - The order-independent content fingerprint

mod aggregator;
mod manifest;

pub use aggregator::{aggregate, fingerprint, sort_evidence, EvidenceAggregator, Report};
pub use manifest::{ManifestEntry, ReportSummary};
