//! Governance export.
//!
//! This module provides:
//! - `GovernanceExporter`, delivering reports with bounded retries
//! - The `ExportDestination` trait and its HTTP, local-file and in-memory
//!   implementations
//! - The export document format
//! - Retry configuration with backoff and jitter

mod config;
mod destination;
mod document;
mod exporter;
#[cfg(feature = "http")]
mod http;
mod local;
mod retry;

pub use config::{ExportConfig, GovernanceCredentials, ENV_API_KEY, ENV_TENANT, ENV_URL};
#[cfg(test)]
pub use destination::MockExportDestination;
pub use destination::{Delivery, DeliveryError, ExportDestination, InMemoryGovernance};
pub use document::{ExportDocument, ExportedEvidence, SourceMetadata, DOCUMENT_TYPE};
pub use exporter::{ExportReceipt, GovernanceExporter};
#[cfg(feature = "http")]
pub use http::{classify_status, content_md5, HttpDestination, StatusClass};
pub use local::LocalSink;
pub use retry::{
    should_retry, BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision, RetryState,
};
