//! Export destinations.

use super::ExportDocument;
use crate::utils::generate_uuid_v7;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::debug;

/// A destination's answer to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Id the destination assigned to the report.
    pub remote_id: String,
    /// True if the destination already held a report with this fingerprint.
    pub duplicate: bool,
}

impl Delivery {
    /// A newly stored report.
    #[must_use]
    pub fn stored(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            duplicate: false,
        }
    }

    /// A report the destination already held.
    #[must_use]
    pub fn duplicate(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            duplicate: true,
        }
    }
}

/// A failed delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Worth retrying: network errors, timeouts, throttling, server errors.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// The destination refused the document.
    #[error("delivery rejected: {message}")]
    Rejected {
        /// HTTP-like status, when there is one.
        status: Option<u16>,
        /// Reason given by the destination.
        message: String,
    },
}

impl DeliveryError {
    /// Returns true for failures worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Where reports are delivered.
///
/// Implementations must deduplicate on [`ExportDocument::fingerprint`]:
/// delivering the same document twice stores it once and reports
/// `duplicate = true` with the original remote id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExportDestination: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> String;

    /// Tenant recorded in the document, if the destination has one.
    fn tenant(&self) -> Option<String> {
        None
    }

    /// Delivers one document.
    async fn deliver(&self, document: &ExportDocument) -> Result<Delivery, DeliveryError>;
}

#[derive(Debug, Clone)]
struct StoredReport {
    remote_id: String,
    document: ExportDocument,
}

/// An in-process governance store, for tests and dry runs.
///
/// Can be told to fail transiently a number of times, or to reject
/// everything.
#[derive(Debug, Default)]
pub struct InMemoryGovernance {
    tenant: Option<String>,
    reports: DashMap<String, StoredReport>,
    transient_failures: AtomicUsize,
    rejection: Mutex<Option<(u16, String)>>,
    attempts: AtomicUsize,
}

impl InMemoryGovernance {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Fails the next `n` deliveries transiently.
    #[must_use]
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Rejects every delivery with `status`.
    #[must_use]
    pub fn rejecting(self, status: u16, message: impl Into<String>) -> Self {
        *self.rejection.lock() = Some((status, message.into()));
        self
    }

    /// Deliveries attempted, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of distinct reports stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// The stored document for `fingerprint`.
    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<ExportDocument> {
        self.reports.get(fingerprint).map(|r| r.document.clone())
    }

    /// The remote id assigned to `fingerprint`.
    #[must_use]
    pub fn remote_id(&self, fingerprint: &str) -> Option<String> {
        self.reports.get(fingerprint).map(|r| r.remote_id.clone())
    }
}

#[async_trait]
impl ExportDestination for InMemoryGovernance {
    fn name(&self) -> String {
        "in_memory".to_string()
    }

    fn tenant(&self) -> Option<String> {
        self.tenant.clone()
    }

    async fn deliver(&self, document: &ExportDocument) -> Result<Delivery, DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let rejection = self.rejection.lock().clone();
        if let Some((status, message)) = rejection {
            return Err(DeliveryError::Rejected {
                status: Some(status),
                message,
            });
        }
        let injected = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(DeliveryError::Transient("injected failure".to_string()));
        }

        let delivery = match self.reports.entry(document.fingerprint.clone()) {
            Entry::Occupied(stored) => Delivery::duplicate(stored.get().remote_id.clone()),
            Entry::Vacant(slot) => {
                let remote_id = format!("asm-{}", generate_uuid_v7());
                slot.insert(StoredReport {
                    remote_id: remote_id.clone(),
                    document: document.clone(),
                });
                Delivery::stored(remote_id)
            }
        };
        debug!(
            fingerprint = %document.fingerprint,
            duplicate = delivery.duplicate,
            "Stored report in memory"
        );
        Ok(delivery)
    }
}
