//! Delivering reports with bounded retries.

use super::{
    should_retry, DeliveryError, ExportConfig, ExportDestination, ExportDocument, RetryDecision,
    RetryState,
};
use crate::errors::ExportError;
use crate::events::{event_types, get_event_sink, EventSink};
use crate::report::Report;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Confirmation of an accepted export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReceipt {
    /// Id the destination assigned.
    pub remote_id: String,
    /// Fingerprint of the exported report.
    pub fingerprint: String,
    /// Delivery attempts made.
    pub attempts: usize,
    /// True if the destination already held this report.
    pub duplicate: bool,
    /// When the destination accepted the report.
    pub accepted_at: Timestamp,
}

/// Sends reports to governance destinations.
///
/// Delivery is at-least-once and keyed by the report fingerprint, so
/// exporting the same report again is safe.
pub struct GovernanceExporter {
    config: ExportConfig,
    sink: Arc<dyn EventSink>,
}

impl Default for GovernanceExporter {
    fn default() -> Self {
        Self::new(ExportConfig::default())
    }
}

impl GovernanceExporter {
    /// Creates an exporter using the default event sink.
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            sink: get_event_sink(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Exports `report` to `destination`.
    ///
    /// Transient failures are retried with backoff up to
    /// `retry.max_attempts`; rejections are returned immediately. The report
    /// is only borrowed and stays with the caller on failure.
    pub async fn export(
        &self,
        report: &Report,
        destination: &dyn ExportDestination,
    ) -> Result<ExportReceipt, ExportError> {
        let document = ExportDocument::build(report, &self.config, destination.tenant());
        let name = destination.name();
        let retry = &self.config.retry;
        let mut state = RetryState::new();

        loop {
            state.record_attempt();
            self.sink.try_emit(
                event_types::EXPORT_ATTEMPT,
                Some(json!({
                    "run_id": document.run_id,
                    "fingerprint": document.fingerprint,
                    "destination": name,
                    "attempt": state.attempts,
                })),
            );

            let error = match destination.deliver(&document).await {
                Ok(delivery) => {
                    info!(
                        run_id = %document.run_id,
                        fingerprint = %document.fingerprint,
                        destination = %name,
                        remote_id = %delivery.remote_id,
                        duplicate = delivery.duplicate,
                        attempts = state.attempts,
                        "Report exported"
                    );
                    self.sink.try_emit(
                        event_types::EXPORT_ACCEPTED,
                        Some(json!({
                            "run_id": document.run_id,
                            "fingerprint": document.fingerprint,
                            "remote_id": delivery.remote_id,
                            "duplicate": delivery.duplicate,
                            "attempts": state.attempts,
                        })),
                    );
                    return Ok(ExportReceipt {
                        remote_id: delivery.remote_id,
                        fingerprint: document.fingerprint,
                        attempts: state.attempts,
                        duplicate: delivery.duplicate,
                        accepted_at: now_utc(),
                    });
                }
                Err(error) => error,
            };

            match should_retry(&mut state, retry, error.is_transient()) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        fingerprint = %document.fingerprint,
                        destination = %name,
                        attempt = state.attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Export attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    warn!(
                        fingerprint = %document.fingerprint,
                        destination = %name,
                        attempts = state.attempts,
                        error = %error,
                        "Export failed"
                    );
                    return Err(ExportError::Failed {
                        attempts: state.attempts,
                        last_error: error.to_string(),
                    });
                }
                RetryDecision::NotRetryable => {
                    warn!(
                        fingerprint = %document.fingerprint,
                        destination = %name,
                        error = %error,
                        "Export rejected"
                    );
                    return Err(match error {
                        DeliveryError::Rejected { status, message } => {
                            ExportError::Rejected { status, message }
                        }
                        DeliveryError::Transient(message) => ExportError::Failed {
                            attempts: state.attempts,
                            last_error: message,
                        },
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::export::{
        Delivery, InMemoryGovernance, JitterStrategy, MockExportDestination, RetryConfig,
    };
    use crate::pipeline::{RunResult, RunStatus};
    use crate::report::aggregate;
    use pretty_assertions::assert_eq;

    fn report() -> Report {
        aggregate(RunResult {
            run_id: "run-export".to_string(),
            retry_of: None,
            status: RunStatus::Complete,
            started_at: now_utc(),
            completed_at: now_utc(),
            pairs: Vec::new(),
            evidence: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            cancelled: None,
        })
    }

    fn fast_retry(attempts: usize) -> ExportConfig {
        ExportConfig::new().with_retry(
            RetryConfig::new()
                .with_max_attempts(attempts)
                .with_base_delay_ms(1)
                .with_jitter(JitterStrategy::None),
        )
    }

    #[tokio::test]
    async fn test_export_is_idempotent() {
        let store = InMemoryGovernance::new().with_tenant("acme");
        let exporter = GovernanceExporter::new(fast_retry(3));
        let report = report();

        let first = exporter.export(&report, &store).await.unwrap();
        let second = exporter.export(&report, &store).await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.remote_id, second.remote_id);
        assert_eq!(store.len(), 1);
        let stored = store.get(report.fingerprint()).unwrap();
        assert_eq!(stored.tenant.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let store = InMemoryGovernance::new().with_transient_failures(2);
        let sink = Arc::new(CollectingEventSink::new());
        let exporter = GovernanceExporter::new(fast_retry(3)).with_event_sink(sink.clone());

        let receipt = exporter.export(&report(), &store).await.unwrap();
        assert_eq!(receipt.attempts, 3);
        assert_eq!(sink.events_of_type(event_types::EXPORT_ATTEMPT).len(), 3);
        assert_eq!(sink.events_of_type(event_types::EXPORT_ACCEPTED).len(), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let store = InMemoryGovernance::new().with_transient_failures(10);
        let exporter = GovernanceExporter::new(fast_retry(3));

        let err = exporter.export(&report(), &store).await.unwrap_err();
        assert_eq!(
            err,
            ExportError::Failed {
                attempts: 3,
                last_error: "transient delivery failure: injected failure".to_string(),
            }
        );
        assert_eq!(store.attempts(), 3);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let mut destination = MockExportDestination::new();
        destination.expect_name().return_const("mock".to_string());
        destination.expect_tenant().return_const(None::<String>);
        destination.expect_deliver().times(1).returning(|_| {
            Err(DeliveryError::Rejected {
                status: Some(422),
                message: "missing use case".to_string(),
            })
        });

        let err = GovernanceExporter::new(fast_retry(5))
            .export(&report(), &destination)
            .await
            .unwrap_err();
        assert!(err.is_rejected());
        assert_eq!(
            err,
            ExportError::Rejected {
                status: Some(422),
                message: "missing use case".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_document_carries_fingerprint_as_key() {
        let report = report();
        let expected = report.fingerprint().to_string();

        let mut destination = MockExportDestination::new();
        destination.expect_name().return_const("mock".to_string());
        destination
            .expect_tenant()
            .return_const(Some("acme".to_string()));
        destination
            .expect_deliver()
            .withf(move |doc| doc.fingerprint == expected && doc.tenant.as_deref() == Some("acme"))
            .times(1)
            .returning(|_| Ok(Delivery::stored("remote-1")));

        let receipt = GovernanceExporter::default()
            .export(&report, &destination)
            .await
            .unwrap();
        assert_eq!(receipt.remote_id, "remote-1");
        assert_eq!(receipt.attempts, 1);
    }
}
