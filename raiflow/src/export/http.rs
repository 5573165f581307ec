//! Governance API destination over HTTP.

use super::{Delivery, DeliveryError, ExportDestination, ExportDocument, GovernanceCredentials};
use crate::errors::ExportError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use md5::{Digest, Md5};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// How a governance API status code is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Stored.
    Accepted,
    /// Already stored under this fingerprint.
    Duplicate,
    /// Retry later.
    Transient,
    /// Permanent refusal.
    Rejected,
}

/// Classifies a response status.
#[must_use]
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Accepted,
        409 => StatusClass::Duplicate,
        408 | 429 | 500..=599 => StatusClass::Transient,
        400..=499 => StatusClass::Rejected,
        _ => StatusClass::Transient,
    }
}

/// Posts reports to `{url}/api/v2/{tenant}/assessments`.
///
/// Sends the report fingerprint as `Idempotency-Key` and the body digest
/// as `Content-MD5`.
#[derive(Debug, Clone)]
pub struct HttpDestination {
    client: Client,
    credentials: GovernanceCredentials,
}

impl HttpDestination {
    /// Creates a destination with a 30 second request timeout.
    pub fn new(credentials: GovernanceCredentials) -> Result<Self, ExportError> {
        Self::with_timeout(credentials, Duration::from_secs(30))
    }

    /// Creates a destination with a custom request timeout.
    pub fn with_timeout(
        credentials: GovernanceCredentials,
        timeout: Duration,
    ) -> Result<Self, ExportError> {
        if credentials.url.trim().is_empty() {
            return Err(ExportError::Configuration("governance url is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExportError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            credentials,
        })
    }

    /// Endpoint reports are posted to.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/api/v2/{}/assessments",
            self.credentials.url.trim_end_matches('/'),
            self.credentials.tenant
        )
    }
}

/// Base64 MD5 of `body`, as sent in `Content-MD5`.
#[must_use]
pub fn content_md5(body: &[u8]) -> String {
    STANDARD.encode(Md5::digest(body))
}

fn remote_id_from(body: &str, fallback: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("id").and_then(Value::as_str).map(ToString::to_string))
        .unwrap_or_else(|| fallback.to_string())
}

#[async_trait]
impl ExportDestination for HttpDestination {
    fn name(&self) -> String {
        format!("http:{}", self.credentials.url)
    }

    fn tenant(&self) -> Option<String> {
        Some(self.credentials.tenant.clone())
    }

    async fn deliver(&self, document: &ExportDocument) -> Result<Delivery, DeliveryError> {
        let body = document.to_bytes().map_err(|e| DeliveryError::Rejected {
            status: None,
            message: e.to_string(),
        })?;
        let digest = content_md5(&body);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.credentials.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header("Idempotency-Key", &document.fingerprint)
            .header("Content-MD5", digest)
            .body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        debug!(status, fingerprint = %document.fingerprint, "Governance API responded");

        match classify_status(status) {
            StatusClass::Accepted => {
                let duplicate = serde_json::from_str::<Value>(&text)
                    .ok()
                    .and_then(|v| v.get("duplicate").and_then(Value::as_bool))
                    .unwrap_or(false);
                Ok(Delivery {
                    remote_id: remote_id_from(&text, &document.fingerprint),
                    duplicate,
                })
            }
            StatusClass::Duplicate => {
                Ok(Delivery::duplicate(remote_id_from(&text, &document.fingerprint)))
            }
            StatusClass::Transient => {
                warn!(status, "Governance API unavailable");
                Err(DeliveryError::Transient(format!("status {status}: {text}")))
            }
            StatusClass::Rejected => Err(DeliveryError::Rejected {
                status: Some(status),
                message: text,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(201), StatusClass::Accepted);
        assert_eq!(classify_status(409), StatusClass::Duplicate);
        for status in [408, 429, 500, 502, 503] {
            assert_eq!(classify_status(status), StatusClass::Transient, "{status}");
        }
        for status in [400, 401, 403, 404, 422] {
            assert_eq!(classify_status(status), StatusClass::Rejected, "{status}");
        }
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let dest = HttpDestination::new(GovernanceCredentials::new(
            "acme",
            "https://gov.example/",
            "key",
        ))
        .unwrap();
        assert_eq!(dest.endpoint(), "https://gov.example/api/v2/acme/assessments");
        assert_eq!(dest.tenant().as_deref(), Some("acme"));
    }

    #[test]
    fn test_content_md5() {
        assert_eq!(content_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
    }

    #[test]
    fn test_remote_id_fallback() {
        assert_eq!(remote_id_from(r#"{"id": "asm-9"}"#, "fp"), "asm-9");
        assert_eq!(remote_id_from("not json", "fp"), "fp");
    }

    #[test]
    fn test_empty_url_is_configuration_error() {
        let err = HttpDestination::new(GovernanceCredentials::new("acme", " ", "key")).unwrap_err();
        assert!(matches!(err, ExportError::Configuration(_)));
    }
}
