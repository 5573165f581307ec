//! Exporter configuration and governance credentials.

use super::RetryConfig;
use crate::errors::ExportError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable holding the governance tenant.
pub const ENV_TENANT: &str = "RAIFLOW_TENANT";
/// Environment variable holding the governance API base URL.
pub const ENV_URL: &str = "RAIFLOW_URL";
/// Environment variable holding the governance API key.
pub const ENV_API_KEY: &str = "RAIFLOW_API_KEY";

/// Configuration for [`super::GovernanceExporter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Retry behaviour for transient failures.
    pub retry: RetryConfig,
    /// Name recorded as the document source.
    pub source: String,
    /// Version recorded with the source.
    pub source_version: String,
    /// Governance use case the assessments are attached to.
    pub use_case_id: Option<String>,
    /// Policy pack the assessments are evaluated against.
    pub policy_pack_id: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            source: "raiflow".to_string(),
            source_version: env!("CARGO_PKG_VERSION").to_string(),
            use_case_id: None,
            policy_pack_id: None,
        }
    }
}

impl ExportConfig {
    /// Creates the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry config.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Targets a governance use case.
    #[must_use]
    pub fn with_use_case(mut self, id: impl Into<String>) -> Self {
        self.use_case_id = Some(id.into());
        self
    }

    /// Targets a policy pack.
    #[must_use]
    pub fn with_policy_pack(mut self, id: impl Into<String>) -> Self {
        self.policy_pack_id = Some(id.into());
        self
    }
}

/// Credentials for the governance API.
///
/// The API key never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct GovernanceCredentials {
    /// Tenant the reports belong to.
    pub tenant: String,
    /// Base URL of the governance API.
    pub url: String,
    /// Bearer token.
    pub api_key: String,
}

impl GovernanceCredentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(
        tenant: impl Into<String>,
        url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    /// Reads `RAIFLOW_TENANT`, `RAIFLOW_URL` and `RAIFLOW_API_KEY`.
    pub fn from_env() -> Result<Self, ExportError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ExportError> {
        let read = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ExportError::Configuration(format!("{key} is not set")))
        };
        Ok(Self::new(read(ENV_TENANT)?, read(ENV_URL)?, read(ENV_API_KEY)?))
    }
}

impl fmt::Debug for GovernanceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GovernanceCredentials")
            .field("tenant", &self.tenant)
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
