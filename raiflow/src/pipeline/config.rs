//! Executor configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for [`super::PipelineExecutor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Per-invocation timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum pairs in flight at once.
    pub max_concurrency: usize,
    /// Parameters per assessment name.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    /// Refuse to start when an artifact changed since wrapping.
    pub fail_on_stale: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 300_000,
            max_concurrency: 4,
            params: BTreeMap::new(),
            fail_on_stale: true,
        }
    }
}

impl ExecutorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-invocation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the worker pool size. Zero is treated as one.
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Sets parameters for one assessment.
    #[must_use]
    pub fn with_params(mut self, assessment: impl Into<String>, params: Value) -> Self {
        self.params.insert(assessment.into(), params);
        self
    }

    /// Allows running on artifacts that changed since wrapping.
    #[must_use]
    pub fn allow_stale(mut self) -> Self {
        self.fail_on_stale = false;
        self
    }

    /// The per-invocation timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Effective pool size.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    /// Parameters for an assessment; an empty object if none were set.
    #[must_use]
    pub fn params_for(&self, assessment: &str) -> Value {
        self.params
            .get(assessment)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}
