//! Offline destination: one JSON file per report.

use super::{Delivery, DeliveryError, ExportDestination, ExportDocument};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Writes reports to `<dir>/<fingerprint>.json`.
///
/// Files are written to a temporary name and renamed into place, so a
/// reader never sees a partial report.
#[derive(Debug, Clone)]
pub struct LocalSink {
    dir: PathBuf,
}

impl LocalSink {
    /// Creates a sink writing into `dir`. The directory is created on the
    /// first delivery.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `fingerprint`.
    #[must_use]
    pub fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.json"))
    }
}

fn io_error(action: &str, path: &Path, err: &std::io::Error) -> DeliveryError {
    DeliveryError::Transient(format!("{action} {}: {err}", path.display()))
}

#[async_trait]
impl ExportDestination for LocalSink {
    fn name(&self) -> String {
        format!("local:{}", self.dir.display())
    }

    async fn deliver(&self, document: &ExportDocument) -> Result<Delivery, DeliveryError> {
        let fingerprint = &document.fingerprint;
        if fingerprint.is_empty() || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DeliveryError::Rejected {
                status: None,
                message: format!("fingerprint '{fingerprint}' is not a hex digest"),
            });
        }

        let path = self.path_for(fingerprint);
        let remote_id = path.display().to_string();
        if fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %remote_id, "Report already on disk");
            return Ok(Delivery::duplicate(remote_id));
        }

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("create", &self.dir, &e))?;
        let body = document.to_pretty_json().map_err(|e| DeliveryError::Rejected {
            status: None,
            message: e.to_string(),
        })?;
        let tmp = self.dir.join(format!(".{fingerprint}.json.tmp"));
        fs::write(&tmp, body.as_bytes())
            .await
            .map_err(|e| io_error("write", &tmp, &e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error("rename", &path, &e))?;

        debug!(path = %remote_id, "Report written");
        Ok(Delivery::stored(remote_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportConfig;
    use crate::pipeline::{RunResult, RunStatus};
    use crate::report::aggregate;
    use crate::utils::now_utc;
    use pretty_assertions::assert_eq;

    fn document() -> ExportDocument {
        let report = aggregate(RunResult {
            run_id: "run-local".to_string(),
            retry_of: None,
            status: RunStatus::Complete,
            started_at: now_utc(),
            completed_at: now_utc(),
            pairs: Vec::new(),
            evidence: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            cancelled: None,
        });
        ExportDocument::build(&report, &ExportConfig::new(), None)
    }

    #[tokio::test]
    async fn test_writes_one_file_per_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalSink::new(dir.path().join("reports"));
        let doc = document();

        let first = sink.deliver(&doc).await.unwrap();
        let second = sink.deliver(&doc).await.unwrap();
        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.remote_id, second.remote_id);

        let written = std::fs::read(sink.path_for(&doc.fingerprint)).unwrap();
        let parsed: ExportDocument = serde_json::from_slice(&written).unwrap();
        assert_eq!(parsed, doc);

        let files = std::fs::read_dir(sink.dir()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn test_rejects_non_hex_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalSink::new(dir.path());
        let mut doc = document();
        doc.fingerprint = "../escape".to_string();

        let err = sink.deliver(&doc).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
