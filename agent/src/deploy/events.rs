//! Append-only deploy event log
//!
//! One timestamped line per pipeline transition or error. This is the only
//! place a webhook caller can observe the outcome of a triggered deploy.

use chrono::Utc;
use tracing::warn;

use crate::filesys::file::File;

/// Append-only log sink for pipeline events
pub struct EventLog {
    file: File,
}

impl EventLog {
    pub fn new(file: File) -> Self {
        Self { file }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Append one event line. Best-effort: logging must never fail a deploy.
    pub async fn append(&self, stage: &str, message: &str) {
        let line = format!(
            "{} [{}] {}",
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            stage,
            message
        );
        if let Err(e) = self.file.append_line(&line).await {
            warn!("Failed to append deploy event: {}", e);
        }
    }
}
