//! Append-only chat transcript.
//!
//! Every formatted line (chat and system) is appended to a plain text file.
//! Write failures are reported through `tracing` and never interrupt the
//! chat service.

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::Result;

/// Transcript sink backed by a file.
#[derive(Debug)]
pub struct ChatLog {
    path: Option<PathBuf>,
    /// Serializes appends so lines from concurrent sessions never interleave.
    write_lock: Mutex<()>,
}

impl ChatLog {
    /// Create a sink appending to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a sink that discards everything.
    pub fn disabled() -> Self {
        Self {
            path: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Build from the configured path; an empty path disables the sink.
    pub fn from_config(log_file: &str) -> Self {
        if log_file.trim().is_empty() {
            Self::disabled()
        } else {
            Self::new(log_file)
        }
    }

    /// Transcript path, if enabled.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one formatted line.
    pub async fn append(&self, line: &str) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Append one line, logging instead of failing.
    pub async fn record(&self, line: &str) {
        if let Err(e) = self.append(line).await {
            warn!(error = %e, path = ?self.path, "Failed to write chat transcript");
        }
    }
}
