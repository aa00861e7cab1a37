// Append-only audit log of rates requests and upstream responses
// One JSON object per line; the service never reads it back.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    Request,
    Response,
}

#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: String,
    #[serde(rename = "type")]
    kind: EntryKind,
    data: &'a Value,
}

pub struct AuditLog {
    path: PathBuf,
    // Serializes appends from concurrent requests
    file: Mutex<File>,
}

impl AuditLog {
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // A failed write is logged and otherwise ignored, it never fails the request
    pub async fn record(&self, kind: EntryKind, data: &Value) {
        if let Err(e) = self.append(kind, data).await {
            warn!(path = %self.path.display(), error = %e, "Failed to write audit log entry");
        }
    }

    async fn append(&self, kind: EntryKind, data: &Value) -> std::io::Result<()> {
        let entry = AuditEntry {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            kind,
            data,
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await
    }
}
