use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fixlog_core::{Category, Severity};
use serde::{Deserialize, Serialize};

use crate::artifact::{read_json, write_json_atomic};

/// The single outstanding failure a working directory is waiting to see
/// fixed, plus the edits observed since it was recorded.
///
/// Present on disk means `AwaitingFix`; absent means `Idle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCorrelation {
    pub command: String,
    pub snippet: String,
    pub category: Category,
    pub sub_category: String,
    #[serde(default)]
    pub framework: Option<String>,
    pub severity: Severity,
    /// 1-based line of the failure in the global error log when recorded.
    pub position: usize,
    pub error_timestamp: DateTime<Utc>,
    pub session_id: String,
    pub project: String,
    pub project_hash: String,
    /// Summaries of the first few edit/write operations.
    #[serde(default)]
    pub operations: Vec<String>,
    /// Operations observed beyond the tracked ones.
    #[serde(default)]
    pub omitted_operations: usize,
    #[serde(default)]
    pub files: BTreeSet<String>,
}

impl PendingCorrelation {
    /// Track one successful edit/write. The first `max_tracked` summaries are
    /// kept; later ones only bump the omitted count. Files are always kept.
    pub fn record_operation(&mut self, summary: String, file: Option<&str>, max_tracked: usize) {
        if self.operations.len() < max_tracked {
            self.operations.push(summary);
        } else {
            self.omitted_operations += 1;
        }
        if let Some(file) = file.filter(|file| !file.is_empty()) {
            self.files.insert(file.to_string());
        }
    }
}

/// Reads and writes the pending-correlation document for one working
/// directory.
#[derive(Debug, Clone)]
pub struct PendingStore {
    path: PathBuf,
}

impl PendingStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Option<PendingCorrelation> {
        read_json(&self.path)
    }

    pub fn save(&self, pending: &PendingCorrelation) -> Result<()> {
        write_json_atomic(&self.path, pending)
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("failed to clear pending state: {}", self.path.display())
            })?;
        }
        Ok(())
    }
}

/// Running total of global error appends, independent of rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendSequence {
    pub appended: u64,
}

/// Idempotency marker written once the seed knowledge set is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreloadMarker {
    pub loaded_at: DateTime<Utc>,
    pub count: usize,
    pub version: String,
}
