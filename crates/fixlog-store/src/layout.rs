use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fixlog_core::{ErrorRecord, FixRecord};

use crate::artifact::{read_json, write_json_atomic};
use crate::log::RecordLog;
use crate::pending::{AppendSequence, PendingStore, PreloadMarker};

const ERRORS_FILE_NAME: &str = "errors.jsonl";
const FIXES_FILE_NAME: &str = "fixes.jsonl";
const PROJECTS_DIR: &str = "projects";
const PENDING_DIR: &str = "pending";
const PATTERNS_FILE_NAME: &str = "patterns.json";
const PRELOAD_FILE_NAME: &str = "preload.json";
const SEQUENCE_FILE_NAME: &str = "sequence.json";

/// Where every persisted file lives under one state directory.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    base_dir: PathBuf,
}

impl StoreLayout {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn global_errors(&self) -> RecordLog<ErrorRecord> {
        RecordLog::new(self.base_dir.join(ERRORS_FILE_NAME))
    }

    pub fn fixes(&self) -> RecordLog<FixRecord> {
        RecordLog::new(self.base_dir.join(FIXES_FILE_NAME))
    }

    pub fn project_errors(&self, project_hash: &str) -> RecordLog<ErrorRecord> {
        RecordLog::new(
            self.base_dir
                .join(PROJECTS_DIR)
                .join(project_hash)
                .join(ERRORS_FILE_NAME),
        )
    }

    /// Hashes of every project that has a per-project log on disk.
    pub fn project_hashes(&self) -> Result<Vec<String>> {
        let dir = self.base_dir.join(PROJECTS_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to list projects: {}", dir.display()))?
        {
            let entry = entry?;
            if entry.path().join(ERRORS_FILE_NAME).is_file() {
                hashes.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    pub fn patterns_path(&self) -> PathBuf {
        self.base_dir.join(PATTERNS_FILE_NAME)
    }

    /// Pending-correlation document for one working-directory key.
    pub fn pending(&self, key: &str) -> PendingStore {
        PendingStore::new(self.base_dir.join(PENDING_DIR).join(format!("{key}.json")))
    }

    pub fn preload_marker(&self) -> Option<PreloadMarker> {
        read_json(&self.base_dir.join(PRELOAD_FILE_NAME))
    }

    pub fn write_preload_marker(&self, marker: &PreloadMarker) -> Result<()> {
        write_json_atomic(&self.base_dir.join(PRELOAD_FILE_NAME), marker)
    }

    /// Count one more global error append and return the new total. Unlike
    /// the log's line count this keeps growing after rotation caps the log.
    /// A missing counter starts from `initial`.
    pub fn next_append_sequence(&self, initial: impl FnOnce() -> Result<usize>) -> Result<u64> {
        let path = self.base_dir.join(SEQUENCE_FILE_NAME);
        let appended = match read_json::<AppendSequence>(&path) {
            Some(sequence) => sequence.appended + 1,
            None => initial()? as u64,
        };
        write_json_atomic(&path, &AppendSequence { appended })?;
        Ok(appended)
    }

    /// Delete every persisted file, keeping the directory and its logs.
    pub fn wipe(&self) -> Result<()> {
        if self.base_dir.exists() {
            for entry in fs::read_dir(&self.base_dir)
                .with_context(|| format!("failed to list {}", self.base_dir.display()))?
            {
                let path = entry?.path();
                // Log files stay: the running process may hold them open.
                if path.file_name().is_some_and(|name| name == "logs") {
                    continue;
                }
                if path.is_dir() {
                    fs::remove_dir_all(&path)
                        .with_context(|| format!("failed to remove {}", path.display()))?;
                } else {
                    fs::remove_file(&path)
                        .with_context(|| format!("failed to remove {}", path.display()))?;
                }
            }
        }
        Ok(())
    }
}
