use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Category, FixSource, Severity};

/// One observed failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub project: String,
    pub project_hash: String,
    pub tool: String,
    /// Command text, or the file path for failed file operations.
    pub command: String,
    pub exit_code: i32,
    pub snippet: String,
    pub category: Category,
    #[serde(default)]
    pub sub_category: String,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub files: BTreeSet<String>,
    #[serde(default)]
    pub stack_locations: BTreeSet<String>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub fix: Option<String>,
    /// Command whose success resolved this record.
    #[serde(default)]
    pub fix_command: Option<String>,
}

impl ErrorRecord {
    /// Set the resolved flag together with its fix description; the two are
    /// never written separately.
    pub fn mark_resolved(&mut self, fix: impl Into<String>, fix_command: Option<String>) {
        self.resolved = true;
        self.fix = Some(fix.into());
        self.fix_command = fix_command;
    }

    pub fn pair_key(&self) -> (Category, &str) {
        (self.category, self.sub_category.as_str())
    }

    /// Resolved records older than `max_age` are hidden from digests;
    /// unresolved records never decay.
    pub fn is_decayed(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.resolved && now.signed_duration_since(self.timestamp) > max_age
    }

    pub fn category_label(&self) -> String {
        if self.sub_category.is_empty() {
            self.category.to_string()
        } else {
            format!("{}/{}", self.category, self.sub_category)
        }
    }
}

/// One observed remediation. Stored denormalized: it carries copies of the
/// originating failure's classification instead of a reference to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub project: String,
    pub project_hash: String,
    pub command: String,
    pub error_timestamp: DateTime<Utc>,
    pub category: Category,
    #[serde(default)]
    pub sub_category: String,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    pub error_snippet: String,
    pub fix: String,
    #[serde(default)]
    pub files: BTreeSet<String>,
    pub source: FixSource,
}

impl FixRecord {
    pub fn pair_key(&self) -> (Category, &str) {
        (self.category, self.sub_category.as_str())
    }

    pub fn is_decayed(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.source != FixSource::Seed && now.signed_duration_since(self.timestamp) > max_age
    }
}
