//! Read-only lookups surfaced when a new failure is recorded.

use std::collections::HashSet;
use std::fmt;

use fixlog_core::snippet::normalize_command;
use fixlog_core::{Category, ErrorRecord, FixRecord};

/// Fix text used when a failure was resolved without any observed edits.
pub const NO_OPERATIONS_FIX: &str = "no operations recorded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// A fix previously recorded for the same kind of failure.
    KnownFix { label: String, fix: String },
    /// The same command already failed this way and was fixed.
    Regression { command: String, fix: String },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::KnownFix { label, fix } => {
                write!(f, "[fixlog] Known fix for {label}: {fix}")
            }
            Advisory::Regression { command, fix } => write!(
                f,
                "[fixlog] Regression: `{command}` failed like this before and was fixed by: {fix}"
            ),
        }
    }
}

pub(crate) fn is_informative_fix(fix: &str) -> bool {
    let fix = fix.trim();
    !fix.is_empty() && fix != NO_OPERATIONS_FIX
}

/// Up to `limit` distinct fix descriptions for `(category, sub_category)`,
/// falling back to `category` alone when the pair has none. Fixes from the
/// same framework rank first, then newest first.
pub fn known_fixes(
    fixes: &[FixRecord],
    category: Category,
    sub_category: &str,
    framework: Option<&str>,
    limit: usize,
) -> Vec<String> {
    let usable = |fix: &&FixRecord| fix.category == category && is_informative_fix(&fix.fix);

    let mut candidates: Vec<&FixRecord> = fixes
        .iter()
        .filter(usable)
        .filter(|fix| fix.sub_category == sub_category)
        .collect();
    if candidates.is_empty() {
        candidates = fixes.iter().filter(usable).collect();
    }

    candidates.sort_by(|a, b| {
        let a_same = framework.is_some() && a.framework.as_deref() == framework;
        let b_same = framework.is_some() && b.framework.as_deref() == framework;
        b_same.cmp(&a_same).then(b.timestamp.cmp(&a.timestamp))
    });

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|fix| fix.fix.trim().to_string())
        .filter(|fix| seen.insert(fix.clone()))
        .take(limit)
        .collect()
}

/// Fix text of the newest resolved record with the same command and
/// classification as `record`.
pub fn regression_fix(errors: &[ErrorRecord], record: &ErrorRecord) -> Option<String> {
    let command = normalize_command(&record.command);
    errors
        .iter()
        .rev()
        .filter(|previous| previous.resolved && previous.pair_key() == record.pair_key())
        .filter(|previous| normalize_command(&previous.command) == command)
        .find_map(|previous| previous.fix.clone())
}

/// Instant-fix and regression advisories for a freshly recorded failure.
pub fn advisories_for(
    record: &ErrorRecord,
    errors: &[ErrorRecord],
    fixes: &[FixRecord],
    limit: usize,
) -> Vec<Advisory> {
    let mut advisories = Vec::new();

    if let Some(fix) = regression_fix(errors, record) {
        advisories.push(Advisory::Regression {
            command: normalize_command(&record.command),
            fix,
        });
    }

    let label = record.category_label();
    advisories.extend(
        known_fixes(
            fixes,
            record.category,
            &record.sub_category,
            record.framework.as_deref(),
            limit,
        )
        .into_iter()
        .map(|fix| Advisory::KnownFix {
            label: label.clone(),
            fix,
        }),
    );

    advisories
}
