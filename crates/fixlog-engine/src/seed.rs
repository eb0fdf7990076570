//! Built-in fix knowledge loaded into the fix log once, so instant-fix
//! lookups have something to offer before any fixes have been observed.

use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use fixlog_core::{Category, FixRecord, FixSource};
use fixlog_store::{PreloadMarker, StoreLayout};
use tracing::info;

/// Bump when the seed table changes so `preload --force` is the only way to
/// pick up new entries on existing installs.
pub const SEED_VERSION: &str = "1";

const SEED_SESSION: &str = "seed";

/// `(category, sub_category, framework, error snippet, fix)`.
const SEED_FIXES: &[(Category, &str, Option<&str>, &str, &str)] = &[
    (
        Category::Runtime,
        "null_reference",
        None,
        "TypeError: Cannot read properties of undefined",
        "Guard the value before use (optional chaining `a?.b`, a default, or an early return) and trace why it is undefined.",
    ),
    (
        Category::Module,
        "module_not_found",
        Some("node"),
        "Error: Cannot find module",
        "Install the missing package (npm install <pkg>) or fix the import path and its casing.",
    ),
    (
        Category::Dependency,
        "peer_dependency",
        Some("node"),
        "npm ERR! code ERESOLVE",
        "Align the conflicting peer versions; use --legacy-peer-deps only as a temporary workaround.",
    ),
    (
        Category::Type,
        "type_mismatch",
        Some("typescript"),
        "Type 'X' is not assignable to type 'Y'",
        "Fix the type at its source (function signature or API response type) instead of casting at the call site.",
    ),
    (
        Category::Network,
        "port_in_use",
        None,
        "EADDRINUSE: address already in use",
        "Stop the process holding the port (lsof -i :<port>) or start the server on another port.",
    ),
    (
        Category::Permission,
        "access_denied",
        None,
        "EACCES: permission denied",
        "Fix ownership of the path (chown) instead of running with sudo; check the file mode.",
    ),
    (
        Category::Memory,
        "out_of_memory",
        Some("node"),
        "JavaScript heap out of memory",
        "Raise the heap limit (NODE_OPTIONS=--max-old-space-size=4096) or split the workload.",
    ),
    (
        Category::Git,
        "merge_conflict",
        None,
        "CONFLICT (content): Merge conflict",
        "Resolve the conflict markers in each listed file, git add them, then continue the merge or rebase.",
    ),
    (
        Category::Network,
        "connection_refused",
        None,
        "ECONNREFUSED",
        "Start the target service first and confirm host and port match the configuration.",
    ),
    (
        Category::Test,
        "assertion_failure",
        None,
        "AssertionError: expected",
        "Run only the failing test, compare expected and actual, and fix the code rather than the assertion.",
    ),
    (
        Category::Syntax,
        "unexpected_token",
        None,
        "SyntaxError: Unexpected token",
        "Check the line before the reported position for an unclosed bracket, quote or missing comma.",
    ),
    (
        Category::Database,
        "missing_table",
        None,
        "relation does not exist",
        "Run pending migrations against the database the app is connected to.",
    ),
];

pub fn seed_fixes(now: DateTime<Utc>) -> Vec<FixRecord> {
    SEED_FIXES
        .iter()
        .map(|(category, sub_category, framework, snippet, fix)| FixRecord {
            timestamp: now,
            session_id: SEED_SESSION.to_string(),
            project: String::new(),
            project_hash: String::new(),
            command: String::new(),
            error_timestamp: now,
            category: *category,
            sub_category: sub_category.to_string(),
            framework: framework.map(str::to_string),
            severity: category.severity(),
            error_snippet: snippet.to_string(),
            fix: fix.to_string(),
            files: BTreeSet::new(),
            source: FixSource::Seed,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreloadOutcome {
    Loaded(usize),
    AlreadyLoaded(PreloadMarker),
}

/// Append the seed set to the fix log and write the preload marker. A
/// second call is a no-op unless `force`, which replaces earlier seeds.
pub fn preload(layout: &StoreLayout, force: bool) -> Result<PreloadOutcome> {
    if !force && let Some(marker) = layout.preload_marker() {
        return Ok(PreloadOutcome::AlreadyLoaded(marker));
    }

    let fixes = layout.fixes();
    if force {
        fixes.retain(|fix| fix.source != FixSource::Seed)?;
    }

    let now = Utc::now();
    let seeds = seed_fixes(now);
    for seed in &seeds {
        fixes.append(seed)?;
    }

    layout.write_preload_marker(&PreloadMarker {
        loaded_at: now,
        count: seeds.len(),
        version: SEED_VERSION.to_string(),
    })?;
    info!(count = seeds.len(), "loaded seed fixes");
    Ok(PreloadOutcome::Loaded(seeds.len()))
}

pub fn ensure_preloaded(layout: &StoreLayout) -> Result<()> {
    preload(layout, false).map(|_| ())
}
