use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use fixlog_config::ProjectScope;
use fixlog_engine::compose;
use serde_json::Value;
use tracing::warn;

use crate::workspace::{load_config_for, resolve_cwd, store_layout};

/// Print the digest for the current project. Prints nothing on an empty
/// store, and nothing (with a logged warning) on any failure.
pub fn handle_context(cd: Option<String>, from_hook: bool) -> Result<()> {
    match render_context(cd.as_deref(), from_hook) {
        Ok(Some(digest)) => print!("{digest}"),
        Ok(None) => {}
        Err(err) => warn!(error = %format!("{err:#}"), "context digest skipped"),
    }
    Ok(())
}

fn render_context(cd: Option<&str>, from_hook: bool) -> Result<Option<String>> {
    let hook_cwd = if from_hook { hook_cwd()? } else { None };
    let cwd = match hook_cwd {
        Some(cwd) => cwd,
        None => resolve_cwd(cd)?,
    };

    let scope = ProjectScope::discover(&cwd);
    let config = load_config_for(&cwd);
    compose(&store_layout(), &scope, &config.context, Utc::now())
}

fn hook_cwd() -> Result<Option<PathBuf>> {
    let mut payload = String::new();
    std::io::stdin()
        .read_to_string(&mut payload)
        .context("failed to read hook payload")?;
    Ok(cwd_from_payload(&payload))
}

fn cwd_from_payload(payload: &str) -> Option<PathBuf> {
    let value: Value = serde_json::from_str(payload).ok()?;
    value
        .get("cwd")
        .and_then(Value::as_str)
        .filter(|cwd| !cwd.is_empty())
        .map(PathBuf::from)
}
