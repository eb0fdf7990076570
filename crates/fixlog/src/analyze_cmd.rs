use anyhow::{Context, Result};
use fixlog_engine::run_analysis;

use crate::workspace::{load_config_for, resolve_cwd, store_layout};

const SUMMARY_PATTERNS: usize = 10;

pub fn handle_analyze(quiet: bool, json: bool) -> Result<()> {
    let config = load_config_for(&resolve_cwd(None)?);
    let report = run_analysis(&store_layout(), &config.analysis)?;

    if quiet {
        return Ok(());
    }
    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("failed to serialize pattern report")?;
        println!("{rendered}");
    } else {
        for line in report.summary_lines(SUMMARY_PATTERNS) {
            println!("{line}");
        }
    }
    Ok(())
}
