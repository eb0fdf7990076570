//! Maintenance commands over the persisted store: stats, purge, reset, preload.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use fixlog_core::{AppError, ErrorRecord, FixRecord, FixSource};
use fixlog_engine::{PatternReport, PreloadOutcome, load_report, preload};
use fixlog_store::StoreLayout;
use serde::Serialize;
use tracing::info;

use crate::workspace::store_layout;

const TOP_PATTERNS: usize = 5;

#[derive(Debug, Serialize)]
struct StatsReport {
    total_errors: usize,
    resolved_errors: usize,
    fix_rate: f64,
    observed_fixes: usize,
    seeded_fixes: usize,
    projects: usize,
    by_category: BTreeMap<String, usize>,
    by_severity: BTreeMap<String, usize>,
    top_patterns: Vec<TopPattern>,
}

#[derive(Debug, Serialize)]
struct TopPattern {
    signature: String,
    frequency: usize,
    fix_rate: f64,
}

impl StatsReport {
    fn build(errors: &[ErrorRecord], fixes: &[FixRecord], report: Option<&PatternReport>) -> Self {
        let resolved_errors = errors.iter().filter(|record| record.resolved).count();
        let seeded_fixes = fixes
            .iter()
            .filter(|fix| fix.source == FixSource::Seed)
            .count();

        let mut by_category = BTreeMap::new();
        let mut by_severity = BTreeMap::new();
        for record in errors {
            *by_category.entry(record.category.to_string()).or_insert(0) += 1;
            *by_severity.entry(record.severity.to_string()).or_insert(0) += 1;
        }
        let projects: BTreeSet<&str> = errors
            .iter()
            .map(|record| record.project_hash.as_str())
            .collect();

        let top_patterns = report
            .map(|report| {
                report
                    .patterns
                    .iter()
                    .take(TOP_PATTERNS)
                    .map(|pattern| TopPattern {
                        signature: pattern.signature.clone(),
                        frequency: pattern.frequency,
                        fix_rate: pattern.fix_rate,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            total_errors: errors.len(),
            resolved_errors,
            fix_rate: if errors.is_empty() {
                0.0
            } else {
                resolved_errors as f64 / errors.len() as f64
            },
            observed_fixes: fixes.len() - seeded_fixes,
            seeded_fixes,
            projects: projects.len(),
            by_category,
            by_severity,
            top_patterns,
        }
    }

    fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Errors: {} total, {} resolved ({:.0}%) across {} project(s)",
                self.total_errors,
                self.resolved_errors,
                self.fix_rate * 100.0,
                self.projects
            ),
            format!(
                "Fixes: {} observed, {} seeded",
                self.observed_fixes, self.seeded_fixes
            ),
        ];
        if !self.by_category.is_empty() {
            lines.push("By category:".to_string());
            for (category, count) in &self.by_category {
                lines.push(format!("  {category}: {count}"));
            }
        }
        if !self.by_severity.is_empty() {
            lines.push("By severity:".to_string());
            for (severity, count) in &self.by_severity {
                lines.push(format!("  {severity}: {count}"));
            }
        }
        if !self.top_patterns.is_empty() {
            lines.push("Top patterns:".to_string());
            for pattern in &self.top_patterns {
                lines.push(format!(
                    "  {}x ({:.0}% fixed) {}",
                    pattern.frequency,
                    pattern.fix_rate * 100.0,
                    pattern.signature
                ));
            }
        }
        lines
    }
}

pub fn handle_stats(json: bool) -> Result<()> {
    let layout = store_layout();
    let stats = stats(&layout)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("failed to serialize stats")?
        );
    } else {
        for line in stats.lines() {
            println!("{line}");
        }
    }
    Ok(())
}

fn stats(layout: &StoreLayout) -> Result<StatsReport> {
    let errors = layout.global_errors().load_all()?;
    let fixes = layout.fixes().load_all()?;
    let report = load_report(layout);
    Ok(StatsReport::build(&errors, &fixes, report.as_ref()))
}

#[derive(Debug, Default, PartialEq, Eq)]
struct PurgeSummary {
    global: usize,
    project: usize,
}

pub fn handle_purge(days: u32, dry_run: bool) -> Result<()> {
    let cutoff = Utc::now() - Duration::days(i64::from(days));
    let summary = purge(&store_layout(), cutoff, dry_run)?;

    if dry_run {
        println!(
            "Purge preview: {} global and {} project record(s) would be removed (resolved, older than {} days; cutoff {}).",
            summary.global,
            summary.project,
            days,
            cutoff.to_rfc3339()
        );
    } else {
        info!(
            global = summary.global,
            project = summary.project,
            "purged resolved records"
        );
        println!(
            "Purge complete: removed {} global and {} project record(s) (cutoff {}).",
            summary.global,
            summary.project,
            cutoff.to_rfc3339()
        );
    }
    Ok(())
}

fn is_purgeable(record: &ErrorRecord, cutoff: DateTime<Utc>) -> bool {
    record.resolved && record.timestamp < cutoff
}

fn purge(layout: &StoreLayout, cutoff: DateTime<Utc>, dry_run: bool) -> Result<PurgeSummary> {
    let mut logs = vec![(true, layout.global_errors())];
    for hash in layout.project_hashes()? {
        logs.push((false, layout.project_errors(&hash)));
    }

    let mut summary = PurgeSummary::default();
    for (is_global, log) in logs {
        let removed = if dry_run {
            log.load_all()?
                .iter()
                .filter(|record| is_purgeable(record, cutoff))
                .count()
        } else {
            log.retain(|record| !is_purgeable(record, cutoff))?
        };
        if is_global {
            summary.global += removed;
        } else {
            summary.project += removed;
        }
    }
    Ok(summary)
}

pub fn handle_reset(yes: bool) -> Result<()> {
    let layout = store_layout();
    if !yes {
        print!(
            "This deletes all fixlog history under {}. Type 'yes' to continue: ",
            layout.base_dir().display()
        );
        std::io::stdout().flush().ok();
    }
    let stdin = std::io::stdin();
    reset(&layout, yes, &mut stdin.lock())?;
    println!("fixlog state reset.");
    Ok(())
}

fn reset(layout: &StoreLayout, yes: bool, input: &mut impl BufRead) -> Result<()> {
    if !yes {
        let mut answer = String::new();
        input
            .read_line(&mut answer)
            .context("failed to read confirmation")?;
        if answer.trim() != "yes" {
            return Err(AppError::ResetNotConfirmed.into());
        }
    }
    layout.wipe()?;
    info!(dir = %layout.base_dir().display(), "store reset");
    Ok(())
}

pub fn handle_preload(force: bool) -> Result<()> {
    match preload(&store_layout(), force)? {
        PreloadOutcome::Loaded(count) => println!("Loaded {count} seed fix(es)."),
        PreloadOutcome::AlreadyLoaded(marker) => println!(
            "Seed fixes already loaded ({} on {}); pass --force to reload.",
            marker.count,
            marker.loaded_at.to_rfc3339()
        ),
    }
    Ok(())
}
