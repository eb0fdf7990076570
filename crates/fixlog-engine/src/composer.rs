//! Session-start digest of past failures for one project.

use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use fixlog_config::{ContextConfig, ProjectScope};
use fixlog_core::snippet::bounded;
use fixlog_core::{Category, ErrorRecord, FixRecord};
use fixlog_store::StoreLayout;

use crate::advisory::{is_informative_fix, known_fixes};
use crate::analyzer::{PatternReport, load_report, percent, ratio};
use crate::rules::framework_advice;

pub const SECTION_START: &str = "<!-- FIXLOG:CONTEXT -->";
pub const SECTION_END: &str = "<!-- FIXLOG:CONTEXT:END -->";

const LINE_MAX_CHARS: usize = 200;
const SNIPPET_PREVIEW_CHARS: usize = 120;

/// Everything the composer reads, loaded once.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub global: Vec<ErrorRecord>,
    pub project: Vec<ErrorRecord>,
    pub fixes: Vec<FixRecord>,
    pub report: Option<PatternReport>,
}

impl StoreSnapshot {
    pub fn load(layout: &StoreLayout, scope: &ProjectScope) -> Result<Self> {
        Ok(Self {
            global: layout.global_errors().load_all()?,
            project: layout.project_errors(&scope.hash).load_all()?,
            fixes: layout.fixes().load_all()?,
            report: load_report(layout),
        })
    }

    /// Drop resolved records and observed fixes older than `max_age`.
    fn without_decayed(mut self, now: DateTime<Utc>, max_age: Duration) -> Self {
        self.global.retain(|record| !record.is_decayed(now, max_age));
        self.project.retain(|record| !record.is_decayed(now, max_age));
        self.fixes.retain(|fix| !fix.is_decayed(now, max_age));
        self
    }
}

/// Digest for `scope`, or `None` when there is nothing worth saying.
pub fn compose(
    layout: &StoreLayout,
    scope: &ProjectScope,
    config: &ContextConfig,
    now: DateTime<Utc>,
) -> Result<Option<String>> {
    if !config.enabled {
        return Ok(None);
    }
    let snapshot = StoreSnapshot::load(layout, scope)?;
    Ok(render(snapshot, scope, config, now))
}

pub fn render(
    snapshot: StoreSnapshot,
    scope: &ProjectScope,
    config: &ContextConfig,
    now: DateTime<Utc>,
) -> Option<String> {
    let snapshot = snapshot.without_decayed(now, Duration::days(config.decay_days));

    if snapshot.global.is_empty() && snapshot.project.is_empty() {
        return None;
    }

    let open: Vec<&ErrorRecord> = snapshot
        .project
        .iter()
        .filter(|record| !record.resolved)
        .collect();

    if snapshot.project.is_empty() {
        return Some(no_history_notice(&snapshot.global, scope));
    }
    if open.is_empty() {
        return Some(health_summary(&snapshot, scope, config));
    }
    Some(detailed_digest(&snapshot, open, scope, config))
}

fn line(text: String) -> String {
    bounded(&text, LINE_MAX_CHARS)
}

fn no_history_notice(global: &[ErrorRecord], scope: &ProjectScope) -> String {
    let mut text = format!("fixlog: no project-specific history for {}.", scope.name);
    let open_elsewhere = global.iter().filter(|record| !record.resolved).count();
    if open_elsewhere > 0 {
        text.push('\n');
        text.push_str(&format!(
            "fixlog: {open_elsewhere} unresolved issue(s) in other projects."
        ));
    }
    text.push('\n');
    text
}

fn rollup(records: &[ErrorRecord]) -> (usize, usize, usize) {
    let total = records.len();
    let fixed = records.iter().filter(|record| record.resolved).count();
    (total, fixed, total - fixed)
}

fn frameworks_by_frequency<'a>(records: impl IntoIterator<Item = &'a ErrorRecord>) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        if let Some(framework) = record.framework.as_deref() {
            *counts.entry(framework).or_default() += 1;
        }
    }
    let mut frameworks: Vec<(&str, usize)> = counts.into_iter().collect();
    frameworks.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    frameworks
        .into_iter()
        .map(|(framework, _)| framework.to_string())
        .collect()
}

fn health_summary(
    snapshot: &StoreSnapshot,
    scope: &ProjectScope,
    config: &ContextConfig,
) -> String {
    let (total, fixed, _) = rollup(&snapshot.project);
    let mut out = line(format!(
        "fixlog: {}: {total} past error(s), {} fixed, none open.",
        scope.name,
        percent(ratio(fixed, total))
    ));
    out.push('\n');

    for framework in frameworks_by_frequency(&snapshot.project)
        .into_iter()
        .take(config.max_framework_notes)
    {
        let advice = snapshot
            .report
            .as_ref()
            .and_then(|report| report.framework(&framework))
            .map(|insight| insight.advice.as_str())
            .or_else(|| framework_advice(&framework));
        if let Some(advice) = advice {
            out.push_str(&line(format!("fixlog: {framework}: {advice}")));
            out.push('\n');
        }
    }
    out
}

fn detailed_digest(
    snapshot: &StoreSnapshot,
    mut open: Vec<&ErrorRecord>,
    scope: &ProjectScope,
    config: &ContextConfig,
) -> String {
    open.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then(b.timestamp.cmp(&a.timestamp))
    });

    let mut out = String::new();
    out.push_str(SECTION_START);
    out.push('\n');
    out.push_str(&line(format!(
        "Open issues in {} from previous sessions:",
        scope.name
    )));
    out.push('\n');

    for record in open.iter().take(config.max_issues) {
        out.push_str(&line(issue_line(record)));
        out.push('\n');
        for fix in known_fixes(
            &snapshot.fixes,
            record.category,
            &record.sub_category,
            record.framework.as_deref(),
            config.fixes_per_issue,
        ) {
            out.push_str(&line(format!("    known fix: {fix}")));
            out.push('\n');
        }
    }

    let (total, fixed, open_count) = rollup(&snapshot.project);
    out.push_str(&format!(
        "{total} errors, {fixed} fixed ({}), {open_count} open\n",
        percent(ratio(fixed, total))
    ));

    let cross = cross_project_lines(snapshot, &open, scope, config.max_cross_project);
    if !cross.is_empty() {
        out.push_str("Fixed elsewhere:\n");
        for text in cross {
            out.push_str(&line(text));
            out.push('\n');
        }
    }

    let notes = framework_lines(snapshot, &open, config.max_framework_notes);
    if !notes.is_empty() {
        out.push_str("Framework notes:\n");
        for text in notes {
            out.push_str(&line(text));
            out.push('\n');
        }
    }

    out.push_str(SECTION_END);
    out.push('\n');
    out
}

fn issue_line(record: &ErrorRecord) -> String {
    let first_line = record.snippet.lines().next().unwrap_or_default().trim();
    format!(
        "- [{}] {} in `{}`: {}",
        record.severity,
        record.category_label(),
        record.command,
        bounded(first_line, SNIPPET_PREVIEW_CHARS)
    )
}

/// One resolved fix from another project per open `(category, sub_category)`.
fn cross_project_lines(
    snapshot: &StoreSnapshot,
    open: &[&ErrorRecord],
    scope: &ProjectScope,
    limit: usize,
) -> Vec<String> {
    let mut seen_pairs: HashSet<(Category, &str)> = HashSet::new();
    let mut seen_fixes: HashSet<&str> = HashSet::new();
    let mut lines = Vec::new();

    for record in open {
        if lines.len() >= limit {
            break;
        }
        if !seen_pairs.insert(record.pair_key()) {
            continue;
        }
        let found = snapshot.global.iter().rev().find_map(|other| {
            let fix = other.fix.as_deref()?;
            (other.resolved
                && other.project_hash != scope.hash
                && other.pair_key() == record.pair_key()
                && is_informative_fix(fix))
            .then_some((other, fix))
        });
        if let Some((other, fix)) = found
            && seen_fixes.insert(fix)
        {
            lines.push(format!(
                "- {}: {} (fixed in {})",
                record.category_label(),
                fix,
                other.project
            ));
        }
    }
    lines
}

fn framework_lines(snapshot: &StoreSnapshot, open: &[&ErrorRecord], limit: usize) -> Vec<String> {
    let Some(report) = snapshot.report.as_ref() else {
        return Vec::new();
    };
    frameworks_by_frequency(open.iter().copied())
        .into_iter()
        .filter_map(|framework| report.framework(&framework))
        .take(limit)
        .map(|insight| {
            format!(
                "- {}: {} ({} errors, {} fixed)",
                insight.framework,
                insight.advice,
                insight.count,
                percent(insight.fix_rate)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::Path;

    use fixlog_core::{FixSource, Severity};

    use crate::analyzer::FrameworkInsight;

    fn scope() -> ProjectScope {
        ProjectScope {
            root: Path::new("/work/app").to_path_buf(),
            name: "app".into(),
            hash: "hash-app".into(),
        }
    }

    fn record(
        project_hash: &str,
        category: Category,
        sub: &str,
        resolved: bool,
        age_days: i64,
    ) -> ErrorRecord {
        let mut record = ErrorRecord {
            timestamp: Utc::now() - Duration::days(age_days),
            session_id: "s".into(),
            project: project_hash.trim_start_matches("hash-").into(),
            project_hash: project_hash.into(),
            tool: "Bash".into(),
            command: "npm test".into(),
            exit_code: 1,
            snippet: format!("{sub} happened\nmore detail"),
            category,
            sub_category: sub.into(),
            framework: Some("react".into()),
            severity: category.severity(),
            files: BTreeSet::new(),
            stack_locations: BTreeSet::new(),
            resolved: false,
            fix: None,
            fix_command: None,
        };
        if resolved {
            record.mark_resolved(format!("fix for {sub} in {project_hash}"), None);
        }
        record
    }

    fn fix(sub: &str, text: &str, age_days: i64, source: FixSource) -> FixRecord {
        FixRecord {
            timestamp: Utc::now() - Duration::days(age_days),
            session_id: "s".into(),
            project: "other".into(),
            project_hash: "hash-other".into(),
            command: "npm test".into(),
            error_timestamp: Utc::now(),
            category: Category::Runtime,
            sub_category: sub.into(),
            framework: None,
            severity: Severity::High,
            error_snippet: "x".into(),
            fix: text.into(),
            files: BTreeSet::new(),
            source,
        }
    }

    fn snapshot(global: Vec<ErrorRecord>, fixes: Vec<FixRecord>) -> StoreSnapshot {
        let project = global
            .iter()
            .filter(|record| record.project_hash == "hash-app")
            .cloned()
            .collect();
        StoreSnapshot {
            global,
            project,
            fixes,
            report: None,
        }
    }

    fn render_default(snapshot: StoreSnapshot) -> Option<String> {
        render(snapshot, &scope(), &ContextConfig::default(), Utc::now())
    }

    #[test]
    fn test_empty_store_renders_nothing() {
        assert_eq!(render_default(StoreSnapshot::default()), None);
    }

    #[test]
    fn test_empty_store_on_disk_renders_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("missing"));
        let digest = compose(&layout, &scope(), &ContextConfig::default(), Utc::now()).unwrap();
        assert_eq!(digest, None);
        assert!(!dir.path().join("missing").exists());
    }

    #[test]
    fn test_disabled_renders_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().to_path_buf());
        let config = ContextConfig {
            enabled: false,
            ..ContextConfig::default()
        };
        assert_eq!(compose(&layout, &scope(), &config, Utc::now()).unwrap(), None);
    }

    #[test]
    fn test_no_project_history() {
        let resolved_elsewhere = record("hash-other", Category::Runtime, "x", true, 1);
        let digest = render_default(snapshot(vec![resolved_elsewhere.clone()], vec![])).unwrap();
        assert_eq!(digest, "fixlog: no project-specific history for app.\n");

        let open_elsewhere = record("hash-other", Category::Runtime, "y", false, 1);
        let digest =
            render_default(snapshot(vec![resolved_elsewhere, open_elsewhere], vec![])).unwrap();
        assert_eq!(digest.lines().count(), 2);
        assert!(digest.contains("1 unresolved issue(s) in other projects"));
    }

    #[test]
    fn test_health_summary_when_all_resolved() {
        let global = vec![
            record("hash-app", Category::Runtime, "null_reference", true, 1),
            record("hash-app", Category::Lint, "style_violation", true, 2),
        ];
        let digest = render_default(snapshot(global, vec![])).unwrap();
        let lines: Vec<&str> = digest.lines().collect();
        assert_eq!(lines[0], "fixlog: app: 2 past error(s), 100% fixed, none open.");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("fixlog: react: "));
        assert!(!digest.contains(SECTION_START));
    }

    #[test]
    fn test_detailed_digest_ranks_by_severity_and_caps() {
        let mut global = Vec::new();
        for idx in 0..10 {
            global.push(record("hash-app", Category::Lint, &format!("lint_{idx}"), false, 0));
        }
        global.push(record("hash-app", Category::Build, "build_failure", false, 5));
        global.push(record("hash-app", Category::Runtime, "null_reference", false, 3));
        global.push(record("hash-other", Category::Runtime, "null_reference", true, 1));

        let fixes = vec![
            fix("null_reference", "guard it", 1, FixSource::AutoCorrelation),
            fix("null_reference", "seeded advice", 400, FixSource::Seed),
            fix("null_reference", "ancient fix", 400, FixSource::AutoCorrelation),
        ];

        let digest = render_default(snapshot(global, fixes)).unwrap();
        let lines: Vec<&str> = digest.lines().collect();
        assert_eq!(lines[0], SECTION_START);
        assert_eq!(*lines.last().unwrap(), SECTION_END);

        let issues: Vec<&&str> = lines.iter().filter(|line| line.starts_with("- [")).collect();
        assert_eq!(issues.len(), 7);
        assert!(issues[0].starts_with("- [critical] build/build_failure in `npm test`"));
        assert!(issues[1].starts_with("- [high] runtime/null_reference"));
        assert!(issues[1].ends_with("null_reference happened"));

        assert!(digest.contains("    known fix: guard it"));
        assert!(digest.contains("    known fix: seeded advice"));
        assert!(!digest.contains("ancient fix"));
        assert!(digest.contains("12 errors, 0 fixed (0%), 12 open"));
        assert!(digest.contains("Fixed elsewhere:"));
        assert!(digest.contains(
            "- runtime/null_reference: fix for null_reference in hash-other (fixed in other)"
        ));
    }

    #[test]
    fn test_decay_hides_old_resolved_but_not_open() {
        let global = vec![
            record("hash-app", Category::Runtime, "old_open", false, 365),
            record("hash-app", Category::Runtime, "old_fixed", true, 45),
            record("hash-app", Category::Runtime, "new_fixed", true, 2),
        ];
        let digest = render_default(snapshot(global, vec![])).unwrap();
        assert!(digest.contains("old_open"));
        assert!(digest.contains("2 errors, 1 fixed (50%), 1 open"));
    }

    #[test]
    fn test_all_decayed_renders_nothing() {
        let global = vec![record("hash-app", Category::Runtime, "old_fixed", true, 45)];
        assert_eq!(render_default(snapshot(global, vec![])), None);
    }

    #[test]
    fn test_framework_notes_from_report() {
        let global = vec![record("hash-app", Category::Runtime, "null_reference", false, 0)];
        let mut snap = snapshot(global, vec![]);
        snap.report = Some(PatternReport {
            generated_at: Utc::now(),
            total_errors: 4,
            resolved_errors: 1,
            patterns: Vec::new(),
            insights: Default::default(),
            frameworks: vec![FrameworkInsight {
                framework: "react".into(),
                count: 4,
                fix_rate: 0.25,
                advice: "Guard optional props.".into(),
            }],
            cross_project: None,
        });
        let digest = render_default(snap).unwrap();
        assert!(
            digest.contains("Framework notes:\n- react: Guard optional props. (4 errors, 25% fixed)")
        );
    }

    #[test]
    fn test_output_lines_are_bounded() {
        let mut long = record("hash-app", Category::Runtime, "null_reference", false, 0);
        long.command = "x".repeat(1000);
        let digest = render_default(snapshot(vec![long], vec![])).unwrap();
        assert!(digest.lines().all(|line| line.chars().count() <= LINE_MAX_CHARS));
    }
}
