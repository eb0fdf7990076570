//! Pattern analysis over the global error log.
//!
//! Snippets are grouped by [`normalize_signature`]; recurring groups become
//! [`Pattern`]s. The report is derived data: it is rebuilt from scratch on
//! every run and replaces `patterns.json` wholesale.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::Result;
use chrono::{DateTime, Utc};
use fixlog_config::AnalysisConfig;
use fixlog_core::snippet::normalize_signature;
use fixlog_core::{Category, ErrorRecord, FixRecord, Severity};
use fixlog_store::{StoreLayout, read_json, write_json_atomic};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::advisory::is_informative_fix;
use crate::rules::{SUB_CATEGORY_ADVISORIES, framework_advice};

const MIN_PATTERN_FREQUENCY: usize = 2;
const MAX_ALTERNATIVE_FIXES: usize = 5;
const MIN_FRAMEWORK_OCCURRENCES: usize = 2;
const MIN_SHARED_CATEGORY_COUNT: usize = 3;
const MIN_PROJECT_RECORDS: usize = 3;
const HIGH_FIX_RATE: f64 = 0.7;
const LOW_FIX_RATE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub generated_at: DateTime<Utc>,
    pub total_errors: usize,
    pub resolved_errors: usize,
    pub patterns: Vec<Pattern>,
    pub insights: GlobalInsights,
    #[serde(default)]
    pub frameworks: Vec<FrameworkInsight>,
    #[serde(default)]
    pub cross_project: Option<CrossProjectInsights>,
}

/// A recurring failure signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub signature: String,
    pub category: Category,
    #[serde(default)]
    pub sub_category: String,
    pub frequency: usize,
    pub fix_rate: f64,
    pub projects: BTreeSet<String>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub framework: Option<String>,
    pub severity: Severity,
    /// Fix of the oldest resolved occurrence.
    #[serde(default)]
    pub primary_fix: Option<String>,
    #[serde(default)]
    pub alternative_fixes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalInsights {
    pub dominant_category: Option<Category>,
    pub dominant_category_count: usize,
    pub fix_rate: f64,
    pub fix_rate_comment: String,
    /// Share of critical and high severity records.
    pub urgent_share: f64,
    #[serde(default)]
    pub advisories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkInsight {
    pub framework: String,
    pub count: usize,
    pub fix_rate: f64,
    pub advice: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossProjectInsights {
    pub project_count: usize,
    #[serde(default)]
    pub shared_category: Option<SharedCategory>,
    #[serde(default)]
    pub healthiest: Option<ProjectHealth>,
    #[serde(default)]
    pub least_healthy: Option<ProjectHealth>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedCategory {
    pub category: Category,
    pub count: usize,
    pub projects: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectHealth {
    pub project: String,
    pub project_hash: String,
    pub total: usize,
    pub fix_rate: f64,
}

impl PatternReport {
    pub fn framework(&self, name: &str) -> Option<&FrameworkInsight> {
        self.frameworks.iter().find(|insight| insight.framework == name)
    }

    /// Human-readable summary for the `analyze` command.
    pub fn summary_lines(&self, max_patterns: usize) -> Vec<String> {
        let mut lines = vec![format!(
            "{} errors, {} resolved ({}), {} recurring patterns",
            self.total_errors,
            self.resolved_errors,
            percent(self.insights.fix_rate),
            self.patterns.len()
        )];
        if let Some(category) = self.insights.dominant_category {
            lines.push(format!(
                "Most common category: {category} ({}); {}",
                self.insights.dominant_category_count, self.insights.fix_rate_comment
            ));
        }
        for pattern in self.patterns.iter().take(max_patterns) {
            lines.push(format!(
                "  {}x [{}] {}",
                pattern.frequency,
                pattern.severity,
                pattern.signature
            ));
        }
        for advisory in &self.insights.advisories {
            lines.push(format!("! {advisory}"));
        }
        for insight in &self.frameworks {
            lines.push(format!(
                "{}: {} errors, {} fixed. {}",
                insight.framework,
                insight.count,
                percent(insight.fix_rate),
                insight.advice
            ));
        }
        if let Some(cross) = &self.cross_project {
            if let Some(shared) = &cross.shared_category {
                lines.push(format!(
                    "Shared across {} projects: {} ({} errors)",
                    shared.projects, shared.category, shared.count
                ));
            }
            if let (Some(best), Some(worst)) = (&cross.healthiest, &cross.least_healthy) {
                lines.push(format!(
                    "Healthiest: {} ({} fixed); least healthy: {} ({} fixed)",
                    best.project,
                    percent(best.fix_rate),
                    worst.project,
                    percent(worst.fix_rate)
                ));
            }
        }
        lines
    }
}

pub(crate) fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

pub(crate) fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn fix_rate_of<'a>(records: impl IntoIterator<Item = &'a ErrorRecord>) -> (usize, f64) {
    let (total, resolved) = records
        .into_iter()
        .fold((0, 0), |(total, resolved), record| {
            (total + 1, resolved + usize::from(record.resolved))
        });
    (total, ratio(resolved, total))
}

/// Most frequent key; ties go to the smallest key so output is stable.
fn dominant<K: Ord>(items: impl IntoIterator<Item = K>) -> Option<(K, usize)> {
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(item).or_insert(0usize) += 1;
    }
    counts
        .into_iter()
        .fold(None, |best, (key, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((key, count)),
        })
}

/// Build a report from raw records. Records are never modified.
pub fn analyze(
    errors: &[ErrorRecord],
    fixes: &[FixRecord],
    max_patterns: usize,
    now: DateTime<Utc>,
) -> PatternReport {
    let (total, fix_rate) = fix_rate_of(errors);
    let resolved = errors.iter().filter(|record| record.resolved).count();

    PatternReport {
        generated_at: now,
        total_errors: total,
        resolved_errors: resolved,
        patterns: find_patterns(errors, fixes, max_patterns),
        insights: global_insights(errors, fix_rate),
        frameworks: framework_insights(errors),
        cross_project: cross_project_insights(errors),
    }
}

fn find_patterns(errors: &[ErrorRecord], fixes: &[FixRecord], max_patterns: usize) -> Vec<Pattern> {
    let mut groups: BTreeMap<String, Vec<&ErrorRecord>> = BTreeMap::new();
    for record in errors {
        let signature = normalize_signature(&record.snippet);
        if !signature.is_empty() {
            groups.entry(signature).or_default().push(record);
        }
    }

    let mut fixes_by_signature: BTreeMap<String, Vec<&FixRecord>> = BTreeMap::new();
    for fix in fixes {
        fixes_by_signature
            .entry(normalize_signature(&fix.error_snippet))
            .or_default()
            .push(fix);
    }

    let mut patterns: Vec<Pattern> = groups
        .into_iter()
        .filter(|(_, records)| records.len() >= MIN_PATTERN_FREQUENCY)
        .filter_map(|(signature, records)| {
            let group_fixes = fixes_by_signature
                .get(&signature)
                .map(Vec::as_slice)
                .unwrap_or_default();
            build_pattern(signature, &records, group_fixes)
        })
        .collect();

    patterns.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then(b.last_seen.cmp(&a.last_seen))
            .then(a.signature.cmp(&b.signature))
    });
    patterns.truncate(max_patterns);
    patterns
}

fn build_pattern(
    signature: String,
    records: &[&ErrorRecord],
    fixes: &[&FixRecord],
) -> Option<Pattern> {
    let ((category, sub_category), _) =
        dominant(records.iter().map(|record| record.pair_key()))?;
    let (_, fix_rate) = fix_rate_of(records.iter().copied());
    let last_seen = records.iter().map(|record| record.timestamp).max()?;

    let primary_fix = records
        .iter()
        .filter(|record| record.resolved)
        .min_by_key(|record| record.timestamp)
        .and_then(|record| record.fix.clone());

    let mut seen: HashSet<&str> = primary_fix.iter().map(String::as_str).collect();
    let alternative_fixes = fixes
        .iter()
        .map(|fix| fix.fix.trim())
        .filter(|fix| is_informative_fix(fix) && seen.insert(*fix))
        .take(MAX_ALTERNATIVE_FIXES)
        .map(str::to_string)
        .collect();

    Some(Pattern {
        category,
        sub_category: sub_category.to_string(),
        frequency: records.len(),
        fix_rate,
        projects: records.iter().map(|record| record.project.clone()).collect(),
        last_seen,
        framework: dominant(records.iter().filter_map(|record| record.framework.clone()))
            .map(|(framework, _)| framework),
        severity: dominant(records.iter().map(|record| record.severity))
            .map(|(severity, _)| severity)
            .unwrap_or_default(),
        primary_fix,
        alternative_fixes,
        signature,
    })
}

fn global_insights(errors: &[ErrorRecord], fix_rate: f64) -> GlobalInsights {
    if errors.is_empty() {
        return GlobalInsights::default();
    }

    let dominant_category = dominant(errors.iter().map(|record| record.category));
    let fix_rate_comment = if fix_rate >= HIGH_FIX_RATE {
        "high fix rate: most failures get resolved"
    } else if fix_rate <= LOW_FIX_RATE {
        "low fix rate: most failures stay unresolved"
    } else {
        "moderate fix rate"
    };
    let urgent = errors
        .iter()
        .filter(|record| record.severity.is_urgent())
        .count();

    let mut sub_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in errors {
        *sub_counts.entry(record.sub_category.as_str()).or_default() += 1;
    }
    let advisories = SUB_CATEGORY_ADVISORIES
        .iter()
        .filter_map(|(sub_category, threshold, advice)| {
            let count = sub_counts.get(sub_category).copied().unwrap_or_default();
            (count >= *threshold).then(|| format!("{advice} ({count} occurrences)"))
        })
        .collect();

    GlobalInsights {
        dominant_category: dominant_category.map(|(category, _)| category),
        dominant_category_count: dominant_category.map(|(_, count)| count).unwrap_or_default(),
        fix_rate,
        fix_rate_comment: fix_rate_comment.to_string(),
        urgent_share: ratio(urgent, errors.len()),
        advisories,
    }
}

fn framework_insights(errors: &[ErrorRecord]) -> Vec<FrameworkInsight> {
    let mut by_framework: BTreeMap<&str, Vec<&ErrorRecord>> = BTreeMap::new();
    for record in errors {
        if let Some(framework) = record.framework.as_deref() {
            by_framework.entry(framework).or_default().push(record);
        }
    }

    let mut insights: Vec<FrameworkInsight> = by_framework
        .into_iter()
        .filter(|(_, records)| records.len() >= MIN_FRAMEWORK_OCCURRENCES)
        .map(|(framework, records)| {
            let (count, fix_rate) = fix_rate_of(records.iter().copied());
            FrameworkInsight {
                framework: framework.to_string(),
                count,
                fix_rate,
                advice: framework_advice(framework).map(str::to_string).unwrap_or_else(|| {
                    format!("Recurring {framework} failures: check its setup and docs.")
                }),
            }
        })
        .collect();
    insights.sort_by(|a, b| b.count.cmp(&a.count).then(a.framework.cmp(&b.framework)));
    insights
}

fn cross_project_insights(errors: &[ErrorRecord]) -> Option<CrossProjectInsights> {
    let mut by_project: BTreeMap<&str, Vec<&ErrorRecord>> = BTreeMap::new();
    for record in errors {
        by_project
            .entry(record.project_hash.as_str())
            .or_default()
            .push(record);
    }
    if by_project.len() < 2 {
        return None;
    }

    let mut category_projects: BTreeMap<Category, (BTreeSet<&str>, usize)> = BTreeMap::new();
    for record in errors {
        let entry = category_projects.entry(record.category).or_default();
        entry.0.insert(record.project_hash.as_str());
        entry.1 += 1;
    }
    let shared_category = category_projects
        .into_iter()
        .filter(|(_, (projects, count))| projects.len() >= 2 && *count >= MIN_SHARED_CATEGORY_COUNT)
        .max_by(|(a_cat, (_, a)), (b_cat, (_, b))| a.cmp(b).then(b_cat.cmp(a_cat)))
        .map(|(category, (projects, count))| SharedCategory {
            category,
            count,
            projects: projects.len(),
        });

    let mut health: Vec<ProjectHealth> = by_project
        .iter()
        .filter(|(_, records)| records.len() >= MIN_PROJECT_RECORDS)
        .map(|(hash, records)| {
            let (total, fix_rate) = fix_rate_of(records.iter().copied());
            ProjectHealth {
                project: records[0].project.clone(),
                project_hash: hash.to_string(),
                total,
                fix_rate,
            }
        })
        .collect();
    health.sort_by(|a, b| {
        b.fix_rate
            .total_cmp(&a.fix_rate)
            .then(a.project_hash.cmp(&b.project_hash))
    });
    let (healthiest, least_healthy) = if health.len() >= 2 {
        (health.first().cloned(), health.last().cloned())
    } else {
        (None, None)
    };

    Some(CrossProjectInsights {
        project_count: by_project.len(),
        shared_category,
        healthiest,
        least_healthy,
    })
}

/// Analyze the whole store and replace the pattern artifact.
pub fn run_analysis(layout: &StoreLayout, config: &AnalysisConfig) -> Result<PatternReport> {
    let errors = layout.global_errors().load_all()?;
    let fixes = layout.fixes().load_all()?;
    let report = analyze(&errors, &fixes, config.max_patterns, Utc::now());
    write_json_atomic(&layout.patterns_path(), &report)?;
    info!(
        errors = report.total_errors,
        patterns = report.patterns.len(),
        "pattern analysis written"
    );
    Ok(report)
}

/// The last written report, if any.
pub fn load_report(layout: &StoreLayout) -> Option<PatternReport> {
    read_json(&layout.patterns_path())
}
