use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixlogConfig {
    pub store: StoreConfig,
    pub capture: CaptureConfig,
    pub analysis: AnalysisConfig,
    pub context: ContextConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Record ceiling for the global error log before rotation kicks in.
    pub global_max_records: usize,
    /// Record ceiling for each per-project error log.
    pub project_max_records: usize,
    /// How many of the newest global records are checked for duplicates.
    pub dedup_window: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            global_max_records: 500,
            project_max_records: 200,
            dedup_window: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub enabled: bool,
    pub snippet_max_chars: usize,
    /// Edit/write summaries kept verbatim in a pending correlation; the rest
    /// are only counted.
    pub max_tracked_operations: usize,
    /// Known fixes surfaced when a new failure is recorded.
    pub instant_fix_limit: usize,
    /// Load the seed knowledge set on first capture.
    pub auto_preload: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snippet_max_chars: 500,
            max_tracked_operations: 5,
            instant_fix_limit: 3,
            auto_preload: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fire a background analysis whenever the global record count is a
    /// multiple of `trigger_interval`.
    pub auto_trigger: bool,
    pub trigger_interval: usize,
    pub max_patterns: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            auto_trigger: true,
            trigger_interval: 20,
            max_patterns: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub enabled: bool,
    pub max_issues: usize,
    pub fixes_per_issue: usize,
    /// Resolved records older than this many days are left out of digests.
    pub decay_days: i64,
    pub max_cross_project: usize,
    pub max_framework_notes: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_issues: 7,
            fixes_per_issue: 2,
            decay_days: 30,
            max_cross_project: 5,
            max_framework_notes: 3,
        }
    }
}

/// User-supplied classification rules, evaluated before the built-in tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub rules: Vec<RuleConfig>,
    pub frameworks: Vec<FrameworkRuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Case-insensitive regex matched against the output snippet.
    pub pattern: String,
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkRuleConfig {
    /// Case-insensitive regex matched against snippet + command.
    pub pattern: String,
    pub name: String,
}

impl FixlogConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Load a TOML file as a raw value; missing or broken files yield `None`.
fn load_raw(path: &Path) -> Option<toml::Value> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str::<toml::Value>(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to parse fixlog config at {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read fixlog config at {}: {}", path.display(), e);
            None
        }
    }
}

/// Deep merge two TOML values. Overlay wins for non-table values, so a
/// project `[[classifier.rules]]` array replaces the global one.
fn merge_toml_values(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_map), toml::Value::Table(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged_val = match base_map.remove(&key) {
                    Some(base_val) => merge_toml_values(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged_val);
            }
            toml::Value::Table(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Load configuration with 3-tier priority:
/// 1. project config (`<project>/.fixlog/config.toml`), highest
/// 2. global config (`<config_dir>/fixlog/config.toml`)
/// 3. built-in defaults, lowest
///
/// Never fails: unreadable layers are skipped with a warning.
pub fn load_config(global_path: Option<&Path>, project_path: Option<&Path>) -> FixlogConfig {
    let layers = [global_path, project_path]
        .into_iter()
        .flatten()
        .filter_map(load_raw);

    let mut merged: Option<toml::Value> = None;
    for layer in layers {
        merged = Some(match merged {
            Some(base) => merge_toml_values(base, layer),
            None => layer,
        });
    }

    let Some(merged) = merged else {
        return FixlogConfig::default();
    };

    match merged.try_into::<FixlogConfig>() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Invalid fixlog config, using defaults: {e}");
            FixlogConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = load_config(None, None);
        assert!(config.is_default());
        assert_eq!(config.store.global_max_records, 500);
        assert_eq!(config.store.project_max_records, 200);
        assert_eq!(config.store.dedup_window, 5);
        assert_eq!(config.analysis.trigger_interval, 20);
        assert_eq!(config.context.max_issues, 7);
        assert_eq!(config.context.decay_days, 30);
        assert!(config.capture.auto_preload);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let global = write_toml("[store]\nglobal_max_records = 50\n");
        let config = load_config(Some(global.path()), None);
        assert_eq!(config.store.global_max_records, 50);
        assert_eq!(config.store.project_max_records, 200);
        assert_eq!(config.context.max_issues, 7);
    }

    #[test]
    fn test_project_overrides_global() {
        let global = write_toml("[store]\nglobal_max_records = 50\ndedup_window = 9\n");
        let project = write_toml("[store]\nglobal_max_records = 80\n");
        let config = load_config(Some(global.path()), Some(project.path()));
        assert_eq!(config.store.global_max_records, 80);
        assert_eq!(config.store.dedup_window, 9);
    }

    #[test]
    fn test_classifier_rules_parse() {
        let global = write_toml(
            r#"
[[classifier.rules]]
pattern = "widget exploded"
category = "runtime"
sub_category = "widget"

[[classifier.frameworks]]
pattern = "acme-cli"
name = "acme"
"#,
        );
        let config = load_config(Some(global.path()), None);
        assert_eq!(config.classifier.rules.len(), 1);
        assert_eq!(config.classifier.rules[0].sub_category, "widget");
        assert_eq!(config.classifier.frameworks[0].name, "acme");
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let global = write_toml("[store\nthis is not toml");
        let config = load_config(Some(global.path()), None);
        assert!(config.is_default());
    }

    #[test]
    fn test_wrong_types_fall_back_to_defaults() {
        let global = write_toml("[store]\nglobal_max_records = \"lots\"\n");
        let config = load_config(Some(global.path()), None);
        assert!(config.is_default());
    }

    #[test]
    fn test_missing_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let config = load_config(Some(&missing), Some(&missing));
        assert!(config.is_default());
    }
}
