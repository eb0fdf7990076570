use fixlog_config::ClassifierConfig;
use fixlog_core::{AppError, Category, Severity};
use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::rules::{CATEGORY_RULES, FRAMEWORK_RULES};

/// Result of classifying one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub sub_category: String,
    pub framework: Option<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct CategoryRule {
    pattern: Regex,
    category: Category,
    sub_category: String,
}

impl CategoryRule {
    pub fn new(
        pattern: &str,
        category: Category,
        sub_category: impl Into<String>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            pattern: compile(pattern)?,
            category,
            sub_category: sub_category.into(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FrameworkRule {
    pattern: Regex,
    name: String,
}

impl FrameworkRule {
    pub fn new(pattern: &str, name: impl Into<String>) -> Result<Self, AppError> {
        Ok(Self {
            pattern: compile(pattern)?,
            name: name.into(),
        })
    }
}

fn compile(pattern: &str) -> Result<Regex, AppError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|err| AppError::InvalidRule {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })
}

/// Ordered first-match-wins rule tables. Pure once built: `classify` has no
/// side effects and the same input always yields the same output.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<CategoryRule>,
    frameworks: Vec<FrameworkRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Classifier {
    pub fn new(rules: Vec<CategoryRule>, frameworks: Vec<FrameworkRule>) -> Self {
        Self { rules, frameworks }
    }

    /// The built-in policy tables.
    pub fn builtin() -> Self {
        Self::new(builtin_rules(), builtin_frameworks())
    }

    /// User rules first, then the built-in tables. Invalid user rules are
    /// skipped with a warning.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let mut rules: Vec<CategoryRule> = config
            .rules
            .iter()
            .filter_map(|rule| {
                let Some(category) = Category::parse(&rule.category) else {
                    warn!(
                        category = %rule.category,
                        "skipping classifier rule with unknown category"
                    );
                    return None;
                };
                CategoryRule::new(&rule.pattern, category, rule.sub_category.clone())
                    .inspect_err(|err| warn!(%err, "skipping classifier rule"))
                    .ok()
            })
            .collect();
        rules.extend(builtin_rules());

        let mut frameworks: Vec<FrameworkRule> = config
            .frameworks
            .iter()
            .filter_map(|rule| {
                FrameworkRule::new(&rule.pattern, rule.name.clone())
                    .inspect_err(|err| warn!(%err, "skipping framework rule"))
                    .ok()
            })
            .collect();
        frameworks.extend(builtin_frameworks());

        Self::new(rules, frameworks)
    }

    pub fn classify(&self, snippet: &str, command_context: &str) -> Classification {
        let (category, sub_category) = self.categorize(snippet);
        Classification {
            category,
            sub_category,
            framework: self.detect_framework(&format!("{snippet}\n{command_context}")),
            severity: category.severity(),
        }
    }

    pub fn categorize(&self, snippet: &str) -> (Category, String) {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(snippet))
            .map(|rule| (rule.category, rule.sub_category.clone()))
            .unwrap_or((Category::Unknown, String::new()))
    }

    pub fn detect_framework(&self, text: &str) -> Option<String> {
        self.frameworks
            .iter()
            .find(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.name.clone())
    }
}

fn builtin_rules() -> Vec<CategoryRule> {
    CATEGORY_RULES
        .iter()
        .filter_map(|(pattern, category, sub_category)| {
            CategoryRule::new(pattern, *category, *sub_category)
                .inspect_err(|err| warn!(%err, "invalid built-in rule"))
                .ok()
        })
        .collect()
}

fn builtin_frameworks() -> Vec<FrameworkRule> {
    FRAMEWORK_RULES
        .iter()
        .filter_map(|(pattern, name)| {
            FrameworkRule::new(pattern, *name)
                .inspect_err(|err| warn!(%err, "invalid built-in framework rule"))
                .ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixlog_config::{FrameworkRuleConfig, RuleConfig};

    fn classify(snippet: &str) -> (Category, String) {
        Classifier::builtin().categorize(snippet)
    }

    #[test]
    fn test_builtin_tables_compile() {
        let classifier = Classifier::builtin();
        assert_eq!(classifier.rules.len(), CATEGORY_RULES.len());
        assert_eq!(classifier.frameworks.len(), FRAMEWORK_RULES.len());
    }

    #[test]
    fn test_null_reference() {
        let result = Classifier::builtin().classify(
            "TypeError: Cannot read properties of undefined (reading 'map')",
            "Bash npm test",
        );
        assert_eq!(result.category, Category::Runtime);
        assert_eq!(result.sub_category, "null_reference");
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.framework.as_deref(), Some("node"));
    }

    #[test]
    fn test_representative_categories() {
        let cases = [
            ("Error: Cannot find module 'lodash'", Category::Module, "module_not_found"),
            (
                "ModuleNotFoundError: No module named 'requests'",
                Category::Module,
                "module_not_found",
            ),
            (
                "error TS2322: Type 'string' is not assignable to type 'number'.",
                Category::Type,
                "type_mismatch",
            ),
            (
                "Error: listen EADDRINUSE: address already in use :::3000",
                Category::Network,
                "port_in_use",
            ),
            ("npm ERR! code ERESOLVE", Category::Dependency, "peer_dependency"),
            ("EACCES: permission denied, open '/etc/hosts'", Category::Permission, "access_denied"),
            (
                "FATAL ERROR: Reached heap limit Allocation failed - JavaScript heap out of memory",
                Category::Memory,
                "out_of_memory",
            ),
            ("CONFLICT (content): Merge conflict in src/a.ts", Category::Git, "merge_conflict"),
            ("Error: connect ECONNREFUSED 127.0.0.1:8080", Category::Network, "connection_refused"),
            ("Error: connect ECONNREFUSED 127.0.0.1:5432", Category::Database, "connection_failed"),
            ("SyntaxError: Unexpected token '}'", Category::Syntax, "unexpected_token"),
            ("error: relation \"users\" does not exist", Category::Database, "missing_table"),
            ("AssertionError: expected 1 to equal 2", Category::Test, "assertion_failure"),
            ("String to replace not found in file.", Category::Edit, "edit_mismatch"),
            ("bash: foo: command not found", Category::Config, "command_not_found"),
            (
                "error: could not compile `app` due to 2 previous errors",
                Category::Build,
                "build_failure",
            ),
            ("Error: pull access denied for app", Category::Docker, "container_error"),
        ];
        for (snippet, category, sub_category) in cases {
            assert_eq!(
                classify(snippet),
                (category, sub_category.to_string()),
                "snippet: {snippet}"
            );
        }
    }

    /// One typical message per built-in rule. Each must land on its own
    /// rule, so no earlier row shadows a later one.
    const RULE_SAMPLES: &[(&str, Category, &str)] = &[
        (
            "TypeError: Cannot read properties of undefined (reading 'map')",
            Category::Runtime,
            "null_reference",
        ),
        (
            "AttributeError: 'NoneType' object has no attribute 'id'",
            Category::Runtime,
            "null_reference",
        ),
        (
            "FATAL ERROR: Reached heap limit Allocation failed - JavaScript heap out of memory",
            Category::Memory,
            "out_of_memory",
        ),
        ("RangeError: Maximum call stack size exceeded", Category::Memory, "stack_overflow"),
        ("Segmentation fault (core dumped)", Category::Memory, "segfault"),
        (
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock",
            Category::Docker,
            "daemon_unavailable",
        ),
        ("Error response from daemon: No such container: web", Category::Docker, "container_error"),
        ("CONFLICT (content): Merge conflict in src/a.ts", Category::Git, "merge_conflict"),
        (
            "fatal: not a git repository (or any of the parent directories): .git",
            Category::Git,
            "not_a_repo",
        ),
        ("! [rejected]        main -> main (non-fast-forward)", Category::Git, "push_rejected"),
        (
            "error: pathspec 'feature' did not match any file(s) known to git",
            Category::Git,
            "working_tree",
        ),
        ("String to replace not found in file.", Category::Edit, "edit_mismatch"),
        ("error: relation \"users\" does not exist", Category::Database, "missing_table"),
        (
            "ERROR: duplicate key value violates unique constraint \"users_pkey\"",
            Category::Database,
            "constraint_violation",
        ),
        ("SQLITE_BUSY: database is locked", Category::Database, "lock_contention"),
        ("Error: connect ECONNREFUSED 127.0.0.1:5432", Category::Database, "connection_failed"),
        ("Error: Migration 20240101_init failed", Category::Database, "migration"),
        (
            "Error: listen EADDRINUSE: address already in use :::3000",
            Category::Network,
            "port_in_use",
        ),
        ("Error: connect ECONNREFUSED 127.0.0.1:8080", Category::Network, "connection_refused"),
        ("Error: getaddrinfo ENOTFOUND registry.example.com", Category::Network, "unreachable"),
        ("SSL: CERTIFICATE_VERIFY_FAILED certificate verify failed", Category::Network, "tls"),
        ("EACCES: permission denied, open '/etc/hosts'", Category::Permission, "access_denied"),
        ("npm ERR! code ERESOLVE", Category::Dependency, "peer_dependency"),
        (
            "because app depends on foo ^2.0.0, version solving failed.",
            Category::Dependency,
            "version_conflict",
        ),
        (
            "ERR_PNPM_OUTDATED_LOCKFILE Cannot install with frozen-lockfile",
            Category::Dependency,
            "lockfile",
        ),
        ("ModuleNotFoundError: No module named 'requests'", Category::Module, "module_not_found"),
        ("ImportError: cannot import name 'foo' from 'bar'", Category::Module, "bad_import"),
        (
            "error TS2339: Property 'foo' does not exist on type 'Bar'.",
            Category::Type,
            "missing_property",
        ),
        (
            "error TS2322: Type 'string' is not assignable to type 'number'.",
            Category::Type,
            "type_mismatch",
        ),
        ("TypeError: items.forEach is not a function", Category::Runtime, "not_a_function"),
        ("ReferenceError: foo is not defined", Category::Runtime, "undefined_reference"),
        ("IndexError: list index out of range", Category::Runtime, "index_out_of_bounds"),
        ("KeyError: 'name'", Category::Runtime, "missing_key"),
        (
            "FileNotFoundError: [Errno 2] No such file or directory: 'data.csv'",
            Category::Runtime,
            "file_not_found",
        ),
        ("IndentationError: unexpected indent", Category::Syntax, "indentation"),
        ("SyntaxError: Unexpected token '}'", Category::Syntax, "unexpected_token"),
        ("1 snapshot failed from 1 test suite", Category::Test, "snapshot_mismatch"),
        ("Exceeded timeout of 5000 ms for a test.", Category::Test, "test_timeout"),
        ("AssertionError: expected 1 to equal 2", Category::Test, "assertion_failure"),
        (
            "/src/a.ts 3:1 error Unexpected console statement no-console (eslint)",
            Category::Lint,
            "style_violation",
        ),
        ("/usr/bin/ld: main.o: undefined reference to `foo'", Category::Build, "link_error"),
        (
            "error: could not compile `app` due to 2 previous errors",
            Category::Build,
            "build_failure",
        ),
        ("Error: operation timed out after 30s", Category::Timeout, "operation_timeout"),
        ("bash: foo: command not found", Category::Config, "command_not_found"),
        ("error: unrecognized option '--frobnicate'", Category::Config, "invalid_option"),
        (
            "Error: missing required environment variable DATABASE_URL",
            Category::Config,
            "invalid_config",
        ),
        ("thread 'main' panicked at src/main.rs:3:5", Category::Runtime, "unhandled_exception"),
    ];

    #[test]
    fn test_no_rule_shadows_a_later_rule() {
        for (snippet, category, sub_category) in RULE_SAMPLES {
            assert_eq!(
                classify(snippet),
                (*category, sub_category.to_string()),
                "snippet: {snippet}"
            );
        }
    }

    #[test]
    fn test_rule_samples_cover_every_rule() {
        for (_, category, sub_category) in CATEGORY_RULES {
            assert!(
                RULE_SAMPLES.iter().any(|(_, c, s)| c == category && s == sub_category),
                "no sample for {category}/{sub_category}"
            );
        }
    }

    #[test]
    fn test_error_codes_match_whole_words() {
        for snippet in [
            "ModuleNotFoundError: No module named 'requests'",
            "FileNotFoundError: [Errno 2] No such file or directory: 'a.txt'",
        ] {
            assert_ne!(classify(snippet).0, Category::Network, "snippet: {snippet}");
        }
    }

    #[test]
    fn test_unmatched_is_unknown() {
        let result = Classifier::builtin().classify("something odd happened", "");
        assert_eq!(result.category, Category::Unknown);
        assert!(result.sub_category.is_empty());
        assert_eq!(result.severity, Severity::Medium);
        assert_eq!(result.framework, None);
    }

    #[test]
    fn test_framework_uses_command_context() {
        let classifier = Classifier::builtin();
        assert_eq!(
            classifier.detect_framework("FAIL src/a.test.ts\nnpx jest").as_deref(),
            Some("jest")
        );
        assert_eq!(
            classifier
                .classify("ValueError", "Bash python manage.py migrate")
                .framework
                .as_deref(),
            Some("django")
        );
    }

    #[test]
    fn test_user_rules_take_precedence() {
        let config = ClassifierConfig {
            rules: vec![
                RuleConfig {
                    pattern: "cannot read properties".into(),
                    category: "type".into(),
                    sub_category: "custom".into(),
                },
                RuleConfig {
                    pattern: "(unclosed".into(),
                    category: "runtime".into(),
                    sub_category: "broken".into(),
                },
                RuleConfig {
                    pattern: "anything".into(),
                    category: "no-such-category".into(),
                    sub_category: String::new(),
                },
            ],
            frameworks: vec![FrameworkRuleConfig {
                pattern: "acme-cli".into(),
                name: "acme".into(),
            }],
        };
        let classifier = Classifier::from_config(&config);
        assert_eq!(classifier.rules.len(), CATEGORY_RULES.len() + 1);

        let result = classifier.classify("Cannot read properties of undefined", "acme-cli build");
        assert_eq!(result.category, Category::Type);
        assert_eq!(result.sub_category, "custom");
        assert_eq!(result.framework.as_deref(), Some("acme"));
    }

    #[test]
    fn test_invalid_rule_is_typed_error() {
        let err = CategoryRule::new("(", Category::Runtime, "x").unwrap_err();
        assert!(matches!(err, AppError::InvalidRule { .. }));
    }

    #[test]
    fn test_classify_is_deterministic() {
        let classifier = Classifier::builtin();
        let snippet = "Error: Cannot find module 'react'";
        assert_eq!(
            classifier.classify(snippet, "npm run build"),
            classifier.classify(snippet, "npm run build")
        );
    }

    proptest::proptest! {
        #[test]
        fn classify_is_total(snippet in ".{0,200}", context in "[a-z ]{0,30}") {
            let result = Classifier::builtin().classify(&snippet, &context);
            proptest::prop_assert_eq!(result.severity, result.category.severity());
            proptest::prop_assert_eq!(
                result.category == Category::Unknown,
                result.sub_category.is_empty()
            );
        }
    }
}
