use serde::{Deserialize, Serialize};

/// Top-level failure classification. The set is closed; anything the
/// classifier cannot place lands in `Unknown`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Runtime,
    Type,
    Build,
    Dependency,
    Module,
    Test,
    Lint,
    Permission,
    Syntax,
    Network,
    Config,
    Docker,
    Edit,
    Git,
    Database,
    Memory,
    Timeout,
    Unknown,
}

impl Category {
    pub const ALL: [Category; 18] = [
        Category::Runtime,
        Category::Type,
        Category::Build,
        Category::Dependency,
        Category::Module,
        Category::Test,
        Category::Lint,
        Category::Permission,
        Category::Syntax,
        Category::Network,
        Category::Config,
        Category::Docker,
        Category::Edit,
        Category::Git,
        Category::Database,
        Category::Memory,
        Category::Timeout,
        Category::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Type => "type",
            Self::Build => "build",
            Self::Dependency => "dependency",
            Self::Module => "module",
            Self::Test => "test",
            Self::Lint => "lint",
            Self::Permission => "permission",
            Self::Syntax => "syntax",
            Self::Network => "network",
            Self::Config => "config",
            Self::Docker => "docker",
            Self::Edit => "edit",
            Self::Git => "git",
            Self::Database => "database",
            Self::Memory => "memory",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a category name as written in config files. Unrecognized names
    /// return `None` rather than collapsing to `Unknown`, so misspelled rules
    /// can be reported.
    pub fn parse(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|category| category.as_str() == lowered)
    }

    /// Severity is a pure function of category.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Build | Self::Database | Self::Memory => Severity::Critical,
            Self::Runtime | Self::Type | Self::Permission => Severity::High,
            Self::Test | Self::Module | Self::Syntax | Self::Network => Severity::Medium,
            Self::Lint | Self::Git | Self::Edit => Severity::Low,
            Self::Dependency | Self::Config | Self::Docker | Self::Timeout | Self::Unknown => {
                Severity::Medium
            }
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal urgency tag. Declaration order is ascending urgency so that
/// `Ord` sorts `Critical` last; use [`Severity::rank`] for display ordering.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Display rank, 0 is most urgent.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a fix was discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixSource {
    /// A failing command later succeeded after interim edits.
    AutoCorrelation,
    /// Shipped with the binary and loaded by `preload`.
    Seed,
}

impl FixSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoCorrelation => "auto_correlation",
            Self::Seed => "seed",
        }
    }
}
