//! Configuration loading (`config.toml`) and path resolution for fixlog.

pub mod config;
pub mod paths;

pub use config::{
    AnalysisConfig, CaptureConfig, ClassifierConfig, ContextConfig, FixlogConfig,
    FrameworkRuleConfig, RuleConfig, StoreConfig, load_config,
};
pub use paths::{ProjectScope, project_hash};
