//! Failure capture, fix correlation, pattern analysis and session digests.

pub mod advisory;
pub mod analyzer;
pub mod classifier;
pub mod composer;
pub mod correlation;
pub mod event;
mod rules;
pub mod seed;

pub use advisory::{Advisory, NO_OPERATIONS_FIX};
pub use analyzer::{PatternReport, analyze, load_report, run_analysis};
pub use classifier::{Classification, Classifier};
pub use composer::compose;
pub use correlation::{AnalysisTrigger, CorrelationEngine, NoopTrigger, Outcome};
pub use event::{EventKind, ToolEvent};
pub use rules::framework_advice;
pub use seed::{PreloadOutcome, preload};
