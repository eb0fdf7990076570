//! Shared types for the fixlog error/fix memory layer.

pub mod error;
pub mod record;
pub mod snippet;
pub mod types;

pub use error::AppError;
pub use record::{ErrorRecord, FixRecord};
pub use types::{Category, FixSource, Severity};
