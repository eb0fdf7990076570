//! On-disk persistence for fixlog: JSON-lines record logs, the pending
//! correlation document, the preload marker and derived JSON artifacts.
//!
//! ## Layout (under the state directory)
//!
//! ```text
//! errors.jsonl                   global ErrorRecord log (rotated)
//! fixes.jsonl                    global FixRecord log (append-only)
//! projects/{hash}/errors.jsonl   per-project ErrorRecord log (rotated)
//! patterns.json                  derived pattern report (full replace)
//! pending/{key}.json             pending correlation per working directory
//! preload.json                   seed knowledge marker
//! sequence.json                  running count of global error appends
//! ```
//!
//! Appends are single `write` calls on an `O_APPEND` handle. Rotation,
//! in-place updates and artifact writes build the new content in memory and
//! replace the file via temp-file + rename; they are not coordinated across
//! processes.

pub mod artifact;
mod layout;
mod log;
mod pending;
mod rotation;

pub use artifact::{read_json, write_json_atomic};
pub use layout::StoreLayout;
pub use log::RecordLog;
pub use pending::{AppendSequence, PendingCorrelation, PendingStore, PreloadMarker};
pub use rotation::{Resolvable, plan_rotation};
