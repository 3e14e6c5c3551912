//! Mergepane core library.
//!
//! This crate provides the pieces behind a three-pane merge view: text and
//! line diffing, conflict-region alignment, per-region decisions and merged
//! output, stage text providers (git index or inline markers), and the
//! session layer that serializes resolve actions per file.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod models;
pub mod session;
pub mod stage;
pub mod text;
pub mod working_copy;

// Re-exports for convenience.
pub use config::AppConfig;
pub use conflict::{ConflictRegion, ConflictSet, MergeApplier, ResolveAction};
pub use errors::{CoreError, Fallback, MergeError, StageError};
pub use models::{Decision, Direction, PaneMode, RegionId, Side, StageSource, Verdict};
pub use session::{ConflictHandle, ConflictIndex, MergeView, MergeWorkspace};
pub use stage::{FallbackProvider, GitStageProvider, MarkerFileProvider, StageTextProvider};
pub use text::{Line, LineEnding, Text};
pub use working_copy::{FsWorkingCopy, WorkingCopy};
