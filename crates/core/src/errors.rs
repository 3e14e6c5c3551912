//! Error types for the mergepane core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.

use thiserror::Error;

use crate::models::{RegionId, Side};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    WorkingCopy(#[from] WorkingCopyError),
}

// ---------------------------------------------------------------------------
// Merge session errors
// ---------------------------------------------------------------------------

/// Errors surfaced by merge-view commands.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The path lacks Base/Ours/Theirs stage data.
    #[error("no merge view available: '{0}' is not in conflict")]
    NotAConflict(String),

    /// Inline conflict markers could not be parsed.
    #[error("cannot parse conflict markers at line {line}: {detail}")]
    MalformedMarkers { line: usize, detail: String },

    /// The backend failed to produce stage text.
    #[error("failed to read stage text for '{path}': {detail}")]
    StageReadFailure { path: String, detail: String },

    /// The working file changed outside the resolve session.
    #[error("working file '{0}' changed externally; reload required")]
    StaleConflict(String),

    /// Mark-resolved was attempted with regions still undecided.
    #[error("{} region(s) still unresolved: {}", .0.len(), join_ids(.0))]
    IncompleteResolution(Vec<RegionId>),

    /// An accept/ignore targeted a side with no edit in the region.
    #[error("region {region} has no {side} edit")]
    NoSuchSide { region: RegionId, side: Side },

    /// No region with the given id exists in the conflict set.
    #[error("region {0} not found")]
    RegionNotFound(RegionId),

    /// A resolve action arrived while the Base pane is read-only.
    #[error("merge view for '{0}' is read-only; toggle resolve mode first")]
    ReadOnlyView(String),

    /// No merge view is open for the path.
    #[error("no merge view open for '{0}'")]
    SessionNotOpen(String),

    /// The resolver task for a conflict set has shut down.
    #[error("conflict session closed")]
    SessionClosed,

    /// An alignment was superseded by a close or reopen.
    #[error("alignment for '{0}' was cancelled")]
    Cancelled(String),

    #[error(transparent)]
    WorkingCopy(#[from] WorkingCopyError),
}

fn join_ids(ids: &[RegionId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// How the hosting surface should degrade after a [`MergeError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// Show "no merge view available".
    NoMergeView,
    /// Show the raw file; it stays editable as plain text.
    ShowRawFile,
    /// Non-fatal notification; the file opens in plain edit mode.
    PlainEdit,
    /// Reload the conflict set before accepting further actions.
    Reload,
    /// Jump to the listed pending regions.
    JumpToRegions(Vec<RegionId>),
    /// Reject the action without changing state.
    Reject,
}

impl MergeError {
    /// The degradation the UI should apply for this error.
    pub fn fallback(&self) -> Fallback {
        match self {
            Self::NotAConflict(_) => Fallback::NoMergeView,
            Self::MalformedMarkers { .. } => Fallback::ShowRawFile,
            Self::StageReadFailure { .. } | Self::WorkingCopy(_) => Fallback::PlainEdit,
            Self::StaleConflict(_) => Fallback::Reload,
            Self::IncompleteResolution(ids) => Fallback::JumpToRegions(ids.clone()),
            Self::SessionNotOpen(_) | Self::SessionClosed | Self::Cancelled(_) => {
                Fallback::NoMergeView
            }
            Self::NoSuchSide { .. } | Self::RegionNotFound(_) | Self::ReadOnlyView(_) => {
                Fallback::Reject
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stage text errors
// ---------------------------------------------------------------------------

/// Errors from stage text providers.
#[derive(Debug, Error)]
pub enum StageError {
    /// At least one of the three stages is missing.
    #[error("'{0}' has no three-stage conflict data")]
    NotAConflict(String),

    /// The marker fallback found delimiters out of order or missing.
    #[error("malformed conflict markers at line {line}: {detail}")]
    MalformedMarkers { line: usize, detail: String },

    /// Backend I/O failure while reading stage content.
    #[error("stage read failed for '{path}': {detail}")]
    ReadFailure { path: String, detail: String },

    /// The backing repository could not be opened.
    #[error("stage provider unavailable: {0}")]
    Unavailable(String),
}

impl From<StageError> for MergeError {
    fn from(err: StageError) -> Self {
        match err {
            StageError::NotAConflict(path) => MergeError::NotAConflict(path),
            StageError::MalformedMarkers { line, detail } => {
                MergeError::MalformedMarkers { line, detail }
            }
            StageError::ReadFailure { path, detail } => {
                MergeError::StageReadFailure { path, detail }
            }
            StageError::Unavailable(detail) => MergeError::StageReadFailure {
                path: String::new(),
                detail,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Working copy errors
// ---------------------------------------------------------------------------

/// Errors reading or writing the conflicted working file.
#[derive(Debug, Error)]
pub enum WorkingCopyError {
    #[error("working copy I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("working file '{0}' is not valid UTF-8")]
    NotUtf8(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
