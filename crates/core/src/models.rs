//! Domain model types shared by the aligner, resolver, and session layer.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Regions and sides
// ---------------------------------------------------------------------------

/// Identifier of a region, stable within one `ConflictSet`.
///
/// Ids are assigned left to right in Base order starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub usize);

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the two diverging versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Ours,
    Theirs,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Self::Ours => Self::Theirs,
            Self::Theirs => Self::Ours,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
        }
    }
}

/// Per-side resolution state of a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    #[default]
    Undecided,
    Accepted,
    Ignored,
}

impl Decision {
    pub fn is_decided(self) -> bool {
        self != Self::Undecided
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undecided => write!(f, "undecided"),
            Self::Accepted => write!(f, "accepted"),
            Self::Ignored => write!(f, "ignored"),
        }
    }
}

/// A user verdict on one side of one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accept,
    Ignore,
}

impl From<Verdict> for Decision {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Accept => Decision::Accepted,
            Verdict::Ignore => Decision::Ignored,
        }
    }
}

/// Which sides diverge from Base inside a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictClass {
    OursOnly,
    TheirsOnly,
    Conflicting,
}

impl std::fmt::Display for ConflictClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OursOnly => write!(f, "ours_only"),
            Self::TheirsOnly => write!(f, "theirs_only"),
            Self::Conflicting => write!(f, "conflicting"),
        }
    }
}

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

/// Whether the Base pane accepts gutter actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaneMode {
    #[default]
    ReadOnly,
    Resolve,
}

impl PaneMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::ReadOnly => Self::Resolve,
            Self::Resolve => Self::ReadOnly,
        }
    }
}

/// Direction of a next/previous-conflict jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Next,
    Prev,
}

// ---------------------------------------------------------------------------
// Conflicts listing
// ---------------------------------------------------------------------------

/// Where the three stage texts of a conflicted path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageSource {
    /// Version-control index stages 1/2/3.
    Index,
    /// diff3-style inline conflict markers in the working file.
    Markers,
}

impl std::fmt::Display for StageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index => write!(f, "index"),
            Self::Markers => write!(f, "markers"),
        }
    }
}

/// An entry in the "files with conflicts" listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictedFile {
    pub path: PathBuf,
    pub source: StageSource,
    pub region_count: usize,
    pub detected_at: DateTime<Utc>,
}
