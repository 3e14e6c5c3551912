//! Three-way conflict engine.
//!
//! The conflict subsystem is responsible for:
//! 1. **Alignment** -- diffing Base against Ours and Theirs and partitioning
//!    Base into unchanged spans and conflict regions.
//! 2. **Resolution** -- tracking per-side accept/ignore decisions.
//! 3. **Merging** -- rendering a fully decided set to the final text.
//! 4. **Navigation** -- mapping positions between the three panes.

pub mod aligner;
pub mod diff;
pub mod markers;
pub mod merger;
pub mod region;
pub mod resolver;
pub mod scroll;

pub use aligner::align;
pub use diff::{diff_lines, EditOp, EditScript};
pub use markers::{parse_marker_blocks, reconstruct_stages, render_with_markers, MarkerBlock};
pub use merger::MergeApplier;
pub use region::{ConflictRegion, ConflictSet, SideEdit, Span};
pub use resolver::{ActionOutcome, ConflictResolver, ResolveAction};
pub use scroll::{NavigationState, PanePositions, ScrollCoordinator};
