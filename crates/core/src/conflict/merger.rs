//! Merge application: render a fully decided conflict set to final text.
//!
//! Unchanged spans come verbatim from Base. For a region where both sides
//! diverge, each accepted side is emitted (Ours first, then Theirs) and an
//! ignored side contributes nothing, so ignoring both drops the Base span.
//! For a one-sided region, accepting applies the edit and ignoring keeps Base,
//! since the side without an edit is identical to Base there.

use tracing::debug;

use crate::conflict::region::{ConflictRegion, ConflictSet, Span};
use crate::errors::MergeError;
use crate::models::{ConflictClass, Decision, Side};
use crate::text::{Line, LineEnding, Text};

/// Stateless merge renderer.
pub struct MergeApplier;

impl MergeApplier {
    /// Render the merged text of a fully resolved set.
    pub fn apply(set: &ConflictSet) -> Result<Text, MergeError> {
        let pending = set.pending_regions();
        if !pending.is_empty() {
            return Err(MergeError::IncompleteResolution(pending));
        }

        let mut out: Vec<Line> = Vec::with_capacity(set.base().len());
        for span in set.spans() {
            match span {
                Span::Unchanged(range) => append(&mut out, set.base().slice(range)),
                Span::Region(region) => append(&mut out, &Self::region_lines(region, set.base())),
            }
        }
        debug!(lines = out.len(), "merge applied");
        Ok(Text::from(out))
    }

    /// Lines a decided region contributes to the output.
    pub fn region_lines(region: &ConflictRegion, base: &Text) -> Vec<Line> {
        let base_lines = base.slice(region.base_range());
        let mut out = Vec::new();
        match region.class() {
            ConflictClass::Conflicting => {
                for side in [Side::Ours, Side::Theirs] {
                    if region.decision(side) == Some(Decision::Accepted) {
                        append(&mut out, region.edit(side).unwrap_or(&[]));
                    }
                }
            }
            ConflictClass::OursOnly | ConflictClass::TheirsOnly => {
                let side = if region.class() == ConflictClass::OursOnly {
                    Side::Ours
                } else {
                    Side::Theirs
                };
                match region.decision(side) {
                    Some(Decision::Accepted) => append(&mut out, region.edit(side).unwrap_or(&[])),
                    _ => append(&mut out, base_lines),
                }
            }
        }
        out
    }

    /// Unified diff from `current` (the conflicted working file) to `merged`.
    pub fn preview_patch(current: &str, merged: &Text) -> String {
        let merged = merged.to_string();
        diffy::create_patch(current, &merged).to_string()
    }
}

/// Append `lines`, terminating a previously unterminated last line so two
/// sources never run together.
pub(crate) fn append(out: &mut Vec<Line>, lines: &[Line]) {
    if lines.is_empty() {
        return;
    }
    if let Some(last) = out.last_mut() {
        if last.ending() == LineEnding::None {
            *last = last.with_ending(LineEnding::Lf);
        }
    }
    out.extend_from_slice(lines);
}
