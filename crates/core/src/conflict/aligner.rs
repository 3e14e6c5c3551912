//! Hunk alignment: partition Base into unchanged spans and conflict regions.
//!
//! Base→Ours and Base→Theirs are diffed independently. Their edits are then
//! merged in Base order and grouped: edits whose Base ranges overlap share a
//! region, and a zero-width insertion touching a neighbouring edit (from
//! either side) is folded into that edit's region. Edits that merely touch
//! without any insertion involved stay separate. Each region records, per
//! side, the full text that side has for the region's Base range.

use std::ops::Range;

use tracing::debug;

use crate::conflict::diff::{diff_lines, EditScript};
use crate::conflict::region::ConflictRegion;
use crate::models::{RegionId, Side};
use crate::text::{Line, Text};

/// One non-equal op from either side's script.
#[derive(Debug, Clone)]
struct Edit<'a> {
    side: Side,
    base: Range<usize>,
    lines: &'a [Line],
}

impl Edit<'_> {
    fn is_insertion(&self) -> bool {
        self.base.is_empty()
    }
}

/// Compute the ordered region list for `base` / `ours` / `theirs`.
///
/// Deterministic and side-effect free; ids are assigned left to right.
pub fn align(base: &Text, ours: &Text, theirs: &Text) -> Vec<ConflictRegion> {
    let ours_script = diff_lines(base, ours);
    let theirs_script = diff_lines(base, theirs);

    let mut edits = collect_edits(&ours_script, Side::Ours);
    edits.extend(collect_edits(&theirs_script, Side::Theirs));
    // Ours before Theirs on identical anchors keeps grouping order stable.
    edits.sort_by_key(|e| (e.base.start, e.base.end, side_rank(e.side)));

    let regions: Vec<ConflictRegion> = group_edits(edits)
        .into_iter()
        .enumerate()
        .filter_map(|(i, group)| build_region(RegionId(i), &group, base))
        .collect();

    debug!(
        base_lines = base.len(),
        regions = regions.len(),
        "alignment complete"
    );
    regions
}

fn side_rank(side: Side) -> u8 {
    match side {
        Side::Ours => 0,
        Side::Theirs => 1,
    }
}

fn collect_edits(script: &EditScript, side: Side) -> Vec<Edit<'_>> {
    script
        .edits()
        .map(|op| Edit {
            side,
            base: op.base_range(),
            lines: op.replacement().unwrap_or(&[]),
        })
        .collect()
}

/// Group Base-sorted edits into region-sized clusters.
fn group_edits(edits: Vec<Edit<'_>>) -> Vec<Vec<Edit<'_>>> {
    let mut groups: Vec<Vec<Edit<'_>>> = Vec::new();
    let mut group_end = 0;
    // Some edit in the current group is an insertion anchored at `group_end`.
    let mut insertion_at_end = false;

    for edit in edits {
        let joins = !groups.is_empty()
            && (edit.base.start < group_end
                || (edit.base.start == group_end && (edit.is_insertion() || insertion_at_end)));

        if joins {
            if edit.base.end > group_end {
                group_end = edit.base.end;
                insertion_at_end = edit.is_insertion();
            } else if edit.base.end == group_end && edit.is_insertion() {
                insertion_at_end = true;
            }
            if let Some(group) = groups.last_mut() {
                group.push(edit);
            }
        } else {
            group_end = edit.base.end;
            insertion_at_end = edit.is_insertion();
            groups.push(vec![edit]);
        }
    }
    groups
}

fn build_region(id: RegionId, group: &[Edit<'_>], base: &Text) -> Option<ConflictRegion> {
    let start = group.iter().map(|e| e.base.start).min()?;
    let end = group.iter().map(|e| e.base.end).max()?;
    let range = start..end;
    let ours = side_lines(group, Side::Ours, base, range.clone());
    let theirs = side_lines(group, Side::Theirs, base, range.clone());
    ConflictRegion::new(id, range, ours, theirs)
}

/// The text `side` has over `range`: its edits, with Base filling the gaps.
fn side_lines(group: &[Edit<'_>], side: Side, base: &Text, range: Range<usize>) -> Option<Vec<Line>> {
    let mut edits = group.iter().filter(|e| e.side == side).peekable();
    edits.peek()?;

    let mut out = Vec::new();
    let mut cursor = range.start;
    for edit in edits {
        out.extend_from_slice(base.slice(cursor..edit.base.start));
        out.extend_from_slice(edit.lines);
        cursor = edit.base.end;
    }
    out.extend_from_slice(base.slice(cursor..range.end));
    Some(out)
}
