//! Conflict regions and the per-file conflict set.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::conflict::aligner;
use crate::errors::MergeError;
use crate::models::{ConflictClass, Decision, RegionId, Side};
use crate::text::{Line, Text};

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// One side's replacement for a region's Base range, plus the user's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEdit {
    pub lines: Vec<Line>,
    pub decision: Decision,
}

impl SideEdit {
    fn new(lines: Vec<Line>) -> Self {
        Self {
            lines,
            decision: Decision::Undecided,
        }
    }
}

/// A maximal span of Base where Ours and/or Theirs diverge.
///
/// At least one of `ours` / `theirs` is always present. Only the decision
/// fields change after alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRegion {
    id: RegionId,
    base_range: Range<usize>,
    ours: Option<SideEdit>,
    theirs: Option<SideEdit>,
}

impl ConflictRegion {
    /// Returns `None` when neither side has an edit.
    pub(crate) fn new(
        id: RegionId,
        base_range: Range<usize>,
        ours: Option<Vec<Line>>,
        theirs: Option<Vec<Line>>,
    ) -> Option<Self> {
        if ours.is_none() && theirs.is_none() {
            return None;
        }
        Some(Self {
            id,
            base_range,
            ours: ours.map(SideEdit::new),
            theirs: theirs.map(SideEdit::new),
        })
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn base_range(&self) -> Range<usize> {
        self.base_range.clone()
    }

    pub fn side(&self, side: Side) -> Option<&SideEdit> {
        match side {
            Side::Ours => self.ours.as_ref(),
            Side::Theirs => self.theirs.as_ref(),
        }
    }

    fn side_mut(&mut self, side: Side) -> Option<&mut SideEdit> {
        match side {
            Side::Ours => self.ours.as_mut(),
            Side::Theirs => self.theirs.as_mut(),
        }
    }

    /// Replacement lines for `side`, if that side edits this region.
    pub fn edit(&self, side: Side) -> Option<&[Line]> {
        self.side(side).map(|s| s.lines.as_slice())
    }

    pub fn ours_edit(&self) -> Option<&[Line]> {
        self.edit(Side::Ours)
    }

    pub fn theirs_edit(&self) -> Option<&[Line]> {
        self.edit(Side::Theirs)
    }

    /// Decision for `side`; `None` when the side has no edit.
    pub fn decision(&self, side: Side) -> Option<Decision> {
        self.side(side).map(|s| s.decision)
    }

    pub fn class(&self) -> ConflictClass {
        match (&self.ours, &self.theirs) {
            (Some(_), Some(_)) => ConflictClass::Conflicting,
            (Some(_), None) => ConflictClass::OursOnly,
            // `new` rejects the all-absent case.
            (None, _) => ConflictClass::TheirsOnly,
        }
    }

    /// Every present side has a non-undecided decision.
    pub fn is_resolved(&self) -> bool {
        [&self.ours, &self.theirs]
            .into_iter()
            .flatten()
            .all(|s| s.decision.is_decided())
    }

    /// Line-count change `side` makes to this region (0 if it has no edit).
    pub fn delta(&self, side: Side) -> isize {
        self.edit(side)
            .map(|lines| lines.len() as isize - self.base_range.len() as isize)
            .unwrap_or(0)
    }

    /// Number of lines this region occupies in the `side` pane.
    pub fn side_len(&self, side: Side) -> usize {
        self.edit(side)
            .map(<[Line]>::len)
            .unwrap_or(self.base_range.len())
    }

    /// Overwrite the decision for `side`.
    ///
    /// Fails with `NoSuchSide` and leaves the region untouched when the side
    /// has no edit.
    pub(crate) fn set_decision(&mut self, side: Side, decision: Decision) -> Result<(), MergeError> {
        let id = self.id;
        let edit = self
            .side_mut(side)
            .ok_or(MergeError::NoSuchSide { region: id, side })?;
        edit.decision = decision;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Spans
// ---------------------------------------------------------------------------

/// A piece of the Base partition: either untouched lines or a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span<'a> {
    Unchanged(Range<usize>),
    Region(&'a ConflictRegion),
}

impl Span<'_> {
    pub fn base_range(&self) -> Range<usize> {
        match self {
            Self::Unchanged(r) => r.clone(),
            Self::Region(region) => region.base_range(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conflict set
// ---------------------------------------------------------------------------

/// Alignment result and resolution state for one conflicted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSet {
    base: Text,
    ours: Text,
    theirs: Text,
    regions: Vec<ConflictRegion>,
}

impl ConflictSet {
    /// Align the three texts and start every region undecided.
    pub fn new(base: Text, ours: Text, theirs: Text) -> Self {
        let regions = aligner::align(&base, &ours, &theirs);
        Self {
            base,
            ours,
            theirs,
            regions,
        }
    }

    pub fn base(&self) -> &Text {
        &self.base
    }

    pub fn ours(&self) -> &Text {
        &self.ours
    }

    pub fn theirs(&self) -> &Text {
        &self.theirs
    }

    /// Regions sorted by Base start.
    pub fn regions(&self) -> &[ConflictRegion] {
        &self.regions
    }

    pub fn region(&self, id: RegionId) -> Result<&ConflictRegion, MergeError> {
        self.regions
            .get(id.0)
            .filter(|r| r.id == id)
            .ok_or(MergeError::RegionNotFound(id))
    }

    pub(crate) fn region_mut(&mut self, id: RegionId) -> Result<&mut ConflictRegion, MergeError> {
        self.regions
            .get_mut(id.0)
            .filter(|r| r.id == id)
            .ok_or(MergeError::RegionNotFound(id))
    }

    /// The full Base partition, in order, including the implied unchanged spans.
    pub fn spans(&self) -> Vec<Span<'_>> {
        let mut spans = Vec::with_capacity(self.regions.len() * 2 + 1);
        let mut cursor = 0;
        for region in &self.regions {
            if region.base_range.start > cursor {
                spans.push(Span::Unchanged(cursor..region.base_range.start));
            }
            spans.push(Span::Region(region));
            cursor = region.base_range.end;
        }
        if cursor < self.base.len() {
            spans.push(Span::Unchanged(cursor..self.base.len()));
        }
        spans
    }

    /// True iff no present side of any region is undecided.
    pub fn is_resolved(&self) -> bool {
        self.regions.iter().all(ConflictRegion::is_resolved)
    }

    /// Regions with at least one undecided side.
    pub fn pending_regions(&self) -> Vec<RegionId> {
        self.regions
            .iter()
            .filter(|r| !r.is_resolved())
            .map(|r| r.id)
            .collect()
    }

    /// Regions where both sides diverge.
    pub fn conflicting_count(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| r.class() == ConflictClass::Conflicting)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(ls: &[&str]) -> Vec<Line> {
        Text::from_lines(ls.iter().copied()).into_lines()
    }

    #[test]
    fn test_region_requires_an_edit() {
        assert!(ConflictRegion::new(RegionId(0), 1..2, None, None).is_none());
        let r = ConflictRegion::new(RegionId(0), 1..2, Some(lines(&["x"])), None).unwrap();
        assert_eq!(r.class(), ConflictClass::OursOnly);
        let r = ConflictRegion::new(RegionId(0), 1..2, None, Some(vec![])).unwrap();
        assert_eq!(r.class(), ConflictClass::TheirsOnly);
    }

    #[test]
    fn test_set_decision_on_missing_side() {
        let mut r = ConflictRegion::new(RegionId(4), 0..1, Some(lines(&["x"])), None).unwrap();
        let err = r.set_decision(Side::Theirs, Decision::Accepted).unwrap_err();
        assert!(matches!(
            err,
            MergeError::NoSuchSide {
                region: RegionId(4),
                side: Side::Theirs
            }
        ));
        assert_eq!(r.decision(Side::Theirs), None);
        assert_eq!(r.decision(Side::Ours), Some(Decision::Undecided));
    }

    #[test]
    fn test_region_resolution_tracks_present_sides() {
        let mut r = ConflictRegion::new(
            RegionId(0),
            2..3,
            Some(lines(&["a", "b"])),
            Some(lines(&["c"])),
        )
        .unwrap();
        assert!(!r.is_resolved());
        r.set_decision(Side::Ours, Decision::Accepted).unwrap();
        assert!(!r.is_resolved());
        r.set_decision(Side::Theirs, Decision::Ignored).unwrap();
        assert!(r.is_resolved());
        assert_eq!(r.delta(Side::Ours), 1);
        assert_eq!(r.delta(Side::Theirs), 0);
    }

    #[test]
    fn test_spans_tile_base() {
        let set = ConflictSet::new(
            Text::from_lines(["a", "b", "c", "d", "e"]),
            Text::from_lines(["a", "B", "c", "d", "e"]),
            Text::from_lines(["a", "b", "c", "D", "e"]),
        );
        let ranges: Vec<_> = set.spans().iter().map(Span::base_range).collect();
        assert_eq!(ranges, vec![0..1, 1..2, 2..3, 3..4, 4..5]);
        assert_eq!(set.conflicting_count(), 0);
        assert!(matches!(set.spans()[1], Span::Region(_)));
        assert!(matches!(set.spans()[3], Span::Region(_)));
    }

    #[test]
    fn test_region_lookup() {
        let set = ConflictSet::new(
            Text::from_lines(["a"]),
            Text::from_lines(["b"]),
            Text::from_lines(["a"]),
        );
        assert!(set.region(RegionId(0)).is_ok());
        assert!(matches!(
            set.region(RegionId(1)),
            Err(MergeError::RegionNotFound(RegionId(1)))
        ));
    }

    #[test]
    fn test_conflicting_count() {
        let set = ConflictSet::new(
            Text::from_lines(["a", "b", "c", "d"]),
            Text::from_lines(["A", "b", "c", "D"]),
            Text::from_lines(["a2", "b", "c", "d"]),
        );
        assert_eq!(set.regions().len(), 2);
        assert_eq!(set.conflicting_count(), 1);
    }
}
