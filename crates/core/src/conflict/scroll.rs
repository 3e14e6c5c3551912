//! Synchronized scrolling and next/previous-conflict navigation.
//!
//! The Ours and Theirs panes never change length during a session, so the
//! mapping between pane positions is computed once from region boundaries.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::conflict::region::ConflictSet;
use crate::models::{Direction, RegionId, Side};

/// Line positions of one logical location in all three panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanePositions {
    pub base: usize,
    pub ours: usize,
    pub theirs: usize,
}

/// Whether navigation can move from the current cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub has_prev: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone)]
struct Anchor {
    id: RegionId,
    base: Range<usize>,
    ours: Range<usize>,
    theirs: Range<usize>,
}

impl Anchor {
    fn side(&self, side: Side) -> &Range<usize> {
        match side {
            Side::Ours => &self.ours,
            Side::Theirs => &self.theirs,
        }
    }
}

/// Position mapping between the Base pane and the two side panes.
#[derive(Debug, Clone)]
pub struct ScrollCoordinator {
    anchors: Vec<Anchor>,
    base_len: usize,
    ours_len: usize,
    theirs_len: usize,
}

impl ScrollCoordinator {
    pub fn new(set: &ConflictSet) -> Self {
        let mut ours_shift: isize = 0;
        let mut theirs_shift: isize = 0;
        let anchors = set
            .regions()
            .iter()
            .map(|region| {
                let base = region.base_range();
                let ours_start = shift(base.start, ours_shift);
                let theirs_start = shift(base.start, theirs_shift);
                let anchor = Anchor {
                    id: region.id(),
                    ours: ours_start..ours_start + region.side_len(Side::Ours),
                    theirs: theirs_start..theirs_start + region.side_len(Side::Theirs),
                    base,
                };
                ours_shift += region.delta(Side::Ours);
                theirs_shift += region.delta(Side::Theirs);
                anchor
            })
            .collect();

        Self {
            anchors,
            base_len: set.base().len(),
            ours_len: set.ours().len(),
            theirs_len: set.theirs().len(),
        }
    }

    /// Positions in every pane corresponding to Base line `p`.
    pub fn map_base(&self, p: usize) -> PanePositions {
        let p = p.min(self.base_len);
        PanePositions {
            base: p,
            ours: self.base_to_side(Side::Ours, p),
            theirs: self.base_to_side(Side::Theirs, p),
        }
    }

    /// Positions in every pane corresponding to line `q` of the `side` pane.
    pub fn map_from(&self, side: Side, q: usize) -> PanePositions {
        self.map_base(self.side_to_base(side, q))
    }

    fn side_len(&self, side: Side) -> usize {
        match side {
            Side::Ours => self.ours_len,
            Side::Theirs => self.theirs_len,
        }
    }

    fn base_to_side(&self, side: Side, p: usize) -> usize {
        let mut shift_by: isize = 0;
        for anchor in &self.anchors {
            let target = anchor.side(side);
            if anchor.base.end <= p {
                shift_by = target.end as isize - anchor.base.end as isize;
                continue;
            }
            if anchor.base.start <= p {
                return within(target, p - anchor.base.start);
            }
            break;
        }
        shift(p, shift_by).min(self.side_len(side))
    }

    fn side_to_base(&self, side: Side, q: usize) -> usize {
        let mut shift_by: isize = 0;
        for anchor in &self.anchors {
            let source = anchor.side(side);
            if source.end <= q {
                shift_by = anchor.base.end as isize - source.end as isize;
                continue;
            }
            if source.start <= q {
                return within(&anchor.base, q - source.start);
            }
            break;
        }
        shift(q, shift_by).min(self.base_len)
    }

    /// Start of the first region strictly after `cursor`.
    pub fn next_diff(&self, cursor: usize) -> Option<usize> {
        self.anchors
            .iter()
            .map(|a| a.base.start)
            .find(|&start| start > cursor)
    }

    /// Start of the last region strictly before `cursor`.
    pub fn prev_diff(&self, cursor: usize) -> Option<usize> {
        self.anchors
            .iter()
            .rev()
            .map(|a| a.base.start)
            .find(|&start| start < cursor)
    }

    /// New cursor after a jump; unchanged when there is nowhere to go.
    pub fn navigate(&self, cursor: usize, direction: Direction) -> usize {
        let target = match direction {
            Direction::Next => self.next_diff(cursor),
            Direction::Prev => self.prev_diff(cursor),
        };
        target.unwrap_or(cursor)
    }

    pub fn navigation_state(&self, cursor: usize) -> NavigationState {
        NavigationState {
            has_prev: self.prev_diff(cursor).is_some(),
            has_next: self.next_diff(cursor).is_some(),
        }
    }

    /// The region covering Base line `p`, if any.
    pub fn region_at(&self, p: usize) -> Option<RegionId> {
        self.anchors
            .iter()
            .find(|a| a.base.contains(&p) || (a.base.is_empty() && a.base.start == p))
            .map(|a| a.id)
    }
}

fn shift(p: usize, by: isize) -> usize {
    (p as isize + by).max(0) as usize
}

/// Offset `offset` into `range`, clamped to its last line.
fn within(range: &Range<usize>, offset: usize) -> usize {
    if range.is_empty() {
        range.start
    } else {
        range.start + offset.min(range.len() - 1)
    }
}
