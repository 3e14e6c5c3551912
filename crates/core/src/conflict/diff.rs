//! Line-level edit scripts.
//!
//! [`diff_lines`] computes a minimal edit script from Base to one side with
//! the Myers search from `similar`, comparing line contents only. Every op is
//! anchored at Base line positions so two scripts against the same Base can
//! be walked side by side.

use std::ops::Range;

use similar::{capture_diff_slices, Algorithm, DiffOp};

use crate::text::{Line, Text};

/// One step of an edit script, anchored in Base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Base lines kept unchanged.
    Equal(Range<usize>),
    /// Base lines replaced by `lines`.
    Replace { base: Range<usize>, lines: Vec<Line> },
    /// `lines` inserted before Base line `at`.
    Insert { at: usize, lines: Vec<Line> },
    /// Base lines removed.
    Delete(Range<usize>),
}

impl EditOp {
    /// The Base interval this op covers (empty for insertions).
    pub fn base_range(&self) -> Range<usize> {
        match self {
            Self::Equal(r) | Self::Delete(r) => r.clone(),
            Self::Replace { base, .. } => base.clone(),
            Self::Insert { at, .. } => *at..*at,
        }
    }

    /// The replacement lines, or `None` for [`EditOp::Equal`].
    pub fn replacement(&self) -> Option<&[Line]> {
        match self {
            Self::Equal(_) => None,
            Self::Replace { lines, .. } | Self::Insert { lines, .. } => Some(lines),
            Self::Delete(_) => Some(&[]),
        }
    }

    pub fn is_equal(&self) -> bool {
        matches!(self, Self::Equal(_))
    }
}

/// Insertion/deletion line counts of a script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub insertions: usize,
    pub deletions: usize,
}

/// An ordered edit script from Base to one side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    ops: Vec<EditOp>,
}

impl EditScript {
    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }

    /// Non-equal ops in Base order.
    pub fn edits(&self) -> impl Iterator<Item = &EditOp> {
        self.ops.iter().filter(|op| !op.is_equal())
    }

    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(EditOp::is_equal)
    }

    pub fn stats(&self) -> DiffStats {
        let mut stats = DiffStats::default();
        for op in &self.ops {
            match op {
                EditOp::Equal(_) => {}
                EditOp::Replace { base, lines } => {
                    stats.deletions += base.len();
                    stats.insertions += lines.len();
                }
                EditOp::Insert { lines, .. } => stats.insertions += lines.len(),
                EditOp::Delete(r) => stats.deletions += r.len(),
            }
        }
        stats
    }

    /// Replay the script on `base`.
    pub fn apply(&self, base: &Text) -> Text {
        let mut out = Vec::new();
        for op in &self.ops {
            match op {
                EditOp::Equal(r) => out.extend_from_slice(base.slice(r.clone())),
                other => out.extend_from_slice(other.replacement().unwrap_or(&[])),
            }
        }
        Text::from(out)
    }
}

/// Compute the edit script turning `base` into `side`.
///
/// Adjacent delete/insert ops from the search are folded into one gap, so
/// an edited span always comes out as a single `Replace`.
pub fn diff_lines(base: &Text, side: &Text) -> EditScript {
    let old = base.contents();
    let new = side.contents();

    let mut ops = Vec::new();
    let mut gap: Option<(Range<usize>, Range<usize>)> = None;
    for op in capture_diff_slices(Algorithm::Myers, &old, &new) {
        let (old_range, new_range) = (op.old_range(), op.new_range());
        if let DiffOp::Equal { .. } = op {
            if let Some((b, n)) = gap.take() {
                push_gap(&mut ops, side, b, n);
            }
            match ops.last_mut() {
                Some(EditOp::Equal(prev)) if prev.end == old_range.start => prev.end = old_range.end,
                _ => ops.push(EditOp::Equal(old_range)),
            }
        } else {
            gap = Some(match gap {
                Some((b, n)) => (b.start..old_range.end, n.start..new_range.end),
                None => (old_range, new_range),
            });
        }
    }
    if let Some((b, n)) = gap {
        push_gap(&mut ops, side, b, n);
    }

    EditScript { ops }
}

fn push_gap(ops: &mut Vec<EditOp>, side: &Text, base: Range<usize>, new: Range<usize>) {
    match (base.is_empty(), new.is_empty()) {
        (true, true) => {}
        (true, false) => ops.push(EditOp::Insert {
            at: base.start,
            lines: side.slice(new).to_vec(),
        }),
        (false, true) => ops.push(EditOp::Delete(base)),
        (false, false) => ops.push(EditOp::Replace {
            base,
            lines: side.slice(new).to_vec(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(lines: &[&str]) -> Text {
        Text::from_lines(lines.iter().copied())
    }

    #[test]
    fn test_identical() {
        let base = text(&["a", "b", "c"]);
        let script = diff_lines(&base, &base);
        assert_eq!(script.ops(), &[EditOp::Equal(0..3)]);
        assert!(script.is_identity());
    }

    #[test]
    fn test_both_empty() {
        let script = diff_lines(&Text::default(), &Text::default());
        assert!(script.ops().is_empty());
    }

    #[test]
    fn test_single_replace() {
        let base = text(&["A", "B", "C"]);
        let ours = text(&["A", "B2", "C"]);
        let script = diff_lines(&base, &ours);
        assert_eq!(
            script.ops(),
            &[
                EditOp::Equal(0..1),
                EditOp::Replace {
                    base: 1..2,
                    lines: text(&["B2"]).into_lines(),
                },
                EditOp::Equal(2..3),
            ]
        );
    }

    #[test]
    fn test_insert_and_delete() {
        let base = text(&["a", "b", "c", "d"]);
        let side = text(&["a", "x", "b", "d"]);
        let script = diff_lines(&base, &side);
        assert_eq!(
            script.ops(),
            &[
                EditOp::Equal(0..1),
                EditOp::Insert {
                    at: 1,
                    lines: text(&["x"]).into_lines(),
                },
                EditOp::Equal(1..2),
                EditOp::Delete(2..3),
                EditOp::Equal(3..4),
            ]
        );
        assert_eq!(
            script.stats(),
            DiffStats {
                insertions: 1,
                deletions: 1
            }
        );
    }

    #[test]
    fn test_from_and_to_empty() {
        let base = text(&["a", "b"]);
        let script = diff_lines(&base, &Text::default());
        assert_eq!(script.ops(), &[EditOp::Delete(0..2)]);

        let script = diff_lines(&Text::default(), &base);
        assert_eq!(
            script.ops(),
            &[EditOp::Insert {
                at: 0,
                lines: base.lines().to_vec(),
            }]
        );
    }

    #[test]
    fn test_apply_reconstructs_side() {
        let cases: &[(&[&str], &[&str])] = &[
            (&["a", "b", "c", "a", "b", "b", "a"], &["c", "b", "a", "b", "a", "c"]),
            (&["x"], &["y", "x", "y"]),
            (&["1", "2", "3", "4", "5"], &["0", "2", "4", "6"]),
            (&[], &["only"]),
            (&["same", "same", "same"], &["same"]),
        ];
        for (b, s) in cases {
            let base = text(b);
            let side = text(s);
            let script = diff_lines(&base, &side);
            assert_eq!(script.apply(&base), side, "base={:?} side={:?}", b, s);
        }
    }

    #[test]
    fn test_script_is_minimal() {
        // Classic Myers example: ABCABBA -> CBABAC has edit distance 5.
        let base = text(&["A", "B", "C", "A", "B", "B", "A"]);
        let side = text(&["C", "B", "A", "B", "A", "C"]);
        let stats = diff_lines(&base, &side).stats();
        assert_eq!(stats.insertions + stats.deletions, 5);
    }

    #[test]
    fn test_adjacent_changes_fold_into_replace() {
        let base = text(&["a", "b", "c", "d"]);
        let side = text(&["x", "y", "z", "d"]);
        assert_eq!(
            diff_lines(&base, &side).ops(),
            &[
                EditOp::Replace {
                    base: 0..3,
                    lines: text(&["x", "y", "z"]).into_lines(),
                },
                EditOp::Equal(3..4),
            ]
        );
    }

    #[test]
    fn test_repeated_diff_is_identical() {
        let base = text(&["a", "b", "a", "c", "b"]);
        let side = text(&["b", "a", "c", "a", "b", "x"]);
        assert_eq!(diff_lines(&base, &side), diff_lines(&base, &side));
    }

    #[test]
    fn test_ops_tile_base() {
        let base = text(&["a", "b", "c", "d", "e"]);
        let side = text(&["a", "B", "c", "e", "f"]);
        let script = diff_lines(&base, &side);
        let mut cursor = 0;
        for op in script.ops() {
            let r = op.base_range();
            assert_eq!(r.start, cursor);
            cursor = r.end;
        }
        assert_eq!(cursor, base.len());
    }

    #[test]
    fn test_equality_ignores_line_endings() {
        let base = Text::parse("a\r\nb\r\n");
        let side = Text::parse("a\nb\n");
        assert!(diff_lines(&base, &side).is_identity());
    }
}
