//! diff3-style inline conflict markers.
//!
//! Parsing is strict: inside a block the four delimiters must appear in the
//! order start, base, separator, end. A separator or end marker seen outside
//! any block is ordinary content.

use regex_lite::Regex;
use tracing::debug;

use crate::config::LabelConfig;
use crate::conflict::merger::{append, MergeApplier};
use crate::conflict::region::{ConflictSet, Span};
use crate::errors::StageError;
use crate::models::{Side, StageSource};
use crate::stage::StageTexts;
use crate::text::{Line, LineEnding, Text};

/// One `<<<<<<<` .. `>>>>>>>` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerBlock {
    /// 1-based line of the start marker.
    pub start_line: usize,
    /// 1-based line of the end marker.
    pub end_line: usize,
    pub ours_label: Option<String>,
    pub base_label: Option<String>,
    pub theirs_label: Option<String>,
    pub ours: Vec<Line>,
    pub base: Vec<Line>,
    pub theirs: Vec<Line>,
}

/// A marked file split into shared content and conflict blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Common(Vec<Line>),
    Block(MarkerBlock),
}

/// Compiled marker patterns for one marker size.
struct MarkerSyntax {
    start: Regex,
    base: Regex,
    separator: Regex,
    end: Regex,
}

enum MarkerKind {
    Start(Option<String>),
    Base(Option<String>),
    Separator,
    End(Option<String>),
}

impl MarkerSyntax {
    fn new(size: usize) -> Result<Self, StageError> {
        let labelled = |ch: &str| -> Result<Regex, StageError> {
            Regex::new(&format!(r"^{ch}{{{size}}}(?:[ \t](.*))?$")).map_err(|e| {
                StageError::MalformedMarkers {
                    line: 0,
                    detail: format!("invalid marker pattern: {e}"),
                }
            })
        };
        Ok(Self {
            start: labelled("<")?,
            base: labelled(r"\|")?,
            separator: labelled("=")?,
            end: labelled(">")?,
        })
    }

    fn classify(&self, content: &str) -> Option<MarkerKind> {
        let label = |re: &Regex| {
            re.captures(content).map(|c| {
                c.get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty())
            })
        };
        if let Some(l) = label(&self.start) {
            return Some(MarkerKind::Start(l));
        }
        if let Some(l) = label(&self.base) {
            return Some(MarkerKind::Base(l));
        }
        if self.separator.is_match(content) {
            return Some(MarkerKind::Separator);
        }
        label(&self.end).map(MarkerKind::End)
    }
}

enum State {
    Outside,
    Ours(MarkerBlock),
    Base(MarkerBlock),
    Theirs(MarkerBlock),
}

fn malformed(line: usize, detail: &str) -> StageError {
    StageError::MalformedMarkers {
        line,
        detail: detail.to_string(),
    }
}

/// Split `text` into common content and marker blocks.
pub fn parse_marker_blocks(text: &Text, marker_size: usize) -> Result<Vec<Segment>, StageError> {
    let syntax = MarkerSyntax::new(marker_size)?;
    let mut segments = Vec::new();
    let mut common: Vec<Line> = Vec::new();
    let mut state = State::Outside;

    for (idx, line) in text.lines().iter().enumerate() {
        let lineno = idx + 1;
        let marker = syntax.classify(line.content());
        state = match (state, marker) {
            (State::Outside, Some(MarkerKind::Start(label))) => {
                if !common.is_empty() {
                    segments.push(Segment::Common(std::mem::take(&mut common)));
                }
                State::Ours(MarkerBlock {
                    start_line: lineno,
                    end_line: lineno,
                    ours_label: label,
                    base_label: None,
                    theirs_label: None,
                    ours: Vec::new(),
                    base: Vec::new(),
                    theirs: Vec::new(),
                })
            }
            (State::Outside, _) => {
                common.push(line.clone());
                State::Outside
            }

            (_, Some(MarkerKind::Start(_))) => {
                return Err(malformed(lineno, "nested conflict start marker"))
            }

            (State::Ours(mut block), Some(MarkerKind::Base(label))) => {
                block.base_label = label;
                State::Base(block)
            }
            (State::Ours(_), Some(MarkerKind::Separator)) => {
                return Err(malformed(lineno, "missing base section (diff3 style required)"))
            }
            (State::Ours(_), Some(MarkerKind::End(_))) => {
                return Err(malformed(lineno, "end marker before base and separator"))
            }
            (State::Ours(mut block), None) => {
                block.ours.push(line.clone());
                State::Ours(block)
            }

            (State::Base(block), Some(MarkerKind::Separator)) => State::Theirs(block),
            (State::Base(_), Some(MarkerKind::Base(_))) => {
                return Err(malformed(lineno, "duplicate base marker"))
            }
            (State::Base(_), Some(MarkerKind::End(_))) => {
                return Err(malformed(lineno, "end marker before separator"))
            }
            (State::Base(mut block), None) => {
                block.base.push(line.clone());
                State::Base(block)
            }

            (State::Theirs(mut block), Some(MarkerKind::End(label))) => {
                block.theirs_label = label;
                block.end_line = lineno;
                segments.push(Segment::Block(block));
                State::Outside
            }
            (State::Theirs(_), Some(MarkerKind::Base(_))) => {
                return Err(malformed(lineno, "base marker after separator"))
            }
            (State::Theirs(_), Some(MarkerKind::Separator)) => {
                return Err(malformed(lineno, "duplicate separator"))
            }
            (State::Theirs(mut block), None) => {
                block.theirs.push(line.clone());
                State::Theirs(block)
            }
        };
    }

    match state {
        State::Outside => {}
        State::Ours(block) | State::Base(block) | State::Theirs(block) => {
            return Err(malformed(block.start_line, "unterminated conflict block"));
        }
    }
    if !common.is_empty() {
        segments.push(Segment::Common(common));
    }
    Ok(segments)
}

/// Rebuild whole-file Base/Ours/Theirs texts from a marked working file.
///
/// Returns `Ok(None)` when the file contains no marker blocks.
pub fn reconstruct_stages(text: &Text, marker_size: usize) -> Result<Option<StageTexts>, StageError> {
    let segments = parse_marker_blocks(text, marker_size)?;
    let blocks = segments
        .iter()
        .filter(|s| matches!(s, Segment::Block(_)))
        .count();
    if blocks == 0 {
        return Ok(None);
    }

    let (mut base, mut ours, mut theirs) = (Vec::new(), Vec::new(), Vec::new());
    for segment in &segments {
        match segment {
            Segment::Common(lines) => {
                base.extend_from_slice(lines);
                ours.extend_from_slice(lines);
                theirs.extend_from_slice(lines);
            }
            Segment::Block(block) => {
                base.extend_from_slice(&block.base);
                ours.extend_from_slice(&block.ours);
                theirs.extend_from_slice(&block.theirs);
            }
        }
    }
    debug!(blocks, "reconstructed stages from conflict markers");
    Ok(Some(StageTexts {
        base: Text::from(base),
        ours: Text::from(ours),
        theirs: Text::from(theirs),
        source: StageSource::Markers,
    }))
}

/// Render `set` back to a marked file: decided regions are merged in place,
/// pending regions become diff3 marker blocks.
pub fn render_with_markers(set: &ConflictSet, labels: &LabelConfig, marker_size: usize) -> Text {
    let ending = set
        .base()
        .lines()
        .first()
        .or_else(|| set.ours().lines().first())
        .map(Line::ending)
        .filter(|e| *e != LineEnding::None)
        .unwrap_or(LineEnding::Lf);
    let marker = |ch: char, label: &str| {
        let mut s = ch.to_string().repeat(marker_size);
        if !label.is_empty() {
            s.push(' ');
            s.push_str(label);
        }
        Line::new(s, ending)
    };

    let mut out: Vec<Line> = Vec::new();
    for span in set.spans() {
        match span {
            Span::Unchanged(range) => append(&mut out, set.base().slice(range)),
            Span::Region(region) if region.is_resolved() => {
                append(&mut out, &MergeApplier::region_lines(region, set.base()))
            }
            Span::Region(region) => {
                let base_lines = set.base().slice(region.base_range());
                let side = |s: Side| region.edit(s).unwrap_or(base_lines);
                append(&mut out, &[marker('<', &labels.ours)]);
                append(&mut out, side(Side::Ours));
                append(&mut out, &[marker('|', &labels.base)]);
                append(&mut out, base_lines);
                append(&mut out, &[marker('=', "")]);
                append(&mut out, side(Side::Theirs));
                append(&mut out, &[marker('>', &labels.theirs)]);
            }
        }
    }
    Text::from(out)
}
