//! Line-oriented text with per-line terminators preserved.
//!
//! Diffing compares line content only; rendering reproduces each line exactly
//! as it was read, so a file with mixed `\n` / `\r\n` endings or a missing
//! final newline survives a round trip unchanged.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The terminator that ended a line in its source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    /// Final line of a file without a trailing newline.
    None,
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// A single line of text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Line {
    content: String,
    ending: LineEnding,
}

impl Line {
    pub fn new(content: impl Into<String>, ending: LineEnding) -> Self {
        Self {
            content: content.into(),
            ending,
        }
    }

    /// Line content without its terminator.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn ending(&self) -> LineEnding {
        self.ending
    }

    /// Content equality, ignoring the terminator.
    pub fn same_content(&self, other: &Line) -> bool {
        self.content == other.content
    }

    /// Copy of this line terminated with `ending`.
    pub fn with_ending(&self, ending: LineEnding) -> Self {
        Self {
            content: self.content.clone(),
            ending,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.content, self.ending.as_str())
    }
}

/// An ordered sequence of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    lines: Vec<Line>,
}

impl Text {
    /// Split `s` into lines, keeping each line's terminator.
    pub fn parse(s: &str) -> Self {
        let lines = s
            .split_inclusive('\n')
            .map(|piece| {
                if let Some(content) = piece.strip_suffix("\r\n") {
                    Line::new(content, LineEnding::CrLf)
                } else if let Some(content) = piece.strip_suffix('\n') {
                    Line::new(content, LineEnding::Lf)
                } else {
                    Line::new(piece, LineEnding::None)
                }
            })
            .collect();
        Self { lines }
    }

    /// Build a text where every line is `\n`-terminated.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|l| Line::new(l, LineEnding::Lf))
                .collect(),
        }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines in `range`, clamped to the text length.
    pub fn slice(&self, range: Range<usize>) -> &[Line] {
        let end = range.end.min(self.lines.len());
        let start = range.start.min(end);
        &self.lines[start..end]
    }

    /// Line contents without terminators.
    pub fn contents(&self) -> Vec<&str> {
        self.lines.iter().map(Line::content).collect()
    }

    /// SHA-256 of the rendered text, hex encoded.
    pub fn content_hash(&self) -> String {
        content_hash(&self.to_string())
    }

    pub fn into_lines(self) -> Vec<Line> {
        self.lines
    }
}

impl From<Vec<Line>> for Text {
    fn from(lines: Vec<Line>) -> Self {
        Self { lines }
    }
}

impl FromIterator<Line> for Text {
    fn from_iter<T: IntoIterator<Item = Line>>(iter: T) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            write!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// SHA-256 of `s`, hex encoded.
pub fn content_hash(s: &str) -> String {
    hex::encode(Sha256::digest(s.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_endings() {
        let src = "one\r\ntwo\nthree";
        let text = Text::parse(src);
        assert_eq!(text.len(), 3);
        assert_eq!(text.lines()[0].ending(), LineEnding::CrLf);
        assert_eq!(text.lines()[1].ending(), LineEnding::Lf);
        assert_eq!(text.lines()[2].ending(), LineEnding::None);
        assert_eq!(text.to_string(), src);
    }

    #[test]
    fn test_parse_empty() {
        let text = Text::parse("");
        assert!(text.is_empty());
        assert_eq!(text.to_string(), "");
    }

    #[test]
    fn test_same_content_ignores_ending() {
        let a = Line::new("x", LineEnding::Lf);
        let b = Line::new("x", LineEnding::CrLf);
        assert!(a.same_content(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_slice_is_clamped() {
        let text = Text::from_lines(["a", "b", "c"]);
        assert_eq!(text.slice(1..10).len(), 2);
        assert!(text.slice(5..7).is_empty());
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let a = Text::from_lines(["a"]);
        let b = Text::from_lines(["b"]);
        assert_eq!(a.content_hash(), Text::from_lines(["a"]).content_hash());
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }
}
