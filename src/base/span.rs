//! Byte-offset ranges and line/column conversion.
//!
//! `TextRange`/`TextSize` are re-exported from `rowan` (which itself
//! re-exports `text-size`) so error sites can be reported as byte offsets
//! without this crate depending on `text-size` directly. [`LineIndex`]
//! converts a byte offset back to a 1-based `LineCol` for human-readable
//! diagnostics.

pub use rowan::{TextRange, TextSize};

/// A 1-based line/column pair, as printed in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

/// Maps byte offsets into a source string to [`LineCol`] positions.
///
/// Built once per parsed file; offsets of every `\n` are recorded so a
/// lookup is a binary search rather than a linear scan.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line (line 0 starts at offset 0).
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 1-based line/column pair.
    pub fn line_col(&self, offset: TextSize) -> LineCol {
        let offset: u32 = offset.into();
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        LineCol {
            line: line as u32 + 1,
            col: offset.saturating_sub(line_start) + 1,
        }
    }
}
