// Storyline - Script Execution Story Builder
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Byte spans and line/column lookup.

use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, end)` into the original source text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Offset of the first byte.
    pub start: usize,
    /// Offset one past the last byte.
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length of the span in bytes.
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span is empty.
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The smallest span covering both spans.
    pub fn to(self, other: Self) -> Self {
        Self { start: self.start.min(other.start), end: self.end.max(other.end) }
    }

    /// Slices the covered text out of `source`.
    pub fn text(self, source: &str) -> &str {
        &source[self.start..self.end]
    }
}

/// Maps byte offsets to 1-based lines and 0-based columns.
///
/// Columns count UTF-16 code units, the unit script engines report
/// positions in.
#[derive(Clone, Debug)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    /// Offsets of non-ASCII characters with how many more bytes than UTF-16
    /// units each one takes.
    wide_chars: Vec<(usize, u32)>,
}

impl LineIndex {
    /// Indexes the line starts of `source`.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        let mut wide_chars = vec![];
        let mut chars = source.char_indices().peekable();
        while let Some((offset, c)) = chars.next() {
            match c {
                '\n' => line_starts.push(offset + 1),
                '\r' => {
                    if chars.peek().map(|&(_, next)| next) != Some('\n') {
                        line_starts.push(offset + 1);
                    }
                }
                c if !c.is_ascii() => {
                    wide_chars.push((offset, (c.len_utf8() - c.len_utf16()) as u32));
                }
                _ => {}
            }
        }
        Self { line_starts, wide_chars }
    }

    /// 1-based line of `offset`.
    pub fn line(&self, offset: usize) -> u32 {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        (line + 1) as u32
    }

    /// 1-based line and 0-based column (in UTF-16 units) of `offset`.
    pub fn line_col(&self, offset: usize) -> (u32, u32) {
        let line = self.line(offset);
        let start = self.line_starts[line as usize - 1];
        let first = self.wide_chars.partition_point(|&(at, _)| at < start);
        let extra: u32 = self.wide_chars[first..]
            .iter()
            .take_while(|&&(at, _)| at < offset)
            .map(|&(_, extra)| extra)
            .sum();
        (line, (offset - start) as u32 - extra)
    }
}
