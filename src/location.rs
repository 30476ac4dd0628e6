// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::fmt::{self, Display};

/// A position or range within the pattern text, measured in characters.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Location {
    pub index: usize,  // The character index in the text
    pub line: usize,   // The line number (0-based index)
    pub column: usize, // The column number (0-based index)
    pub length: usize, // The length of the text range; 0 for a single position
}

impl Location {
    /// Create a new `Location` representing a single position.
    pub fn new_position(index: usize, line: usize, column: usize) -> Self {
        Self {
            index,
            line,
            column,
            length: 0,
        }
    }

    /// Create a new `Location` representing a range of text.
    pub fn new_range(index: usize, line: usize, column: usize, length: usize) -> Self {
        Self {
            index,
            line,
            column,
            length,
        }
    }

    /// Create a range `Location` from a starting position and a length.
    pub fn from_position_and_length(position: &Location, length: usize) -> Self {
        Self::new_range(position.index, position.line, position.column, length)
    }

    /// Create a range `Location` from a start position and an exclusive
    /// end position.
    pub fn from_position_pair(position_start: &Location, position_end: &Location) -> Self {
        Self::new_range(
            position_start.index,
            position_start.line,
            position_start.column,
            position_end.index - position_start.index,
        )
    }

    /// Combine two ranges into a single range `Location` covering both.
    pub fn from_range_pair(range_start: &Location, range_end: &Location) -> Self {
        Self::new_range(
            range_start.index,
            range_start.line,
            range_start.column,
            range_end.index - range_start.index + range_end.length,
        )
    }

    /// The character index one past the end of the range.
    pub fn end_index(&self) -> usize {
        self.index + self.length
    }
}

/// Where a pattern sits inside the enclosing document, e.g. the file,
/// line, and column of the opening `m` of an `m/.../` literal. Line and
/// column are 1-based here, following the convention of compiler
/// diagnostics rather than the 0-based in-pattern `Location`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Origin {
    pub file: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl Origin {
    pub fn new(file: Option<String>, line: usize, column: usize) -> Self {
        Self { file, line, column }
    }

    /// The anchor moved forward to a span inside the anchored text. On
    /// the anchor's own line the columns add up; a later line starts its
    /// own column count.
    pub fn resolve(&self, span: Location) -> Origin {
        let column = if span.line == 0 {
            self.column + span.column
        } else {
            span.column + 1
        };
        Origin::new(self.file.clone(), self.line + span.line, column)
    }
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            file: None,
            line: 1,
            column: 1,
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.column),
            None => write!(f, "line {}, column {}", self.line, self.column),
        }
    }
}
