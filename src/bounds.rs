//! Source position and range tracking shared by every stage of the pipeline.

use serde::{Deserialize, Serialize};

/// A single point in the source text.
///
/// `line` is 1-indexed, `column` is 0-indexed (counted in `char`s since the
/// last newline), and `index` is the 0-indexed byte offset into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub index: usize,
}

impl Position {
    pub const fn start() -> Self {
        Position {
            line: 1,
            column: 0,
            index: 0,
        }
    }
}

/// A half-open source range, attached to every token, AST node, error, and
/// warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub start: Position,
    pub end: Position,
}

impl Bounds {
    pub fn new(start: Position, end: Position) -> Self {
        Bounds { start, end }
    }

    /// A zero-width bounds at a single position. Used only for recovered
    /// nodes that must carry *some* bounds; never returned for real tokens.
    pub fn point(pos: Position) -> Self {
        Bounds {
            start: pos,
            end: pos,
        }
    }

    /// The smallest bounds that contains both `self` and `other`.
    pub fn merge(&self, other: &Bounds) -> Bounds {
        let start = if self.start.index <= other.start.index {
            self.start
        } else {
            other.start
        };
        let end = if self.end.index >= other.end.index {
            self.end
        } else {
            other.end
        };
        Bounds { start, end }
    }

    pub fn contains(&self, other: &Bounds) -> bool {
        self.start.index <= other.start.index && other.end.index <= self.end.index
    }

    pub fn contains_position(&self, line: usize, column: usize) -> bool {
        let before_end = line < self.end.line || (line == self.end.line && column <= self.end.column);
        let after_start =
            line > self.start.line || (line == self.start.line && column >= self.start.column);
        after_start && before_end
    }
}
