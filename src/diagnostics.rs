//! Shared error/warning shapes produced by the lexer, parser, and resolver.
//!
//! Kept deliberately light — `Bounds` does not carry a copy of the source
//! text, so `Display` here only renders the message and position. The
//! colored source-excerpt rendering used by the CLI binary lives in
//! [`ParseError::render`] / [`Warning::render`], which take the source text
//! as an argument instead.

use std::fmt;

use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseErrorKind {
    UnexpectedCharacter,
    UnterminatedString,
    UnterminatedLongBracket,
    UnexpectedToken,
    MalformedStatement,
    InvalidAssignmentTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub bounds: Bounds,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, bounds: Bounds) -> Self {
        ParseError {
            kind,
            message: message.into(),
            bounds,
        }
    }

    /// Colored, multi-line rendering with the offending source excerpt.
    pub fn render(&self, source: &str) -> String {
        render_with_excerpt(source, &self.bounds, &self.message, true)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.bounds.start.line, self.bounds.start.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    UndefinedIdentifier,
    UnusedLocal,
    Shadowing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    pub bounds: Bounds,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>, bounds: Bounds) -> Self {
        Warning {
            kind,
            message: message.into(),
            bounds,
        }
    }

    pub fn render(&self, source: &str) -> String {
        render_with_excerpt(source, &self.bounds, &self.message, false)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.bounds.start.line, self.bounds.start.column, self.message
        )
    }
}

fn render_with_excerpt(source: &str, bounds: &Bounds, message: &str, is_error: bool) -> String {
    let line_no = bounds.start.line;
    let line_text = source.lines().nth(line_no.saturating_sub(1)).unwrap_or("");
    let marker = " ".repeat(bounds.start.column) + "^";
    let header = if is_error {
        format!("error: {message}").red().bold().to_string()
    } else {
        format!("warning: {message}").yellow().bold().to_string()
    };
    format!(
        "{header}\n  --> {line_no}:{col}\n   |\n{line_no:>3}| {line_text}\n   | {marker}",
        col = bounds.start.column + 1,
        marker = marker.red(),
    )
}
