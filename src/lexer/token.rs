use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Keyword,
    Identifier,
    NumericLiteral,
    StringLiteral,
    Punctuator,
    Newline,
    Eof,
}

/// The decoded value carried by literal tokens, beyond their raw source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenValue {
    None,
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// The exact source text of the token (before escape decoding).
    pub text: String,
    pub value: TokenValue,
    pub bounds: Bounds,
}

impl Token {
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.is(TokenKind::Keyword, word)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.is(TokenKind::Punctuator, punct)
    }

    pub fn number_value(&self) -> f64 {
        match &self.value {
            TokenValue::Number(n) => *n,
            _ => 0.0,
        }
    }

    pub fn string_value(&self) -> String {
        match &self.value {
            TokenValue::Str(s) => s.clone(),
            _ => String::new(),
        }
    }
}

pub const KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Built once per process and shared read-only across however many `parse`
/// calls run concurrently on separate threads.
static KEYWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| KEYWORDS.iter().copied().collect());

pub fn is_keyword(word: &str) -> bool {
    KEYWORD_SET.contains(word)
}

/// Punctuators the lexer recognizes, longest first so that a straightforward
/// linear scan implements "prefer the longest match" without backtracking.
pub const PUNCTUATORS: &[&str] = &[
    // length 4
    ">>>=", "<<>=", ">><=",
    // length 3
    ">>>", "<<>", ">><", "...", "..=", "^^=",
    // length 2
    "==", "~=", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "\\=", "%=", "^=", "&=", "|=", "^^",
    "<<", ">>", "..", "::",
    // length 1
    "+", "-", "*", "/", "\\", "%", "^", "#", "&", "|", "~", "<", ">", "=", "(", ")", "{", "}",
    "[", "]", ";", ":", ",", ".", "@", "$",
];
