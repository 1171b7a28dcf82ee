//! Hand-written character-at-a-time lexer for the PICO-8 dialect.
//!
//! A `Lexer` walks the source with explicit line/column bookkeeping and
//! produces tokens directly as an exhaustive [`TokenKind`] rather than via a
//! string-keyed terminal map. It exposes a single `newline_significant` flag
//! so the parser can make newlines visible for the duration of a PICO-8
//! one-line `if`/`while` body.

pub mod token;

pub use token::{Token, TokenKind, TokenValue};

use crate::bounds::{Bounds, Position};
use crate::diagnostics::{ParseError, ParseErrorKind};

use token::is_keyword;

pub struct Lexer<'a> {
    source: &'a str,
    index: usize,
    line: usize,
    column: usize,
    newline_significant: bool,
    lookahead: Option<Token>,
    pub errors: Vec<ParseError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            index: 0,
            line: 1,
            column: 0,
            newline_significant: false,
            lookahead: None,
            errors: Vec::new(),
        }
    }

    pub fn set_newline_significant(&mut self, value: bool) {
        self.newline_significant = value;
    }

    pub fn newline_significant(&self) -> bool {
        self.newline_significant
    }

    /// Non-destructive lookahead of the next token.
    pub fn peek(&mut self) -> &Token {
        if self.lookahead.is_none() {
            let tok = self.lex_token();
            self.lookahead = Some(tok);
        }
        self.lookahead.as_ref().expect("just filled")
    }

    /// Consumes and returns the next token.
    pub fn next(&mut self) -> Token {
        if let Some(tok) = self.lookahead.take() {
            return tok;
        }
        self.lex_token()
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            index: self.index,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.index..]
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> char {
        let ch = self.rest().chars().next().expect("bump at end of input");
        self.index += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        ch
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_nth(0) {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.bump();
                }
                Some('\n') => {
                    if self.newline_significant {
                        break;
                    }
                    self.bump();
                }
                Some('-') if self.rest().starts_with("--") => {
                    self.bump();
                    self.bump();
                    if let Some(level) = self.long_bracket_open_level() {
                        let start = self.position();
                        let (_, terminated) = self.consume_long_bracket_body(level);
                        if !terminated {
                            let bounds = Bounds::new(start, self.position());
                            self.errors.push(ParseError::new(
                                ParseErrorKind::UnterminatedLongBracket,
                                "unterminated block comment",
                                bounds,
                            ));
                        }
                        continue;
                    }
                    while let Some(c) = self.peek_nth(0) {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn long_bracket_open_level(&self) -> Option<usize> {
        let mut chars = self.rest().chars();
        if chars.next() != Some('[') {
            return None;
        }
        let mut level = 0;
        for c in chars {
            match c {
                '=' => level += 1,
                '[' => return Some(level),
                _ => return None,
            }
        }
        None
    }

    fn long_bracket_close_level(&self) -> Option<usize> {
        let mut chars = self.rest().chars();
        if chars.next() != Some(']') {
            return None;
        }
        let mut level = 0;
        for c in chars {
            match c {
                '=' => level += 1,
                ']' => return Some(level),
                _ => return None,
            }
        }
        None
    }

    /// Consumes an opening `[=*[`, its body, and (if present) the matching
    /// `]=*]`. Returns the body text and whether a matching close was found.
    fn consume_long_bracket_body(&mut self, level: usize) -> (String, bool) {
        self.bump(); // '['
        for _ in 0..level {
            self.bump(); // '='
        }
        self.bump(); // '['

        let mut content = String::new();
        loop {
            if self.rest().is_empty() {
                return (content, false);
            }
            if self.peek_nth(0) == Some(']') {
                if let Some(close_level) = self.long_bracket_close_level() {
                    if close_level == level {
                        self.bump(); // ']'
                        for _ in 0..level {
                            self.bump();
                        }
                        self.bump(); // ']'
                        return (content, true);
                    }
                }
            }
            content.push(self.bump());
        }
    }

    fn read_short_string(&mut self, quote: char) -> Token {
        let start = self.position();
        self.bump(); // opening quote
        let mut value = String::new();
        let mut terminated = false;
        loop {
            match self.peek_nth(0) {
                None => break,
                Some('\n') => break,
                Some(c) if c == quote => {
                    self.bump();
                    terminated = true;
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.peek_nth(0) {
                        Some('n') => {
                            value.push('\n');
                            self.bump();
                        }
                        Some('r') => {
                            value.push('\r');
                            self.bump();
                        }
                        Some('t') => {
                            value.push('\t');
                            self.bump();
                        }
                        Some('\\') => {
                            value.push('\\');
                            self.bump();
                        }
                        Some('"') => {
                            value.push('"');
                            self.bump();
                        }
                        Some('\'') => {
                            value.push('\'');
                            self.bump();
                        }
                        Some('x') => {
                            self.bump();
                            let mut hex = String::new();
                            for _ in 0..2 {
                                if matches!(self.peek_nth(0), Some(c) if c.is_ascii_hexdigit()) {
                                    hex.push(self.bump());
                                }
                            }
                            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                                value.push(byte as char);
                            }
                        }
                        Some(c) if c.is_ascii_digit() => {
                            let mut digits = String::new();
                            for _ in 0..3 {
                                if matches!(self.peek_nth(0), Some(c) if c.is_ascii_digit()) {
                                    digits.push(self.bump());
                                } else {
                                    break;
                                }
                            }
                            if let Ok(n) = digits.parse::<u32>() {
                                if let Some(decoded) = char::from_u32(n) {
                                    value.push(decoded);
                                }
                            }
                        }
                        Some(other) => {
                            value.push(other);
                            self.bump();
                        }
                        None => {}
                    }
                }
                Some(_) => {
                    value.push(self.bump());
                }
            }
        }
        let end = self.position();
        let bounds = Bounds::new(start, end);
        if !terminated {
            self.errors.push(ParseError::new(
                ParseErrorKind::UnterminatedString,
                "unterminated string literal",
                bounds,
            ));
        }
        Token {
            kind: TokenKind::StringLiteral,
            text: self.source[start.index..end.index].to_string(),
            value: TokenValue::Str(value),
            bounds,
        }
    }

    fn read_long_string(&mut self, level: usize) -> Token {
        let start = self.position();
        let (content, terminated) = self.consume_long_bracket_body(level);
        let end = self.position();
        let bounds = Bounds::new(start, end);
        if !terminated {
            self.errors.push(ParseError::new(
                ParseErrorKind::UnterminatedLongBracket,
                "unterminated long-bracket string",
                bounds,
            ));
        }
        Token {
            kind: TokenKind::StringLiteral,
            text: self.source[start.index..end.index].to_string(),
            value: TokenValue::Str(content),
            bounds,
        }
    }

    fn finish_number(&mut self, start: Position, value: f64) -> Token {
        let end = self.position();
        let bounds = Bounds::new(start, end);
        Token {
            kind: TokenKind::NumericLiteral,
            text: self.source[start.index..end.index].to_string(),
            value: TokenValue::Number(value),
            bounds,
        }
    }

    fn read_decimal_number(&mut self, start: Position) -> Token {
        let mut lexeme = String::new();
        while matches!(self.peek_nth(0), Some(c) if c.is_ascii_digit()) {
            lexeme.push(self.bump());
        }
        if self.peek_nth(0) == Some('.') && matches!(self.peek_nth(1), Some(c) if c.is_ascii_digit())
        {
            lexeme.push(self.bump());
            while matches!(self.peek_nth(0), Some(c) if c.is_ascii_digit()) {
                lexeme.push(self.bump());
            }
        }
        if matches!(self.peek_nth(0), Some('e') | Some('E')) {
            let mut ahead = 1;
            if matches!(self.peek_nth(1), Some('+') | Some('-')) {
                ahead = 2;
            }
            if matches!(self.peek_nth(ahead), Some(c) if c.is_ascii_digit()) {
                lexeme.push(self.bump());
                if ahead == 2 {
                    lexeme.push(self.bump());
                }
                while matches!(self.peek_nth(0), Some(c) if c.is_ascii_digit()) {
                    lexeme.push(self.bump());
                }
            }
        }
        let value: f64 = lexeme.parse().unwrap_or(f64::NAN);
        self.finish_number(start, value)
    }

    fn read_hex_number(&mut self, start: Position) -> Token {
        let mut int_digits = String::new();
        while matches!(self.peek_nth(0), Some(c) if c.is_ascii_hexdigit()) {
            int_digits.push(self.bump());
        }
        let mut frac_digits = String::new();
        if self.peek_nth(0) == Some('.')
            && matches!(self.peek_nth(1), Some(c) if c.is_ascii_hexdigit())
        {
            self.bump();
            while matches!(self.peek_nth(0), Some(c) if c.is_ascii_hexdigit()) {
                frac_digits.push(self.bump());
            }
        }
        let mut exponent: i32 = 0;
        if matches!(self.peek_nth(0), Some('p') | Some('P')) {
            let mut ahead = 1;
            if matches!(self.peek_nth(1), Some('+') | Some('-')) {
                ahead = 2;
            }
            if matches!(self.peek_nth(ahead), Some(c) if c.is_ascii_digit()) {
                self.bump(); // p/P
                let mut sign = 1i32;
                if ahead == 2 {
                    if self.bump() == '-' {
                        sign = -1;
                    }
                }
                let mut digits = String::new();
                while matches!(self.peek_nth(0), Some(c) if c.is_ascii_digit()) {
                    digits.push(self.bump());
                }
                exponent = sign * digits.parse::<i32>().unwrap_or(0);
            }
        }
        if int_digits.is_empty() && frac_digits.is_empty() {
            let bounds = Bounds::new(start, self.position());
            self.errors.push(ParseError::new(
                ParseErrorKind::UnexpectedCharacter,
                "hexadecimal literal requires at least one digit",
                bounds,
            ));
            return self.finish_number(start, 0.0);
        }
        let mut value = 0.0f64;
        for c in int_digits.chars() {
            value = value * 16.0 + c.to_digit(16).unwrap() as f64;
        }
        let mut scale = 1.0 / 16.0;
        for c in frac_digits.chars() {
            value += c.to_digit(16).unwrap() as f64 * scale;
            scale /= 16.0;
        }
        value *= 2f64.powi(exponent);
        self.finish_number(start, value)
    }

    fn read_binary_number(&mut self, start: Position) -> Token {
        let mut int_digits = String::new();
        while matches!(self.peek_nth(0), Some('0') | Some('1')) {
            int_digits.push(self.bump());
        }
        let mut frac_digits = String::new();
        if self.peek_nth(0) == Some('.') && matches!(self.peek_nth(1), Some('0') | Some('1')) {
            self.bump();
            while matches!(self.peek_nth(0), Some('0') | Some('1')) {
                frac_digits.push(self.bump());
            }
        }
        if int_digits.is_empty() && frac_digits.is_empty() {
            let bounds = Bounds::new(start, self.position());
            self.errors.push(ParseError::new(
                ParseErrorKind::UnexpectedCharacter,
                "binary literal requires at least one digit",
                bounds,
            ));
            return self.finish_number(start, 0.0);
        }
        let mut value = 0.0f64;
        for c in int_digits.chars() {
            value = value * 2.0 + c.to_digit(2).unwrap() as f64;
        }
        let mut scale = 0.5;
        for c in frac_digits.chars() {
            value += c.to_digit(2).unwrap() as f64 * scale;
            scale /= 2.0;
        }
        self.finish_number(start, value)
    }

    fn read_number(&mut self) -> Token {
        let start = self.position();
        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.bump();
            self.bump();
            return self.read_hex_number(start);
        }
        if self.rest().starts_with("0b") || self.rest().starts_with("0B") {
            self.bump();
            self.bump();
            return self.read_binary_number(start);
        }
        self.read_decimal_number(start)
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.position();
        let mut text = String::new();
        while let Some(c) = self.peek_nth(0) {
            if c.is_alphanumeric() || c == '_' {
                text.push(self.bump());
            } else {
                break;
            }
        }
        let end = self.position();
        let kind = if is_keyword(&text) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Token {
            kind,
            text,
            value: TokenValue::None,
            bounds: Bounds::new(start, end),
        }
    }

    fn read_punctuator(&mut self) -> Token {
        let start = self.position();
        let rest = self.rest();
        for candidate in token::PUNCTUATORS {
            if rest.starts_with(candidate) {
                for _ in 0..candidate.chars().count() {
                    self.bump();
                }
                return Token {
                    kind: TokenKind::Punctuator,
                    text: (*candidate).to_string(),
                    value: TokenValue::None,
                    bounds: Bounds::new(start, self.position()),
                };
            }
        }
        let bad = self.bump();
        let bounds = Bounds::new(start, self.position());
        self.errors.push(ParseError::new(
            ParseErrorKind::UnexpectedCharacter,
            format!("unexpected character '{bad}'"),
            bounds,
        ));
        Token {
            kind: TokenKind::Punctuator,
            text: bad.to_string(),
            value: TokenValue::None,
            bounds,
        }
    }

    /// Consumes raw source text up to (but not including) the next newline
    /// or end of input, without tokenizing it. Used by the parser for
    /// PICO-8's `#include`, whose argument is a bare filename rather than a
    /// string or expression.
    pub fn consume_rest_of_line(&mut self) -> (String, Bounds) {
        let start = self.position();
        let mut text = String::new();
        while let Some(c) = self.peek_nth(0) {
            if c == '\n' {
                break;
            }
            text.push(self.bump());
        }
        let end = self.position();
        (text.trim().to_string(), Bounds::new(start, end))
    }

    fn lex_token(&mut self) -> Token {
        self.skip_trivia();
        let start = self.position();
        match self.peek_nth(0) {
            None => Token {
                kind: TokenKind::Eof,
                text: String::new(),
                value: TokenValue::None,
                bounds: Bounds::point(start),
            },
            Some('\n') => {
                self.bump();
                Token {
                    kind: TokenKind::Newline,
                    text: "\n".to_string(),
                    value: TokenValue::None,
                    bounds: Bounds::new(start, self.position()),
                }
            }
            Some(q @ '"') | Some(q @ '\'') => self.read_short_string(q),
            Some('[') if self.long_bracket_open_level().is_some() => {
                let level = self.long_bracket_open_level().unwrap();
                self.read_long_string(level)
            }
            Some(c) if c.is_ascii_digit() => self.read_number(),
            Some('.') if matches!(self.peek_nth(1), Some(c) if c.is_ascii_digit()) => {
                self.read_number()
            }
            Some(c) if c.is_alphabetic() || c == '_' => self.read_identifier(),
            Some(_) => self.read_punctuator(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next();
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        tokens
    }

    #[test]
    fn lexes_identifiers_and_keywords() {
        let tokens = lex_all("local x = foo");
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[0].text, "local");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text, "x");
        assert_eq!(tokens[2].kind, TokenKind::Punctuator);
        assert_eq!(tokens[2].text, "=");
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
        assert_eq!(tokens[3].text, "foo");
    }

    #[test]
    fn decimal_hex_and_binary_numbers_agree() {
        let decimal = lex_all("1.5");
        let hex = lex_all("0x1.8");
        let binary = lex_all("0b1.1");
        assert_eq!(decimal[0].number_value(), 1.5);
        assert_eq!(hex[0].number_value(), 1.5);
        assert_eq!(binary[0].number_value(), 1.5);
    }

    #[test]
    fn scientific_notation() {
        let tokens = lex_all("1e-3");
        assert!((tokens[0].number_value() - 0.001).abs() < 1e-12);
    }

    #[test]
    fn binary_literal() {
        let tokens = lex_all("0b1010");
        assert_eq!(tokens[0].number_value(), 10.0);
    }

    #[test]
    fn short_string_escapes() {
        let tokens = lex_all(r#""a\nb\x41\065""#);
        assert_eq!(tokens[0].string_value(), "a\nbAA");
    }

    #[test]
    fn long_bracket_requires_exact_level() {
        let tokens = lex_all("[==[ hi ]=] still ]==]");
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].string_value(), " hi ]=] still ");
    }

    #[test]
    fn long_bracket_unterminated_sets_error() {
        let mut lexer = Lexer::new("[=[ hi");
        let tok = lexer.next();
        assert_eq!(tok.kind, TokenKind::StringLiteral);
        assert_eq!(lexer.errors.len(), 1);
        assert_eq!(
            lexer.errors[0].kind,
            ParseErrorKind::UnterminatedLongBracket
        );
    }

    #[test]
    fn line_and_block_comments_are_skipped() {
        let tokens = lex_all("-- comment\nlocal --[[ block ]] x");
        assert_eq!(tokens[0].kind, TokenKind::Newline);
        assert_eq!(tokens[1].text, "local");
        assert_eq!(tokens[2].text, "x");
    }

    #[test]
    fn newline_is_whitespace_unless_significant() {
        let mut lexer = Lexer::new("a\nb");
        assert_eq!(lexer.next().text, "a");
        assert_eq!(lexer.next().text, "b");

        let mut sensitive = Lexer::new("a\nb");
        sensitive.set_newline_significant(true);
        assert_eq!(sensitive.next().text, "a");
        assert_eq!(sensitive.next().kind, TokenKind::Newline);
        assert_eq!(sensitive.next().text, "b");
    }

    #[test]
    fn longest_match_compound_assignment() {
        let tokens = lex_all("a >>>= b");
        assert_eq!(tokens[1].text, ">>>=");
    }
}
