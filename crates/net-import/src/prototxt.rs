// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Protobuf text-format parsing.
//!
//! Parses the subset of the text format that network descriptions use into
//! a schema-less [`TextMessage`] tree:
//!
//! ```text
//! name: "LeNet"            # scalar field, quoted string
//! input_dim: 1             # repeated scalar field
//! layer {                  # nested message (the colon is optional)
//!   type: "Pooling"
//!   pooling_param { pool: MAX kernel_size: 2 }
//! }
//! dim: [1, 3, 224, 224]    # list shorthand for a repeated field
//! ```
//!
//! Field lookups are typed at access time. For singular fields the last
//! occurrence wins, matching protobuf merge semantics.

use crate::ImportError;

/// A scalar token as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// A numeric literal, kept verbatim until a typed accessor parses it.
    Number(String),
    /// A quoted string with escapes resolved.
    Str(String),
    /// A bare identifier: an enum value, `true`/`false`, `inf`, `nan`.
    Ident(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextValue {
    Scalar(Scalar),
    Message(TextMessage),
}

/// An untyped protobuf message: fields in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextMessage {
    fields: Vec<(String, TextValue)>,
}

impl TextMessage {
    /// Parses a whole document.
    pub fn parse(source: &str) -> Result<Self, ImportError> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        let message = parser.message(false)?;
        Ok(message)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if the field occurs at least once.
    pub fn has(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// All values of a (repeated) field, in order.
    pub fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a TextValue> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v)
    }

    fn last(&self, key: &str) -> Option<&TextValue> {
        self.fields.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// All nested messages of a repeated message field.
    pub fn messages<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a TextMessage> + 'a {
        self.all(key).filter_map(|v| match v {
            TextValue::Message(m) => Some(m),
            TextValue::Scalar(_) => None,
        })
    }

    /// The last nested message of a singular message field.
    pub fn message(&self, key: &str) -> Option<&TextMessage> {
        self.fields.iter().rev().find_map(|(k, v)| match v {
            TextValue::Message(m) if k == key => Some(m),
            _ => None,
        })
    }

    /// A string field; bare identifiers are accepted as well.
    pub fn string(&self, key: &str) -> Result<Option<String>, ImportError> {
        self.last(key).map(|v| scalar_text(key, v)).transpose()
    }

    /// All values of a repeated string field.
    pub fn strings(&self, key: &str) -> Result<Vec<String>, ImportError> {
        self.all(key).map(|v| scalar_text(key, v)).collect()
    }

    /// A non-negative integer field.
    pub fn uint(&self, key: &str) -> Result<Option<usize>, ImportError> {
        self.last(key).map(|v| parse_uint(key, v)).transpose()
    }

    /// All values of a repeated non-negative integer field.
    pub fn uints(&self, key: &str) -> Result<Vec<usize>, ImportError> {
        self.all(key).map(|v| parse_uint(key, v)).collect()
    }

    /// A floating-point field.
    pub fn float(&self, key: &str) -> Result<Option<f32>, ImportError> {
        self.last(key).map(|v| parse_float(key, v)).transpose()
    }

    /// All values of a repeated floating-point field.
    pub fn floats(&self, key: &str) -> Result<Vec<f32>, ImportError> {
        self.all(key).map(|v| parse_float(key, v)).collect()
    }

    /// A boolean field (`true`/`false`, or `1`/`0`).
    pub fn boolean(&self, key: &str) -> Result<Option<bool>, ImportError> {
        self.last(key)
            .map(|v| match v {
                TextValue::Scalar(Scalar::Ident(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
                TextValue::Scalar(Scalar::Ident(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
                TextValue::Scalar(Scalar::Number(n)) if n == "1" => Ok(true),
                TextValue::Scalar(Scalar::Number(n)) if n == "0" => Ok(false),
                other => Err(field_error(key, format!("expected a boolean, got {other:?}"))),
            })
            .transpose()
    }
}

fn field_error(key: &str, detail: impl Into<String>) -> ImportError {
    ImportError::Field {
        field: key.to_string(),
        detail: detail.into(),
    }
}

fn scalar_text(key: &str, v: &TextValue) -> Result<String, ImportError> {
    match v {
        TextValue::Scalar(Scalar::Str(s)) | TextValue::Scalar(Scalar::Ident(s)) => Ok(s.clone()),
        other => Err(field_error(key, format!("expected a string, got {other:?}"))),
    }
}

fn parse_uint(key: &str, v: &TextValue) -> Result<usize, ImportError> {
    match v {
        TextValue::Scalar(Scalar::Number(n)) => n
            .parse::<usize>()
            .map_err(|_| field_error(key, format!("expected a non-negative integer, got '{n}'"))),
        other => Err(field_error(key, format!("expected an integer, got {other:?}"))),
    }
}

fn parse_float(key: &str, v: &TextValue) -> Result<f32, ImportError> {
    match v {
        TextValue::Scalar(Scalar::Number(n)) => n
            .trim_end_matches(['f', 'F'])
            .parse::<f32>()
            .map_err(|_| field_error(key, format!("expected a number, got '{n}'"))),
        TextValue::Scalar(Scalar::Ident(s)) => match s.to_ascii_lowercase().as_str() {
            "inf" | "infinity" => Ok(f32::INFINITY),
            "-inf" | "-infinity" => Ok(f32::NEG_INFINITY),
            "nan" => Ok(f32::NAN),
            _ => Err(field_error(key, format!("expected a number, got '{s}'"))),
        },
        other => Err(field_error(key, format!("expected a number, got {other:?}"))),
    }
}

// ── Lexer ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Colon,
    Open(char),
    Close(char),
    LBracket,
    RBracket,
    Comma,
    Semicolon,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, ImportError> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.peek() {
            let line = self.line;
            match c {
                '\n' => {
                    self.line += 1;
                    self.chars.next();
                }
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '#' => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                ':' => {
                    self.chars.next();
                    tokens.push((Token::Colon, line));
                }
                '{' | '<' => {
                    self.chars.next();
                    tokens.push((Token::Open(c), line));
                }
                '}' | '>' => {
                    self.chars.next();
                    tokens.push((Token::Close(c), line));
                }
                '[' => {
                    self.chars.next();
                    tokens.push((Token::LBracket, line));
                }
                ']' => {
                    self.chars.next();
                    tokens.push((Token::RBracket, line));
                }
                ',' => {
                    self.chars.next();
                    tokens.push((Token::Comma, line));
                }
                ';' => {
                    self.chars.next();
                    tokens.push((Token::Semicolon, line));
                }
                '"' | '\'' => {
                    let s = self.string(c)?;
                    tokens.push((Token::Str(s), line));
                }
                c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                    let word = self.word();
                    // A sign followed by a word ("-inf") is an identifier.
                    let body = word.trim_start_matches(['-', '+']);
                    if body.starts_with(|c: char| c.is_ascii_alphabetic()) {
                        tokens.push((Token::Ident(word), line));
                    } else {
                        tokens.push((Token::Number(word), line));
                    }
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let word = self.word();
                    tokens.push((Token::Ident(word), line));
                }
                other => {
                    return Err(ImportError::Syntax {
                        line,
                        detail: format!("unexpected character '{other}'"),
                    })
                }
            }
        }
        Ok(tokens)
    }

    /// Consumes an identifier or numeric literal.
    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            let exponent_sign = (c == '-' || c == '+')
                && word.ends_with(['e', 'E'])
                && word.starts_with(|c: char| c.is_ascii_digit() || c == '.' || c == '-' || c == '+');
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign || word.is_empty() {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        word
    }

    fn string(&mut self, quote: char) -> Result<String, ImportError> {
        let start = self.line;
        self.chars.next();
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None | Some('\n') => {
                    return Err(ImportError::Syntax {
                        line: start,
                        detail: "unterminated string literal".into(),
                    })
                }
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c @ ('\\' | '"' | '\'')) => out.push(c),
                    other => {
                        return Err(ImportError::Syntax {
                            line: start,
                            detail: format!("unsupported escape sequence {other:?}"),
                        })
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }
}

// ── Parser ─────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, l)| *l)
            .unwrap_or(1)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        t
    }

    fn error(&self, detail: impl Into<String>) -> ImportError {
        ImportError::Syntax {
            line: self.line(),
            detail: detail.into(),
        }
    }

    /// Parses fields until end of input (top level) or a closing delimiter.
    fn message(&mut self, nested: bool) -> Result<TextMessage, ImportError> {
        let mut message = TextMessage::default();
        loop {
            match self.peek() {
                None if nested => return Err(self.error("unexpected end of input, missing '}'")),
                None => return Ok(message),
                Some(Token::Close(_)) if nested => return Ok(message),
                Some(Token::Ident(_)) => self.field(&mut message)?,
                Some(other) => {
                    let detail = format!("expected a field name, found {other:?}");
                    return Err(self.error(detail));
                }
            }
            while matches!(self.peek(), Some(Token::Semicolon | Token::Comma)) {
                self.next();
            }
        }
    }

    fn field(&mut self, message: &mut TextMessage) -> Result<(), ImportError> {
        let name = match self.next() {
            Some(Token::Ident(name)) => name,
            _ => return Err(self.error("expected a field name")),
        };
        let had_colon = matches!(self.peek(), Some(Token::Colon));
        if had_colon {
            self.next();
        }
        match self.peek() {
            Some(Token::Open(open)) => {
                let close = if *open == '{' { '}' } else { '>' };
                self.next();
                let nested = self.message(true)?;
                match self.next() {
                    Some(Token::Close(c)) if c == close => {}
                    _ => return Err(self.error(format!("expected '{close}' to close '{name}'"))),
                }
                message.fields.push((name, TextValue::Message(nested)));
            }
            Some(Token::LBracket) if had_colon => {
                self.next();
                if matches!(self.peek(), Some(Token::RBracket)) {
                    self.next();
                    return Ok(());
                }
                loop {
                    let value = self.scalar(&name)?;
                    message.fields.push((name.clone(), TextValue::Scalar(value)));
                    match self.next() {
                        Some(Token::Comma) => continue,
                        Some(Token::RBracket) => break,
                        _ => return Err(self.error(format!("expected ',' or ']' in list '{name}'"))),
                    }
                }
            }
            _ if had_colon => {
                let value = self.scalar(&name)?;
                message.fields.push((name, TextValue::Scalar(value)));
            }
            _ => return Err(self.error(format!("expected ':' or '{{' after '{name}'"))),
        }
        Ok(())
    }

    fn scalar(&mut self, name: &str) -> Result<Scalar, ImportError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Scalar::Number(n)),
            Some(Token::Ident(s)) => Ok(Scalar::Ident(s)),
            Some(Token::Str(mut s)) => {
                // Adjacent string literals concatenate.
                while let Some(Token::Str(_)) = self.peek() {
                    if let Some(Token::Str(more)) = self.next() {
                        s.push_str(&more);
                    }
                }
                Ok(Scalar::Str(s))
            }
            _ => Err(self.error(format!("expected a value for '{name}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LENET_HEAD: &str = r#"
        name: "LeNet"   # trailing comment
        input: "data"
        input_dim: 64
        input_dim: 1
        input_dim: 28
        input_dim: 28
        layer {
          name: "conv1"
          type: "Convolution"
          bottom: "data"
          top: "conv1"
          convolution_param {
            num_output: 20
            kernel_size: 5
            stride: 1
            weight_filler { type: "xavier" }
          }
        }
    "#;

    #[test]
    fn test_parse_scalars_and_nesting() {
        let m = TextMessage::parse(LENET_HEAD).unwrap();
        assert_eq!(m.string("name").unwrap().as_deref(), Some("LeNet"));
        assert_eq!(m.uints("input_dim").unwrap(), vec![64, 1, 28, 28]);
        let layer = m.messages("layer").next().unwrap();
        assert_eq!(layer.string("type").unwrap().as_deref(), Some("Convolution"));
        let conv = layer.message("convolution_param").unwrap();
        assert_eq!(conv.uint("num_output").unwrap(), Some(20));
        assert_eq!(
            conv.message("weight_filler").unwrap().string("type").unwrap().as_deref(),
            Some("xavier")
        );
    }

    #[test]
    fn test_enum_and_bool_values() {
        let m = TextMessage::parse("pool: MAX global_pooling: true bias_term: 0").unwrap();
        assert_eq!(m.string("pool").unwrap().as_deref(), Some("MAX"));
        assert_eq!(m.boolean("global_pooling").unwrap(), Some(true));
        assert_eq!(m.boolean("bias_term").unwrap(), Some(false));
    }

    #[test]
    fn test_floats() {
        let m = TextMessage::parse("alpha: 0.0001 beta: 7.5e-1 k: 2f eps: -inf").unwrap();
        assert_eq!(m.float("alpha").unwrap(), Some(0.0001));
        assert_eq!(m.float("beta").unwrap(), Some(0.75));
        assert_eq!(m.float("k").unwrap(), Some(2.0));
        assert_eq!(m.float("eps").unwrap(), Some(f32::NEG_INFINITY));
    }

    #[test]
    fn test_list_shorthand_and_angle_brackets() {
        let m = TextMessage::parse("shape < dim: [1, 3, 224, 224] >").unwrap();
        let shape = m.message("shape").unwrap();
        assert_eq!(shape.uints("dim").unwrap(), vec![1, 3, 224, 224]);
    }

    #[test]
    fn test_last_singular_value_wins() {
        let m = TextMessage::parse("num_output: 10 num_output: 20").unwrap();
        assert_eq!(m.uint("num_output").unwrap(), Some(20));
    }

    #[test]
    fn test_string_escapes_and_concatenation() {
        let m = TextMessage::parse(r#"name: "a\"b" 'c'"#).unwrap();
        assert_eq!(m.string("name").unwrap().as_deref(), Some("a\"bc"));
    }

    #[test]
    fn test_missing_close_brace() {
        let err = TextMessage::parse("layer {\n name: \"x\"\n").unwrap_err();
        assert!(matches!(err, ImportError::Syntax { .. }));
    }

    #[test]
    fn test_missing_value_reports_line() {
        let err = TextMessage::parse("name: \"ok\"\n\nnum_output:\n}").unwrap_err();
        match err {
            ImportError::Syntax { line, .. } => assert_eq!(line, 4),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_string() {
        assert!(TextMessage::parse("name: \"oops\n").is_err());
    }

    #[test]
    fn test_wrong_field_type() {
        let m = TextMessage::parse("num_output: \"ten\"").unwrap();
        assert!(matches!(m.uint("num_output"), Err(ImportError::Field { .. })));
        let m = TextMessage::parse("num_output: -3").unwrap();
        assert!(m.uint("num_output").is_err());
    }

    #[test]
    fn test_stray_character() {
        assert!(TextMessage::parse("name = \"x\"").is_err());
    }
}
