//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer is intentionally tiny – it knows nothing about semantics
//! beyond recognising keywords, identifiers, numbers and operators.
//! Multi-character punctuators are matched before single-character ones to
//! avoid ambiguity. Every token records the 1-based line and column it
//! starts at so later stages can anchor diagnostics.

use crate::error::{CompileError, CompileResult};

/// The reserved words of the language. Identifiers are lowercase, so a
/// lowercase word either matches one of these or lexes as an identifier.
const KEYWORDS: [&str; 11] = [
  "const",
  "var",
  "procedure",
  "call",
  "begin",
  "end",
  "if",
  "then",
  "while",
  "do",
  "odd",
];

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Keyword,
  Ident,
  Number,
  Punctuator,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i32>,
  pub loc: usize,
  pub len: usize,
  pub line: usize,
  pub column: usize,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(
    kind: TokenKind,
    loc: usize,
    len: usize,
    line: usize,
    column: usize,
    value: Option<i32>,
  ) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
      line,
      column,
    }
  }
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str, path: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;
  let mut line = 1;
  let mut line_start = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c == b'\n' {
      i += 1;
      line += 1;
      line_start = i;
      continue;
    }
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    let column = i - line_start + 1;

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text
        .parse::<i32>()
        .map_err(|err| CompileError::at(path, line, column, format!("invalid number: {err}")))?;
      tokens.push(Token::new(
        TokenKind::Number,
        start,
        i - start,
        line,
        column,
        Some(value),
      ));
      continue;
    }

    if c.is_ascii_lowercase() {
      let start = i;
      i += 1;
      while i < bytes.len() && (bytes[i].is_ascii_lowercase() || bytes[i].is_ascii_digit()) {
        i += 1;
      }
      let text = &input[start..i];
      let kind = if KEYWORDS.contains(&text) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, start, i - start, line, column, None));
      continue;
    }

    if let Some(op) = [":=", "<=", ">="]
      .into_iter()
      .find(|op| input[i..].starts_with(op))
    {
      tokens.push(Token::new(
        TokenKind::Punctuator,
        i,
        op.len(),
        line,
        column,
        None,
      ));
      i += op.len();
      continue;
    }

    if matches!(
      c,
      b'.'
        | b','
        | b';'
        | b'='
        | b'#'
        | b'<'
        | b'>'
        | b'+'
        | b'-'
        | b'*'
        | b'/'
        | b'('
        | b')'
        | b'!'
    ) {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1, line, column, None));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    let message = if invalid_char.is_ascii_uppercase() {
      format!("invalid token: '{invalid_char}' (identifiers and keywords are lowercase)")
    } else {
      format!("invalid token: '{invalid_char}'")
    };
    return Err(CompileError::at(path, line, column, message));
  }

  let column = input.len() - line_start + 1;
  tokens.push(Token::new(
    TokenKind::Eof,
    input.len(),
    0,
    line,
    column,
    None,
  ));
  Ok(tokens)
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}
