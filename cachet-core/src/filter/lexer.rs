//! `$filter` tokenizer

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

// ============================================================================
// TOKENS
// ============================================================================

/// Token kinds of the OData filter subset.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Logical
    And,
    Or,
    Not,

    // Comparison
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Has,

    // Delimiters
    LParen,
    RParen,
    Comma,

    // Literals
    String(String),
    Integer(i64),
    Float(f64),
    True,
    False,
    Null,

    /// Member path (`jsonValue/title`) or function name.
    Identifier(String),

    // Special
    Eof,
    Error(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::And => f.write_str("'and'"),
            TokenKind::Or => f.write_str("'or'"),
            TokenKind::Not => f.write_str("'not'"),
            TokenKind::Eq => f.write_str("'eq'"),
            TokenKind::Ne => f.write_str("'ne'"),
            TokenKind::Gt => f.write_str("'gt'"),
            TokenKind::Ge => f.write_str("'ge'"),
            TokenKind::Lt => f.write_str("'lt'"),
            TokenKind::Le => f.write_str("'le'"),
            TokenKind::Has => f.write_str("'has'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::String(s) => write!(f, "string '{}'", s),
            TokenKind::Integer(i) => write!(f, "number {}", i),
            TokenKind::Float(x) => write!(f, "number {}", x),
            TokenKind::True => f.write_str("'true'"),
            TokenKind::False => f.write_str("'false'"),
            TokenKind::Null => f.write_str("'null'"),
            TokenKind::Identifier(name) => write!(f, "'{}'", name),
            TokenKind::Eof => f.write_str("end of input"),
            TokenKind::Error(msg) => f.write_str(msg),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

// ============================================================================
// LEXER
// ============================================================================

/// Lexer for `$filter` expressions.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            pos: 0,
        }
    }

    /// Tokenize the whole input. The last token is always `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tokens
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let position = self.pos;
        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                ',' => {
                    self.advance();
                    TokenKind::Comma
                }
                '\'' => self.scan_string(),
                '-' => {
                    self.advance();
                    if self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                        self.scan_number(position)
                    } else {
                        TokenKind::Error("Unexpected character: -".to_string())
                    }
                }
                c if c.is_ascii_digit() => self.scan_number(position),
                c if c.is_alphabetic() || c == '_' => self.scan_identifier(),
                c => {
                    self.advance();
                    TokenKind::Error(format!("Unexpected character: {}", c))
                }
            },
        };

        Token { kind, position }
    }

    /// Scan a keyword or member path. Keywords are case-sensitive.
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' || c == '/' {
                self.advance();
            } else {
                break;
            }
        }

        let ident = &self.source[start..self.pos];
        match ident {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "eq" => TokenKind::Eq,
            "ne" => TokenKind::Ne,
            "gt" => TokenKind::Gt,
            "ge" => TokenKind::Ge,
            "lt" => TokenKind::Lt,
            "le" => TokenKind::Le,
            "has" => TokenKind::Has,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier(ident.to_string()),
        }
    }

    /// Scan a single-quoted string; `''` stands for one quote.
    fn scan_string(&mut self) -> TokenKind {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return TokenKind::Error("Unterminated string literal".to_string()),
                Some('\'') => {
                    if self.peek_char() == Some('\'') {
                        self.advance();
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some(c) => value.push(c),
            }
        }

        TokenKind::String(value)
    }

    /// Scan an integer or decimal starting at `start` (which may hold a `-`).
    fn scan_number(&mut self, start: usize) -> TokenKind {
        let mut is_float = false;

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !is_float {
                is_float = true;
                self.advance();
            } else {
                break;
            }
        }

        if matches!(self.peek_char(), Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.advance();
            }
            while self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.advance();
            }
        }

        let text = &self.source[start..self.pos];

        // Type suffixes (10L, 1.5M, 2.0d) carry no meaning here.
        if let Some(c) = self.peek_char() {
            if matches!(c, 'L' | 'l' | 'M' | 'm' | 'D' | 'd' | 'F' | 'f') {
                self.advance();
            }
        }

        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return TokenKind::Integer(n);
            }
        }
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => TokenKind::Float(n),
            _ => TokenKind::Error(format!("Invalid number: {}", text)),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((i, c)) = self.chars.next() {
            self.pos = i + c.len_utf8();
            Some(c)
        } else {
            None
        }
    }
}
