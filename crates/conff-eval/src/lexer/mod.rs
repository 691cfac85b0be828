// crates/conff-eval/src/lexer/mod.rs

use crate::ast::{LexError, Token, TokenKind};
use lazy_static::lazy_static;
use regex::Regex;


lazy_static! {
    /// Decimal integer or float literal, with optional `_` separators and exponent.
    static ref NUMBER: Regex =
        Regex::new(r"^\d+(?:_\d+)*(?:\.(?:\d+(?:_\d+)*)?)?(?:[eE][+-]?\d+)?").unwrap();
}

/// Returns true if `c` is an ASCII letter or underscore.
fn is_identifier_start(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_')
}

/// Returns true if `c` is an ASCII letter, digit or underscore.
fn is_identifier_continue(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "is" => TokenKind::Is,
        "True" => TokenKind::True,
        "False" => TokenKind::False,
        "None" => TokenKind::None,
        _ => return None,
    };
    Some(kind)
}

/// Tokenizer for a single expression string.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    /// Lex the whole input. The returned vector always ends with `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.advance();
                continue;
            }
            let start = self.pos;
            if ch.is_ascii_digit() {
                self.lex_number(start)?;
            } else if is_identifier_start(ch) {
                self.lex_word(start);
            } else if ch == '\'' || ch == '"' {
                self.lex_string(start, ch)?;
            } else {
                self.lex_punct(start, ch)?;
            }
        }
        let end = self.pos;
        self.emit(end, TokenKind::Eof);
        Ok(self.tokens)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn emit(&mut self, start: usize, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            pos: start,
            length: self.pos - start,
        });
    }

    fn error(&self, pos: usize, message: impl Into<String>) -> LexError {
        LexError {
            pos,
            message: message.into(),
        }
    }

    fn lex_number(&mut self, start: usize) -> Result<(), LexError> {
        let text = match NUMBER.find(&self.input[start..]) {
            Some(m) => m.as_str(),
            None => return Err(self.error(start, "malformed number")),
        };
        self.pos = start + text.len();
        let clean = text.replace('_', "");
        let kind = if clean.contains(['.', 'e', 'E']) {
            clean
                .parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|e| self.error(start, format!("invalid float literal: {e}")))?
        } else {
            clean
                .parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|e| self.error(start, format!("invalid integer literal: {e}")))?
        };
        // `1abc` is not a number followed by a name
        if let Some(c) = self.peek_char() {
            if is_identifier_start(c) {
                return Err(self.error(self.pos, "identifier directly after number"));
            }
        }
        self.emit(start, kind);
        Ok(())
    }

    fn lex_word(&mut self, start: usize) {
        while let Some(c) = self.peek_char() {
            if !is_identifier_continue(c) {
                break;
            }
            self.advance();
        }
        let word = &self.input[start..self.pos];
        let kind = keyword(word).unwrap_or_else(|| TokenKind::Ident(word.to_string()));
        self.emit(start, kind);
    }

    fn lex_string(&mut self, start: usize, quote: char) -> Result<(), LexError> {
        self.advance();
        let mut out = String::new();
        loop {
            let ch = match self.advance() {
                Some(c) => c,
                None => return Err(self.error(start, "unterminated string literal")),
            };
            if ch == quote {
                break;
            }
            if ch == '\n' {
                return Err(self.error(start, "newline in string literal"));
            }
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            match self.advance() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some('\\') => out.push('\\'),
                Some('\'') => out.push('\''),
                Some('"') => out.push('"'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return Err(self.error(start, "unterminated string literal")),
            }
        }
        self.emit(start, TokenKind::Str(out));
        Ok(())
    }

    fn lex_punct(&mut self, start: usize, ch: char) -> Result<(), LexError> {
        let next = self.peek_second();
        let (kind, width) = match (ch, next) {
            ('*', Some('*')) => (TokenKind::DoubleStar, 2),
            ('/', Some('/')) => (TokenKind::DoubleSlash, 2),
            ('=', Some('=')) => (TokenKind::EqEq, 2),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('<', Some('=')) => (TokenKind::LtE, 2),
            ('>', Some('=')) => (TokenKind::GtE, 2),
            ('<', Some('<')) => (TokenKind::LShift, 2),
            ('>', Some('>')) => (TokenKind::RShift, 2),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('&', _) => (TokenKind::Amp, 1),
            ('|', _) => (TokenKind::Pipe, 1),
            ('^', _) => (TokenKind::Caret, 1),
            ('~', _) => (TokenKind::Tilde, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            (',', _) => (TokenKind::Comma, 1),
            (':', _) => (TokenKind::Colon, 1),
            ('.', _) => (TokenKind::Dot, 1),
            (other, _) => {
                return Err(self.error(start, format!("unexpected character {other:?}")));
            }
        };
        for _ in 0..width {
            self.advance();
        }
        self.emit(start, kind);
        Ok(())
    }
}

/// Convenience wrapper around [`Lexer::tokenize`].
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).tokenize()
}
