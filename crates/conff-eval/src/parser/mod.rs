// crates/conff-eval/src/parser/mod.rs

use crate::ast::{BinaryOp, BoolOp, CmpOp, Expr, ParseError, Token, TokenKind, UnaryOp};
use crate::lexer::tokenize;

#[cfg(test)]
mod tests;

/// Maximum nesting of parenthesised / bracketed sub-expressions.
pub const MAX_DEPTH: usize = 64;

/// Longer sources are not parsed at all.
pub const MAX_SOURCE_LEN: usize = 64 * 1024;

/// Maximum number of `.attr`, `[index]` and `(args)` trailers on one operand.
pub const MAX_TRAILERS: usize = 256;

/// Parse a complete expression string.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    if source.len() > MAX_SOURCE_LEN {
        return Err(ParseError::TooLong {
            limit: MAX_SOURCE_LEN,
        });
    }
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(&tokens);
    parser.parse()
}

/// Precedence-climbing parser over a token slice.
pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse the tokens as one expression (a bare `a, b` is a tuple).
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        if self.at(&TokenKind::Eof) {
            return Err(self.error("empty expression"));
        }
        let first = self.parse_expr()?;
        let expr = if self.at(&TokenKind::Comma) {
            let mut items = vec![first];
            while self.eat(&TokenKind::Comma) {
                if self.at(&TokenKind::Eof) {
                    break;
                }
                items.push(self.parse_expr()?);
            }
            Expr::Tuple(items)
        } else {
            first
        };
        if !self.at(&TokenKind::Eof) {
            return Err(self.error("unexpected token after expression"));
        }
        Ok(expr)
    }

    fn peek(&self) -> &TokenKind {
        // tokenize() always terminates the stream with Eof
        match self.tokens.get(self.pos) {
            Some(t) => &t.kind,
            None => &TokenKind::Eof,
        }
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        match self.tokens.get(self.pos + offset) {
            Some(t) => &t.kind,
            None => &TokenKind::Eof,
        }
    }

    fn current_pos(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.pos)
            .unwrap_or(0)
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn bump(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::Syntax {
            pos: self.current_pos(),
            message: message.to_string(),
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let result = self.parse_or();
        self.leave();
        result
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_and()?;
        if !self.at(&TokenKind::Or) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&TokenKind::Or) {
            values.push(self.parse_and()?);
        }
        Ok(Expr::Logical {
            op: BoolOp::Or,
            values,
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_not()?;
        if !self.at(&TokenKind::And) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&TokenKind::And) {
            values.push(self.parse_not()?);
        }
        Ok(Expr::Logical {
            op: BoolOp::And,
            values,
        })
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Not) {
            self.enter()?;
            let operand = self.parse_not();
            self.leave();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand?),
            });
        }
        self.parse_comparison()
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match (self.peek(), self.peek_at(1)) {
            (TokenKind::EqEq, _) => CmpOp::Eq,
            (TokenKind::NotEq, _) => CmpOp::NotEq,
            (TokenKind::Lt, _) => CmpOp::Lt,
            (TokenKind::LtE, _) => CmpOp::LtE,
            (TokenKind::Gt, _) => CmpOp::Gt,
            (TokenKind::GtE, _) => CmpOp::GtE,
            (TokenKind::In, _) => CmpOp::In,
            (TokenKind::Not, TokenKind::In) => {
                self.pos += 1;
                CmpOp::NotIn
            }
            (TokenKind::Is, TokenKind::Not) => {
                self.pos += 1;
                CmpOp::IsNot
            }
            (TokenKind::Is, _) => CmpOp::Is,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_bitor()?;
        let mut ops = Vec::new();
        while let Some(op) = self.comparison_op() {
            ops.push((op, self.parse_bitor()?));
        }
        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                ops,
            })
        }
    }

    fn binary_level(
        &mut self,
        ops: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let first = next(self)?;
        let mut rest = Vec::new();
        'outer: loop {
            for (kind, op) in ops {
                if self.eat(kind) {
                    rest.push((*op, next(self)?));
                    continue 'outer;
                }
            }
            break;
        }
        if rest.is_empty() {
            return Ok(first);
        }
        Ok(Expr::Chain {
            first: Box::new(first),
            rest,
        })
    }

    fn parse_bitor(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[(TokenKind::Pipe, BinaryOp::BitOr)], Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[(TokenKind::Caret, BinaryOp::BitXor)], Self::parse_bitand)
    }

    fn parse_bitand(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[(TokenKind::Amp, BinaryOp::BitAnd)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (TokenKind::LShift, BinaryOp::LShift),
                (TokenKind::RShift, BinaryOp::RShift),
            ],
            Self::parse_arith,
        )
    }

    fn parse_arith(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (TokenKind::Star, BinaryOp::Mult),
                (TokenKind::DoubleSlash, BinaryOp::FloorDiv),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::USub,
            TokenKind::Plus => UnaryOp::UAdd,
            TokenKind::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    /// `**` is right-associative and binds tighter than a unary operator on its left.
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_postfix()?;
        if self.eat(&TokenKind::DoubleStar) {
            self.enter()?;
            let exponent = self.parse_unary();
            self.leave();
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent?),
            });
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;
        let mut trailers = 0;
        loop {
            if matches!(self.peek(), TokenKind::Dot | TokenKind::LBracket | TokenKind::LParen) {
                trailers += 1;
                if trailers > MAX_TRAILERS {
                    return Err(self.error("too many trailers on one operand"));
                }
            }
            match self.peek() {
                TokenKind::Dot => {
                    self.pos += 1;
                    let attr = match self.bump() {
                        TokenKind::Ident(name) => name,
                        _ => return Err(self.error("expected attribute name after '.'")),
                    };
                    expr = Expr::Attribute {
                        value: Box::new(expr),
                        attr,
                    };
                }
                TokenKind::LBracket => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::LParen => {
                    self.pos += 1;
                    let args = self.parse_sequence(&TokenKind::RParen)?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma separated expressions up to `close`, trailing comma allowed.
    fn parse_sequence(&mut self, close: &TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.at(close) {
            items.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close, "closing bracket")?;
        Ok(items)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let expr = match self.bump() {
            TokenKind::Int(i) => Expr::Int(i),
            TokenKind::Float(f) => Expr::Float(f),
            TokenKind::Str(s) => Expr::Str(s),
            TokenKind::Ident(name) => Expr::Name(name),
            TokenKind::True => Expr::Bool(true),
            TokenKind::False => Expr::Bool(false),
            TokenKind::None => Expr::Null,
            TokenKind::LParen => return self.parse_paren(),
            TokenKind::LBracket => Expr::List(self.parse_sequence(&TokenKind::RBracket)?),
            TokenKind::LBrace => return self.parse_dict(),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                return Err(self.error("expected an expression"));
            }
        };
        Ok(expr)
    }

    fn parse_paren(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::RParen) {
            return Ok(Expr::Tuple(Vec::new()));
        }
        let first = self.parse_expr()?;
        if self.eat(&TokenKind::RParen) {
            return Ok(first);
        }
        self.expect(&TokenKind::Comma, "',' or ')'")?;
        let mut items = vec![first];
        items.extend(self.parse_sequence(&TokenKind::RParen)?);
        Ok(Expr::Tuple(items))
    }

    fn parse_dict(&mut self) -> Result<Expr, ParseError> {
        let mut entries = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            let key = self.parse_expr()?;
            self.expect(&TokenKind::Colon, "':' in dict literal")?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(Expr::Dict(entries))
    }
}
