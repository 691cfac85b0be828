// crates/conff-eval/src/ast/mod.rs
//
// Tokens and the closed expression grammar. Every node kind the evaluator can
// meet is listed here; anything else fails to parse.

use std::fmt;
use thiserror::Error;


#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    // keywords
    And,
    Or,
    Not,
    In,
    Is,
    True,
    False,
    None,
    // operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    LShift,
    RShift,
    EqEq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    // delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
    pub length: usize,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at offset {pos}")]
pub struct LexError {
    pub pos: usize,
    pub message: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("{message} at offset {pos}")]
    Syntax { pos: usize, message: String },

    #[error("expression longer than {limit} bytes")]
    TooLong { limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    USub,
    UAdd,
    Not,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
}

/// Any operator that goes through the operator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Binary(BinaryOp),
    Unary(UnaryOp),
    Compare(CmpOp),
}

impl Operator {
    /// Node-kind identifier reported in `UnsupportedOperator` errors.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Binary(op) => match op {
                BinaryOp::Add => "Add",
                BinaryOp::Sub => "Sub",
                BinaryOp::Mult => "Mult",
                BinaryOp::Div => "Div",
                BinaryOp::FloorDiv => "FloorDiv",
                BinaryOp::Mod => "Mod",
                BinaryOp::Pow => "Pow",
                BinaryOp::BitAnd => "BitAnd",
                BinaryOp::BitOr => "BitOr",
                BinaryOp::BitXor => "BitXor",
                BinaryOp::LShift => "LShift",
                BinaryOp::RShift => "RShift",
            },
            Operator::Unary(op) => match op {
                UnaryOp::USub => "USub",
                UnaryOp::UAdd => "UAdd",
                UnaryOp::Not => "Not",
                UnaryOp::Invert => "Invert",
            },
            Operator::Compare(op) => match op {
                CmpOp::Eq => "Eq",
                CmpOp::NotEq => "NotEq",
                CmpOp::Lt => "Lt",
                CmpOp::LtE => "LtE",
                CmpOp::Gt => "Gt",
                CmpOp::GtE => "GtE",
                CmpOp::In => "In",
                CmpOp::NotIn => "NotIn",
                CmpOp::Is => "Is",
                CmpOp::IsNot => "IsNot",
            },
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `left ** right`; the only right-associative operator.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Operators of one precedence level applied left to right: `a + b - c`.
    Chain {
        first: Box<Expr>,
        rest: Vec<(BinaryOp, Expr)>,
    },
    Logical {
        op: BoolOp,
        values: Vec<Expr>,
    },
    /// `a < b <= c`: each comparison is made pairwise.
    Compare {
        left: Box<Expr>,
        ops: Vec<(CmpOp, Expr)>,
    },
}

impl Expr {
    /// The dotted name (`F.join`) this expression spells, if it is only names and attributes.
    pub fn dotted_name(&self) -> Option<String> {
        let mut attrs: Vec<&str> = Vec::new();
        let mut node = self;
        loop {
            match node {
                Expr::Name(n) => {
                    let mut dotted = n.clone();
                    for attr in attrs.iter().rev() {
                        dotted.push('.');
                        dotted.push_str(attr);
                    }
                    return Some(dotted);
                }
                Expr::Attribute { value, attr } => {
                    attrs.push(attr.as_str());
                    node = value;
                }
                _ => return None,
            }
        }
    }
}
