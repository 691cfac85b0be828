mod types;
pub use types::*;

pub mod ast;
pub mod conff_api;
pub mod evaluator;
pub mod lexer;
pub mod parser;

pub use evaluator::{ConffError, ErrorLog, EvalConfig, EvalError, Evaluator, Posture};
pub use lexer::Lexer;
pub use parser::Parser;
