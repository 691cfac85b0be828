// crates/conff-eval/src/evaluator/mod.rs

// The top-level module for the "evaluator" folder, integrating everything.

pub mod builtins;
pub mod core;
pub mod crypto;
pub mod errors;
pub mod expr;
pub mod foreach;
pub mod loader;
pub mod merge;
pub mod operators;
pub mod scope;
pub mod state;
pub mod walker;

#[cfg(test)]
mod tests; // holds multiple small test files

pub use self::core::Evaluator;
pub use builtins::{default_builtins, BuiltinFn, FunctionRegistry};
pub use crypto::{CryptoContext, DEFAULT_ETYPE};
pub use errors::{
    ConffError, ErrorLog, EvalError, EvalResult, LoadError, LoggedCause, LoggedError, Outcome,
    StructuralError, WalkResult,
};
pub use expr::{evaluate, evaluate_leaf};
pub use loader::{DocumentLoader, FsLoader, LoadedDocument};
pub use merge::{apply_update, deep_merge};
pub use operators::OperatorTable;
pub use scope::{Env, Layer, Scope};
pub use state::{EvalConfig, Posture};
