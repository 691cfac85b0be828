// crates/conff-eval/src/evaluator/state.rs

use std::path::PathBuf;

use crate::types::Mapping;

/// What a fatal error does at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Posture {
    /// Fatal errors are recorded in the log and the result is absent.
    #[default]
    Tolerant,
    /// Fatal errors are returned to the caller.
    Strict,
}

#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Free-form names visible to every expression.
    pub names: Mapping,
    /// Exposed as `P`; `etype` and `ekey` configure encryption.
    pub params: Mapping,
    pub include_paths: Vec<PathBuf>,
    pub posture: Posture,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            names: Mapping::new(),
            params: Mapping::new(),
            include_paths: vec![PathBuf::from(".")],
            posture: Posture::Tolerant,
        }
    }
}
