// crates/conff-eval/src/evaluator/errors.rs

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::NodePath;

/// Errors raised while evaluating a single scalar. These never abort a run:
/// the walker records them and keeps the scalar's source text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("NameError: {0}")]
    Name(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(String),

    #[error("OverflowError: {0}")]
    Overflow(String),

    #[error("IndexError: {0}")]
    Index(String),

    #[error("Limit exceeded: {0}")]
    Limit(String),

    #[error("Not callable: {0}")]
    NotCallable(String),

    #[error("{name}() expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("ValueError: {0}")]
    Value(String),
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Errors that make the document's shape untrustworthy. They abort the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("{path}: malformed foreach: {message}")]
    MalformedForeach { path: NodePath, message: String },

    #[error("{path}: unknown generator kind '{kind}'")]
    UnknownGenerator { path: NodePath, kind: String },

    #[error("{path}: generator '{kind}' is missing parameter '{param}'")]
    MissingParameter {
        path: NodePath,
        kind: String,
        param: String,
    },

    #[error("{path}: cannot resolve '{reference}': {cause}")]
    UnresolvedReference {
        path: NodePath,
        reference: String,
        cause: String,
    },

    #[error("{path}: invalid directive '{directive}': {message}")]
    InvalidDirective {
        path: NodePath,
        directive: String,
        message: String,
    },

    #[error("{path}: import of '{reference}' failed: {cause}")]
    Import {
        path: NodePath,
        reference: String,
        cause: String,
    },

    #[error("{path}: circular import of {file:?}")]
    CircularImport { path: NodePath, file: PathBuf },

    #[error("{path}: duplicate generated key '{key}'")]
    DuplicateKey { path: NodePath, key: String },
}

impl StructuralError {
    pub fn path(&self) -> &NodePath {
        match self {
            StructuralError::MalformedForeach { path, .. }
            | StructuralError::UnknownGenerator { path, .. }
            | StructuralError::MissingParameter { path, .. }
            | StructuralError::UnresolvedReference { path, .. }
            | StructuralError::InvalidDirective { path, .. }
            | StructuralError::Import { path, .. }
            | StructuralError::CircularImport { path, .. }
            | StructuralError::DuplicateKey { path, .. } => path,
        }
    }
}

pub type WalkResult<T> = Result<T, StructuralError>;

/// Errors raised by the document loader.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error in {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("JSON error in {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Boundary error returned by the strict entry points.
#[derive(Error, Debug)]
pub enum ConffError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Result of evaluating one leaf: either clean, or degraded with the cause.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Resolved(T),
    Recovered(T, EvalError),
}

/// What went wrong in a logged entry.
#[derive(Debug, Clone, PartialEq)]
pub enum LoggedCause {
    Recoverable(EvalError),
    Fatal(StructuralError),
}

impl fmt::Display for LoggedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggedCause::Recoverable(e) => write!(f, "{e}"),
            LoggedCause::Fatal(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggedError {
    pub path: NodePath,
    pub cause: LoggedCause,
}

impl fmt::Display for LoggedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.cause)
    }
}

/// Append-only log of issues met during one run; owned by the caller.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Vec<LoggedError>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: NodePath, error: EvalError) {
        log::warn!("{path}: {error}");
        self.entries.push(LoggedError {
            path,
            cause: LoggedCause::Recoverable(error),
        });
    }

    pub fn record_fatal(&mut self, error: StructuralError) {
        self.entries.push(LoggedError {
            path: error.path().clone(),
            cause: LoggedCause::Fatal(error),
        });
    }

    pub fn entries(&self) -> &[LoggedError] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recoverable causes recorded at `path`.
    pub fn at(&self, path: &NodePath) -> Vec<&EvalError> {
        self.entries
            .iter()
            .filter(|e| &e.path == path)
            .filter_map(|e| match &e.cause {
                LoggedCause::Recoverable(err) => Some(err),
                LoggedCause::Fatal(_) => None,
            })
            .collect()
    }

    pub fn has_fatal(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.cause, LoggedCause::Fatal(_)))
    }
}
