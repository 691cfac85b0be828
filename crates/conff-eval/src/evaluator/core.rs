// crates/conff-eval/src/evaluator/core.rs

use std::path::{Path, PathBuf};

use super::builtins::FunctionRegistry;
use super::crypto::CryptoContext;
use super::errors::{ConffError, ErrorLog, EvalResult, StructuralError, WalkResult};
use super::expr::evaluate;
use super::loader::{parse_yaml, read_document, DocumentLoader, FsLoader};
use super::operators::OperatorTable;
use super::scope::{Env, Layer, Scope};
use super::state::{EvalConfig, Posture};
use super::walker::Walker;
use crate::types::{Mapping, NodePath, Value};

/// Resolves documents against one configuration. Each call walks with its
/// own resolved index; the evaluator itself keeps no per-run state.
pub struct Evaluator {
    config: EvalConfig,
    functions: FunctionRegistry,
    operators: OperatorTable,
    crypto: CryptoContext,
    loader: Box<dyn DocumentLoader>,
}

impl Evaluator {
    pub fn new(config: EvalConfig) -> Self {
        let crypto = CryptoContext::from_params(&config.params);
        let loader = Box::new(FsLoader::new(config.include_paths.clone()));
        Evaluator {
            config,
            functions: FunctionRegistry::with_defaults(),
            operators: OperatorTable::default(),
            crypto,
            loader,
        }
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_operators(mut self, operators: OperatorTable) -> Self {
        self.operators = operators;
        self
    }

    pub fn with_loader(mut self, loader: impl DocumentLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn posture(&self) -> Posture {
        self.config.posture
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn crypto(&self) -> &CryptoContext {
        &self.crypto
    }

    /// Fresh key for the configured cipher, also stored as `P.ekey`.
    /// `None` (and `P.ekey` cleared) when the cipher tag is unknown.
    pub fn generate_crypto_key(&mut self) -> Option<String> {
        if let Some(etype) = self.config.params.get("etype").and_then(Value::as_str) {
            self.crypto.set_etype(etype);
        }
        let key = self.crypto.generate_key();
        let stored = key.clone().map(Value::Str).unwrap_or(Value::Null);
        self.config.params.insert("ekey".to_string(), stored);
        key
    }

    pub fn crypto_key(&self) -> Option<&str> {
        self.crypto.key()
    }

    fn globals(&self) -> Scope<'static> {
        Scope::globals(self.config.names.clone())
    }

    fn param_bindings(&self) -> Mapping {
        let mut bindings = Mapping::new();
        bindings.insert("P".to_string(), Value::Map(self.config.params.clone()));
        bindings
    }

    /// Evaluate a single expression with an empty `R`.
    pub fn parse_expr(&self, source: &str) -> EvalResult<Value> {
        let globals = self.globals();
        let scope = globals.child(Layer::Params, self.param_bindings());
        let root = Value::Map(Mapping::new());
        let env = Env {
            scope: &scope,
            functions: &self.functions,
            operators: &self.operators,
            crypto: &self.crypto,
            root: &root,
            current: &root,
        };
        evaluate(source, &env)
    }

    fn walk(&self, document: &Value, file: Option<PathBuf>, errors: &mut ErrorLog) -> WalkResult<Value> {
        let globals = self.globals();
        let scope = globals.child(Layer::Params, self.param_bindings());
        let mut walker = Walker::new(
            &self.functions,
            &self.operators,
            &self.crypto,
            self.loader.as_ref(),
            errors,
        );
        if let Some(file) = file {
            walker = walker.with_document(file);
        }
        walker.walk_root(document, &scope)
    }

    /// Resolve an in-memory tree; a fatal error is returned.
    pub fn parse_value(&self, document: &Value, errors: &mut ErrorLog) -> Result<Value, ConffError> {
        Ok(self.walk(document, None, errors)?)
    }

    /// Resolve an in-memory tree; a fatal error is logged and yields `None`.
    pub fn parse_value_tolerant(&self, document: &Value, errors: &mut ErrorLog) -> Option<Value> {
        match self.walk(document, None, errors) {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("{e}");
                errors.record_fatal(e);
                None
            }
        }
    }

    /// Parse YAML (or JSON) text and resolve it.
    pub fn parse_text(&self, text: &str, errors: &mut ErrorLog) -> Result<Value, ConffError> {
        let document = parse_yaml(text, Path::new("<string>"))?;
        self.parse_value(&document, errors)
    }

    pub fn parse_file(&self, path: &Path, errors: &mut ErrorLog) -> Result<Value, ConffError> {
        let document = read_document(path)?;
        Ok(self.walk(&document.value, document.path, errors)?)
    }

    /// Dispatch on the configured posture. Tolerant runs never return `Err`.
    pub fn run(&self, document: &Value, errors: &mut ErrorLog) -> Result<Option<Value>, ConffError> {
        match self.config.posture {
            Posture::Strict => self.parse_value(document, errors).map(Some),
            Posture::Tolerant => Ok(self.parse_value_tolerant(document, errors)),
        }
    }

    /// [`Evaluator::run`] for a file on disk.
    pub fn run_file(&self, path: &Path, errors: &mut ErrorLog) -> Result<Option<Value>, ConffError> {
        match self.config.posture {
            Posture::Strict => self.parse_file(path, errors).map(Some),
            Posture::Tolerant => match self.parse_file(path, errors) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    log::error!("{e}");
                    errors.record_fatal(into_structural(e, path));
                    Ok(None)
                }
            },
        }
    }
}

/// Fatal errors are logged as structural; a failed top-level read counts as
/// a failed import at the root.
fn into_structural(error: ConffError, path: &Path) -> StructuralError {
    match error {
        ConffError::Structural(e) => e,
        ConffError::Load(e) => StructuralError::Import {
            path: NodePath::root(),
            reference: path.display().to_string(),
            cause: e.to_string(),
        },
    }
}
