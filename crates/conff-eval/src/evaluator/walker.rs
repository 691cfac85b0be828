// crates/conff-eval/src/evaluator/walker.rs
//
// Depth-first resolution of a document. `index` holds the tree resolved so
// far in this run and backs `R` and `S`.

use std::path::{Path, PathBuf};

use super::builtins::FunctionRegistry;
use super::crypto::CryptoContext;
use super::errors::{ErrorLog, Outcome, StructuralError, WalkResult};
use super::expr::{evaluate, evaluate_leaf};
use super::foreach::{instance_key, ForeachSpec, ValuesSource};
use super::loader::DocumentLoader;
use super::merge::{apply_update, deep_merge, merge_into};
use super::operators::OperatorTable;
use super::scope::{Env, Layer, Scope};
use crate::types::{Mapping, NodePath, Value};

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveKind {
    Extends,
    Import,
    Update,
    Foreach,
}

fn directive_kind(key: &str) -> Option<DirectiveKind> {
    match key {
        "extends" | "F.extend" => Some(DirectiveKind::Extends),
        "import" | "F.inc" => Some(DirectiveKind::Import),
        "update" | "F.update" => Some(DirectiveKind::Update),
        "foreach" | "F.foreach" => Some(DirectiveKind::Foreach),
        _ => None,
    }
}

/// Reserved keys of one mapping, split from its ordinary children.
struct Directives<'d> {
    base: Option<(DirectiveKind, &'d str, &'d Value)>,
    foreach: Option<(&'d str, &'d Value)>,
    update: Option<(&'d str, &'d Value)>,
    own: Vec<(&'d str, &'d Value)>,
}

impl<'d> Directives<'d> {
    fn extract(map: &'d Mapping, path: &NodePath) -> WalkResult<Self> {
        let mut directives = Directives {
            base: None,
            foreach: None,
            update: None,
            own: Vec::new(),
        };
        for (key, value) in map {
            let key = key.as_str();
            let Some(kind) = directive_kind(key) else {
                directives.own.push((key, value));
                continue;
            };
            let slot_taken = match kind {
                DirectiveKind::Extends | DirectiveKind::Import => {
                    directives.base.replace((kind, key, value)).map(|(_, k, _)| k)
                }
                DirectiveKind::Foreach => directives.foreach.replace((key, value)).map(|(k, _)| k),
                DirectiveKind::Update => directives.update.replace((key, value)).map(|(k, _)| k),
            };
            if let Some(previous) = slot_taken {
                return Err(StructuralError::InvalidDirective {
                    path: path.clone(),
                    directive: key.to_string(),
                    message: format!("conflicts with '{previous}' in the same mapping"),
                });
            }
        }
        Ok(directives)
    }
}

pub struct Walker<'e> {
    functions: &'e FunctionRegistry,
    operators: &'e OperatorTable,
    crypto: &'e CryptoContext,
    loader: &'e dyn DocumentLoader,
    errors: &'e mut ErrorLog,
    index: Value,
    /// File of the document being walked.
    origin: Option<PathBuf>,
    open_imports: Vec<PathBuf>,
}

impl<'e> Walker<'e> {
    pub fn new(
        functions: &'e FunctionRegistry,
        operators: &'e OperatorTable,
        crypto: &'e CryptoContext,
        loader: &'e dyn DocumentLoader,
        errors: &'e mut ErrorLog,
    ) -> Self {
        Walker {
            functions,
            operators,
            crypto,
            loader,
            errors,
            index: Value::Null,
            origin: None,
            open_imports: Vec::new(),
        }
    }

    /// Marks the top-level document as coming from `file`.
    pub fn with_document(mut self, file: PathBuf) -> Self {
        self.open_imports.push(file.clone());
        self.origin = Some(file);
        self
    }

    pub fn walk_root(&mut self, document: &Value, scope: &Scope<'_>) -> WalkResult<Value> {
        self.index = Value::Null;
        let resolved = self.walk(document, &NodePath::root(), scope)?;
        self.index = resolved.clone();
        Ok(resolved)
    }

    fn origin_dir(&self) -> Option<&Path> {
        self.origin.as_deref().and_then(Path::parent)
    }

    /// Nearest mapping in the index at or above `from`.
    fn enclosing(&self, from: &NodePath) -> &Value {
        let mut path = from.clone();
        loop {
            if let Some(found @ Value::Map(_)) = self.index.get_path(&path) {
                return found;
            }
            if path.is_root() {
                return &NULL;
            }
            path = path.parent();
        }
    }

    fn env<'a>(&'a self, scope: &'a Scope<'a>, from: &NodePath) -> Env<'a> {
        Env {
            scope,
            functions: self.functions,
            operators: self.operators,
            crypto: self.crypto,
            root: &self.index,
            current: self.enclosing(from),
        }
    }

    fn index_merge(&mut self, path: &NodePath, overlay: &Mapping) {
        let merged = match self.index.get_path(path) {
            Some(Value::Map(existing)) => {
                let mut m = existing.clone();
                merge_into(&mut m, overlay.clone());
                m
            }
            _ => overlay.clone(),
        };
        self.index.set_path(path, Value::Map(merged));
    }

    fn walk(&mut self, node: &Value, path: &NodePath, scope: &Scope<'_>) -> WalkResult<Value> {
        match node {
            Value::Map(map) => self.walk_map(map, path, scope),
            Value::List(items) => self.walk_list(items, path, scope),
            Value::Str(source) => Ok(self.eval_leaf(source, path, scope)),
            other => Ok(other.clone()),
        }
    }

    fn eval_leaf(&mut self, source: &str, path: &NodePath, scope: &Scope<'_>) -> Value {
        let outcome = {
            let env = self.env(scope, &path.parent());
            evaluate_leaf(source, &env)
        };
        match outcome {
            Outcome::Resolved(value) => {
                log::trace!("{path}: {source:?} -> {}", value.repr());
                value
            }
            Outcome::Recovered(value, error) => {
                self.errors.record(path.clone(), error);
                value
            }
        }
    }

    fn walk_list(&mut self, items: &[Value], path: &NodePath, scope: &Scope<'_>) -> WalkResult<Value> {
        self.index.set_path(path, Value::List(Vec::new()));
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let child_path = path.index(i);
            let value = self.walk(item, &child_path, scope)?;
            self.index.set_path(&child_path, value.clone());
            out.push(value);
        }
        Ok(Value::List(out))
    }

    fn walk_map(&mut self, map: &Mapping, path: &NodePath, scope: &Scope<'_>) -> WalkResult<Value> {
        let directives = Directives::extract(map, path)?;
        if !matches!(self.index.get_path(path), Some(Value::Map(_))) {
            self.index.set_path(path, Value::Map(Mapping::new()));
        }

        let mut result = match directives.base {
            Some((kind, key, node)) => self.resolve_base(kind, key, node, path, scope)?,
            None => Mapping::new(),
        };
        self.index_merge(path, &result);

        if let Some((key, directive)) = directives.foreach {
            log::debug!("{path}: expanding {key}");
            let generated = self.expand_foreach(directive, path, scope)?;
            merge_into(&mut result, generated);
            self.index_merge(path, &result);
        }

        for (key, node) in directives.own {
            let child_path = path.key(key);
            let value = self.walk(node, &child_path, scope)?;
            let merged = match result.get_mut(key) {
                Some(slot) => {
                    let existing = std::mem::take(slot);
                    *slot = deep_merge(existing, value);
                    slot.clone()
                }
                None => {
                    result.insert(key.to_string(), value.clone());
                    value
                }
            };
            self.index.set_path(&child_path, merged);
        }

        if let Some((key, update)) = directives.update {
            let entries = update
                .as_map()
                .ok_or_else(|| StructuralError::InvalidDirective {
                    path: path.clone(),
                    directive: key.to_string(),
                    message: format!("expected a mapping, got {}", update.type_name()),
                })?;
            for (target, node) in entries {
                log::debug!("{path}: {key} {target}");
                let value = self.walk(node, &path.dotted(target), scope)?;
                apply_update(&mut result, target, value);
                self.index.set_path(path, Value::Map(result.clone()));
            }
        }

        Ok(Value::Map(result))
    }

    fn resolve_base(
        &mut self,
        kind: DirectiveKind,
        key: &str,
        node: &Value,
        path: &NodePath,
        scope: &Scope<'_>,
    ) -> WalkResult<Mapping> {
        match (kind, node) {
            (DirectiveKind::Extends, Value::Str(source)) => {
                log::debug!("{path}: {key} {source}");
                let resolved = {
                    let env = self.env(scope, path);
                    evaluate(source, &env)
                };
                match resolved {
                    Ok(Value::Map(base)) => Ok(base),
                    Ok(other) => Err(StructuralError::UnresolvedReference {
                        path: path.clone(),
                        reference: source.clone(),
                        cause: format!("expected a mapping, got {}", other.type_name()),
                    }),
                    Err(e) => Err(StructuralError::UnresolvedReference {
                        path: path.clone(),
                        reference: source.clone(),
                        cause: e.to_string(),
                    }),
                }
            }
            (DirectiveKind::Extends, Value::Map(inline)) => {
                match self.walk_map(inline, path, scope)? {
                    Value::Map(base) => Ok(base),
                    _ => Ok(Mapping::new()),
                }
            }
            (DirectiveKind::Import, Value::Str(reference)) => self.import(key, reference, path, scope),
            (_, other) => Err(StructuralError::InvalidDirective {
                path: path.clone(),
                directive: key.to_string(),
                message: format!("cannot take a {}", other.type_name()),
            }),
        }
    }

    fn import(
        &mut self,
        key: &str,
        reference: &str,
        path: &NodePath,
        scope: &Scope<'_>,
    ) -> WalkResult<Mapping> {
        let document = self
            .loader
            .load(reference, self.origin_dir())
            .map_err(|e| StructuralError::Import {
                path: path.clone(),
                reference: reference.to_string(),
                cause: e.to_string(),
            })?;
        if let Some(file) = &document.path {
            if self.open_imports.contains(file) {
                return Err(StructuralError::CircularImport {
                    path: path.clone(),
                    file: file.clone(),
                });
            }
        }
        log::debug!("{path}: {key} {reference}");

        let saved_index = std::mem::take(&mut self.index);
        let saved_origin = self.origin.clone();
        if let Some(file) = &document.path {
            self.open_imports.push(file.clone());
            self.origin = Some(file.clone());
        }
        let resolved = self.walk(&document.value, &NodePath::root(), scope);
        if document.path.is_some() {
            self.open_imports.pop();
        }
        self.origin = saved_origin;
        self.index = saved_index;

        match resolved? {
            Value::Map(base) => Ok(base),
            Value::Null => Ok(Mapping::new()),
            other => Err(StructuralError::InvalidDirective {
                path: path.clone(),
                directive: key.to_string(),
                message: format!("'{reference}' holds a {}, not a mapping", other.type_name()),
            }),
        }
    }

    fn expand_foreach(
        &mut self,
        directive: &Value,
        path: &NodePath,
        scope: &Scope<'_>,
    ) -> WalkResult<Mapping> {
        let spec = ForeachSpec::parse(directive, path)?;

        let values = match &spec.values {
            ValuesSource::Generator(generator) => {
                let env = self.env(scope, path);
                generator.generate(path, |source| evaluate(source, &env))?
            }
            ValuesSource::Sequence(items) => {
                let scratch = path.key("foreach");
                let walked = self.walk_list(items, &scratch, scope);
                if let Some(Value::Map(m)) = self.index.get_path(path) {
                    let mut m = m.clone();
                    m.shift_remove("foreach");
                    self.index.set_path(path, Value::Map(m));
                }
                match walked? {
                    Value::List(values) => values,
                    _ => Vec::new(),
                }
            }
            ValuesSource::Expression(source) => {
                let resolved = {
                    let env = self.env(scope, path);
                    evaluate(source, &env)
                };
                match resolved {
                    Ok(Value::List(values)) => values,
                    Ok(other) => {
                        return Err(StructuralError::MalformedForeach {
                            path: path.clone(),
                            message: format!(
                                "'values' expression {source:?} produced {}, expected a list",
                                other.type_name()
                            ),
                        })
                    }
                    Err(e) => {
                        return Err(StructuralError::MalformedForeach {
                            path: path.clone(),
                            message: format!("'values' expression {source:?} failed: {e}"),
                        })
                    }
                }
            }
        };

        let mut all = Mapping::new();
        all.insert("values".to_string(), Value::List(values.clone()));
        let values_scope = scope.child(Layer::Loop, all);

        let mut generated = Mapping::new();
        for (index, item) in values.into_iter().enumerate() {
            let mut bindings = Mapping::new();
            bindings.insert("item".to_string(), item);
            bindings.insert("index".to_string(), Value::Int(index as i64));
            let loop_scope = values_scope.child(Layer::Loop, bindings);

            let key = match spec.key {
                None => index.to_string(),
                Some(source) => self.generated_key(source, path, &loop_scope)?,
            };
            if generated.contains_key(&key) {
                return Err(StructuralError::DuplicateKey {
                    path: path.clone(),
                    key,
                });
            }
            let instance_path = path.key(key.as_str());
            let instance = self.walk_map(spec.template, &instance_path, &loop_scope)?;
            self.index.set_path(&instance_path, instance.clone());
            generated.insert(key, instance);
        }
        Ok(generated)
    }

    fn generated_key(&self, source: &str, path: &NodePath, scope: &Scope<'_>) -> WalkResult<String> {
        let env = self.env(scope, path);
        let value = evaluate(source, &env).map_err(|e| StructuralError::UnresolvedReference {
            path: path.clone(),
            reference: source.to_string(),
            cause: e.to_string(),
        })?;
        instance_key(&value).ok_or_else(|| StructuralError::MalformedForeach {
            path: path.clone(),
            message: format!("key {source:?} produced {}, expected a string or number", value.type_name()),
        })
    }
}
