// crates/conff-eval/src/evaluator/scope.rs

use super::builtins::FunctionRegistry;
use super::crypto::CryptoContext;
use super::errors::{EvalError, EvalResult};
use super::operators::OperatorTable;
use crate::types::{Mapping, Value};

/// Which layer of the lookup order a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Caller-supplied names.
    Globals,
    /// `P`.
    Params,
    /// `item`, `index`, `values` bound by `foreach`.
    Loop,
}

/// One frame of name bindings. A child borrows its parent and only adds names.
#[derive(Debug)]
pub struct Scope<'p> {
    parent: Option<&'p Scope<'p>>,
    layer: Layer,
    bindings: Mapping,
}

impl Scope<'static> {
    pub fn globals(names: Mapping) -> Self {
        Scope {
            parent: None,
            layer: Layer::Globals,
            bindings: names,
        }
    }
}

impl<'p> Scope<'p> {
    pub fn child(&'p self, layer: Layer, bindings: Mapping) -> Scope<'p> {
        Scope {
            parent: Some(self),
            layer,
            bindings,
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Innermost binding of `name` in any layer.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            if let Some(v) = scope.bindings.get(name) {
                return Some(v);
            }
            frame = scope.parent;
        }
        None
    }

    /// Innermost binding of `name` restricted to frames of `layer`.
    pub fn lookup_layer(&self, name: &str, layer: Layer) -> Option<&Value> {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            if scope.layer == layer {
                if let Some(v) = scope.bindings.get(name) {
                    return Some(v);
                }
            }
            frame = scope.parent;
        }
        None
    }
}

/// Everything an expression can see while it is evaluated.
pub struct Env<'a> {
    pub scope: &'a Scope<'a>,
    pub functions: &'a FunctionRegistry,
    pub operators: &'a OperatorTable,
    pub crypto: &'a CryptoContext,
    /// `R`: the tree resolved so far.
    pub root: &'a Value,
    /// `S`: the nearest enclosing mapping resolved so far.
    pub current: &'a Value,
}

impl<'a> Env<'a> {
    /// Loop variables, then `R`/`S`, then `P`, then caller names.
    pub fn lookup(&self, name: &str) -> EvalResult<&'a Value> {
        if let Some(v) = self.scope.lookup_layer(name, Layer::Loop) {
            return Ok(v);
        }
        match name {
            "R" => return Ok(self.root),
            "S" => return Ok(self.current),
            _ => {}
        }
        self.scope
            .lookup(name)
            .ok_or_else(|| EvalError::Name(format!("name '{name}' is not defined")))
    }

    /// Resolve a dotted path such as `R.defaults.db`.
    pub fn resolve(&self, dotted: &str) -> EvalResult<&'a Value> {
        let mut parts = dotted.split('.');
        let first = parts.next().unwrap_or_default();
        let mut current = self.lookup(first)?;
        for part in parts {
            current = member(current, part)?;
        }
        Ok(current)
    }
}

/// `value.attr`: a key of a mapping, or a numeric position in a list.
pub fn member<'v>(value: &'v Value, attr: &str) -> EvalResult<&'v Value> {
    match value {
        Value::Map(m) => m
            .get(attr)
            .ok_or_else(|| EvalError::Name(format!("'{attr}' is not defined"))),
        Value::List(items) => attr
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .ok_or_else(|| EvalError::Name(format!("'list' object has no attribute '{attr}'"))),
        other => Err(EvalError::Name(format!(
            "'{}' object has no attribute '{attr}'",
            other.type_name()
        ))),
    }
}
