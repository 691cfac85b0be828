// crates/conff-eval/src/evaluator/expr.rs

use super::errors::{EvalError, EvalResult, Outcome};
use super::scope::{member, Env};
use crate::ast::{BoolOp, Expr};
use crate::parser::{parse_expression, MAX_DEPTH};
use crate::types::{Mapping, Value};

/// Evaluate one scalar string. Blank or unparsable text comes back unchanged.
pub fn evaluate(source: &str, env: &Env<'_>) -> EvalResult<Value> {
    if source.trim().is_empty() {
        return Ok(Value::Str(source.to_string()));
    }
    let expr = match parse_expression(source) {
        Ok(expr) => expr,
        Err(e) => {
            log::trace!("{source:?} kept as text: {e}");
            return Ok(Value::Str(source.to_string()));
        }
    };
    eval_expr(&expr, env)
}

/// Like [`evaluate`], but a failure degrades to the source text.
pub fn evaluate_leaf(source: &str, env: &Env<'_>) -> Outcome<Value> {
    match evaluate(source, env) {
        Ok(value) => Outcome::Resolved(value),
        Err(e) => Outcome::Recovered(Value::Str(source.to_string()), e),
    }
}

pub fn eval_expr(expr: &Expr, env: &Env<'_>) -> EvalResult<Value> {
    eval_at(expr, env, 0)
}

fn eval_at(expr: &Expr, env: &Env<'_>, depth: usize) -> EvalResult<Value> {
    if depth > MAX_DEPTH {
        return Err(EvalError::Limit(format!(
            "expression nested deeper than {MAX_DEPTH}"
        )));
    }
    let depth = depth + 1;
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Int(i) => Ok(Value::Int(*i)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Name(name) => env.lookup(name).cloned(),

        Expr::Attribute { .. } | Expr::Subscript { .. } => eval_trailers(expr, env, depth),

        Expr::Call { func, args } => {
            let name = func
                .dotted_name()
                .ok_or_else(|| EvalError::NotCallable("only named functions can be called".into()))?;
            let function = env
                .functions
                .get(&name)
                .ok_or_else(|| EvalError::Name(format!("name '{name}' is not defined")))?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_at(arg, env, depth)?);
            }
            function(env, values)
        }

        Expr::List(items) | Expr::Tuple(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_at(item, env, depth)?);
            }
            Ok(Value::List(values))
        }

        Expr::Dict(entries) => {
            let mut map = Mapping::new();
            for (key, value) in entries {
                let key = eval_at(key, env, depth)?;
                if matches!(key, Value::List(_) | Value::Map(_)) {
                    return Err(EvalError::Type(format!(
                        "unhashable type: '{}'",
                        key.type_name()
                    )));
                }
                let value = eval_at(value, env, depth)?;
                map.insert(key.to_key_string(), value);
            }
            Ok(Value::Map(map))
        }

        Expr::Unary { op, operand } => {
            let operand = eval_at(operand, env, depth)?;
            env.operators.unary(*op, &operand)
        }

        Expr::Binary { op, left, right } => {
            let left = eval_at(left, env, depth)?;
            let right = eval_at(right, env, depth)?;
            env.operators.binary(*op, &left, &right)
        }

        Expr::Chain { first, rest } => {
            let mut acc = eval_at(first, env, depth)?;
            for (op, operand) in rest {
                let right = eval_at(operand, env, depth)?;
                acc = env.operators.binary(*op, &acc, &right)?;
            }
            Ok(acc)
        }

        Expr::Logical { op, values } => {
            let mut result = Value::Null;
            for (i, value) in values.iter().enumerate() {
                result = eval_at(value, env, depth)?;
                let last = i + 1 == values.len();
                let stop = match op {
                    BoolOp::And => !result.is_truthy(),
                    BoolOp::Or => result.is_truthy(),
                };
                if stop || last {
                    break;
                }
            }
            Ok(result)
        }

        Expr::Compare { left, ops } => {
            let mut current = eval_at(left, env, depth)?;
            for (op, right) in ops {
                let right = eval_at(right, env, depth)?;
                if !env.operators.compare(*op, &current, &right)? {
                    return Ok(Value::Bool(false));
                }
                current = right;
            }
            Ok(Value::Bool(true))
        }
    }
}

enum Trailer<'e> {
    Attr(&'e str),
    Index(&'e Expr),
}

/// `base.a[i].b`: the innermost operand is evaluated once, then each trailer
/// is applied in order. A leading run of names resolves as one dotted path.
fn eval_trailers(expr: &Expr, env: &Env<'_>, depth: usize) -> EvalResult<Value> {
    let mut trailers = Vec::new();
    let mut node = expr;
    loop {
        match node {
            Expr::Attribute { value, attr } => {
                trailers.push(Trailer::Attr(attr));
                node = value;
            }
            Expr::Subscript { value, index } => {
                trailers.push(Trailer::Index(index));
                node = value;
            }
            _ => break,
        }
    }
    let mut trailers = trailers.into_iter().rev().peekable();

    let mut current = match node {
        Expr::Name(name) => {
            let mut dotted = name.clone();
            while let Some(Trailer::Attr(attr)) = trailers.peek() {
                dotted.push('.');
                dotted.push_str(attr);
                trailers.next();
            }
            env.resolve(&dotted)?.clone()
        }
        other => eval_at(other, env, depth)?,
    };
    for trailer in trailers {
        current = match trailer {
            Trailer::Attr(attr) => member(&current, attr)?.clone(),
            Trailer::Index(index) => {
                let index = eval_at(index, env, depth)?;
                subscript(&current, &index)?
            }
        };
    }
    Ok(current)
}

fn subscript(base: &Value, index: &Value) -> EvalResult<Value> {
    match base {
        Value::List(items) => {
            let i = position(index, items.len(), "list")?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = position(index, chars.len(), "string")?;
            Ok(Value::Str(chars[i].to_string()))
        }
        Value::Map(m) => {
            let key = index.to_key_string();
            m.get(&key)
                .cloned()
                .ok_or_else(|| EvalError::Index(format!("key {} not found", index.repr())))
        }
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Python-style index with negative positions counted from the end.
fn position(index: &Value, len: usize, what: &str) -> EvalResult<usize> {
    let i = match index {
        Value::Int(i) => *i,
        Value::Bool(b) => *b as i64,
        other => {
            return Err(EvalError::Type(format!(
                "{what} indices must be integers, not '{}'",
                other.type_name()
            )))
        }
    };
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvalError::Index(format!("{what} index {i} out of range")));
    }
    Ok(resolved as usize)
}
