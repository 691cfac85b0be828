// crates/conff-eval/src/evaluator/builtins.rs

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::errors::{EvalError, EvalResult};
use super::foreach;
use super::operators::{partial_order, MAX_SEQUENCE_LENGTH};
use super::scope::Env;
use crate::types::Value;

/// Type for a builtin function: (environment, evaluated arguments) -> value
pub type BuiltinFn = fn(&Env<'_>, Vec<Value>) -> EvalResult<Value>;

lazy_static! {
    /// `{{`, `}}`, `{}`, `{0}` or `{name}` inside an `F.format` template.
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{|\}\}|\{(\w*)\}").unwrap();
}

/// Callables reachable from expressions, keyed by dotted name (`F.join`).
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, BuiltinFn>,
}

impl FunctionRegistry {
    /// A registry with no functions at all.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        FunctionRegistry {
            functions: default_builtins(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, function: BuiltinFn) {
        self.functions.insert(name.into(), function);
    }

    pub fn remove(&mut self, name: &str) -> Option<BuiltinFn> {
        self.functions.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.functions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Return the default builtins: plain conversions and the `F.` namespace.
pub fn default_builtins() -> HashMap<String, BuiltinFn> {
    let mut map = HashMap::new();
    map.insert("len".to_string(), builtin_len as BuiltinFn);
    map.insert("str".to_string(), builtin_str as BuiltinFn);
    map.insert("int".to_string(), builtin_int as BuiltinFn);
    map.insert("float".to_string(), builtin_float as BuiltinFn);
    map.insert("bool".to_string(), builtin_bool as BuiltinFn);
    map.insert("abs".to_string(), builtin_abs as BuiltinFn);
    map.insert("min".to_string(), builtin_min as BuiltinFn);
    map.insert("max".to_string(), builtin_max as BuiltinFn);
    map.insert("round".to_string(), builtin_round as BuiltinFn);
    map.insert("F.join".to_string(), builtin_join as BuiltinFn);
    map.insert("F.upper".to_string(), builtin_upper as BuiltinFn);
    map.insert("F.lower".to_string(), builtin_lower as BuiltinFn);
    map.insert("F.replace".to_string(), builtin_replace as BuiltinFn);
    map.insert("F.split".to_string(), builtin_split as BuiltinFn);
    map.insert("F.path_join".to_string(), builtin_path_join as BuiltinFn);
    map.insert("F.format".to_string(), builtin_format as BuiltinFn);
    map.insert("F.encrypt".to_string(), builtin_encrypt as BuiltinFn);
    map.insert("F.decrypt".to_string(), builtin_decrypt as BuiltinFn);
    map.insert("F.linspace".to_string(), builtin_linspace as BuiltinFn);
    map.insert("F.arange".to_string(), builtin_arange as BuiltinFn);
    map
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(EvalError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn string_arg<'v>(name: &str, value: &'v Value) -> EvalResult<&'v str> {
    value.as_str().ok_or_else(|| {
        EvalError::Type(format!(
            "{name}() expects a string, not '{}'",
            value.type_name()
        ))
    })
}

/// `len(x)`
fn builtin_len(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("len", &args, 1, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(l) => l.len(),
        Value::Map(m) => m.len(),
        other => {
            return Err(EvalError::Type(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(n as i64))
}

/// `str(x)`
fn builtin_str(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("str", &args, 0, 1)?;
    Ok(Value::Str(
        args.first().map(Value::to_string).unwrap_or_default(),
    ))
}

/// `int(x)`: truncates floats, parses strings.
fn builtin_int(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("int", &args, 1, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Float(f) => {
            let t = f.trunc();
            if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
                return Err(EvalError::Overflow(format!("cannot convert {f} to int")));
            }
            Ok(Value::Int(t as i64))
        }
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| EvalError::Value(format!("invalid literal for int(): '{s}'"))),
        other => Err(EvalError::Type(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

/// `float(x)`
fn builtin_float(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("float", &args, 1, 1)?;
    match &args[0] {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| EvalError::Value(format!("could not convert string to float: '{s}'"))),
        other => other.as_f64().map(Value::Float).ok_or_else(|| {
            EvalError::Type(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

/// `bool(x)`
fn builtin_bool(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("bool", &args, 0, 1)?;
    Ok(Value::Bool(args.first().map(Value::is_truthy).unwrap_or(false)))
}

/// `abs(x)`
fn builtin_abs(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("abs", &args, 1, 1)?;
    match &args[0] {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| EvalError::Overflow("integer overflow in abs()".into())),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(EvalError::Type(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

/// Shared body of `min`/`max`: one sequence argument, or several values.
fn extreme(name: &str, args: Vec<Value>, wanted: Ordering) -> EvalResult<Value> {
    arity(name, &args, 1, usize::MAX)?;
    let candidates = if args.len() == 1 {
        match args.into_iter().next() {
            Some(Value::List(items)) => items,
            Some(other) => {
                return Err(EvalError::Type(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )))
            }
            None => Vec::new(),
        }
    } else {
        args
    };
    let mut iter = candidates.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| EvalError::Value(format!("{name}() arg is an empty sequence")))?;
    for candidate in iter {
        if partial_order(&candidate, &best)? == Some(wanted) {
            best = candidate;
        }
    }
    Ok(best)
}

/// `min(a, b, ...)` or `min(list)`
fn builtin_min(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    extreme("min", args, Ordering::Less)
}

/// `max(a, b, ...)` or `max(list)`
fn builtin_max(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    extreme("max", args, Ordering::Greater)
}

/// `round(x[, ndigits])`, ties to even.
fn builtin_round(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("round", &args, 1, 2)?;
    let digits = match args.get(1) {
        None | Some(Value::Null) => None,
        Some(Value::Int(d)) => Some(*d),
        Some(other) => {
            return Err(EvalError::Type(format!(
                "ndigits must be an integer, not '{}'",
                other.type_name()
            )))
        }
    };
    match (&args[0], digits) {
        (Value::Int(i), _) => Ok(Value::Int(*i)),
        (Value::Bool(b), _) => Ok(Value::Int(*b as i64)),
        (Value::Float(f), None) => {
            let r = f.round_ties_even();
            if !r.is_finite() || r < i64::MIN as f64 || r >= i64::MAX as f64 {
                return Err(EvalError::Overflow(format!("cannot round {f} to int")));
            }
            Ok(Value::Int(r as i64))
        }
        (Value::Float(f), Some(d)) => {
            let scale = 10f64.powi(d.clamp(-308, 308) as i32);
            Ok(Value::Float((f * scale).round_ties_even() / scale))
        }
        (other, _) => Err(EvalError::Type(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

/// `F.join(items[, sep])`
fn builtin_join(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("F.join", &args, 1, 2)?;
    let sep = match args.get(1) {
        Some(v) => string_arg("F.join", v)?,
        None => "",
    };
    let items = args[0].as_list().ok_or_else(|| {
        EvalError::Type(format!(
            "F.join() expects a list, not '{}'",
            args[0].type_name()
        ))
    })?;
    let parts: Vec<String> = items.iter().map(Value::to_string).collect();
    let joined = parts.join(sep);
    if joined.len() > MAX_SEQUENCE_LENGTH {
        return Err(EvalError::Limit("joined string too long".into()));
    }
    Ok(Value::Str(joined))
}

/// `F.upper(s)`
fn builtin_upper(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("F.upper", &args, 1, 1)?;
    Ok(Value::Str(string_arg("F.upper", &args[0])?.to_uppercase()))
}

/// `F.lower(s)`
fn builtin_lower(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("F.lower", &args, 1, 1)?;
    Ok(Value::Str(string_arg("F.lower", &args[0])?.to_lowercase()))
}

/// `F.replace(s, old, new)`
fn builtin_replace(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("F.replace", &args, 3, 3)?;
    let s = string_arg("F.replace", &args[0])?;
    let old = string_arg("F.replace", &args[1])?;
    let new = string_arg("F.replace", &args[2])?;
    if old.is_empty() {
        return Err(EvalError::Value("F.replace(): empty pattern".into()));
    }
    let replaced = s.replace(old, new);
    if replaced.len() > MAX_SEQUENCE_LENGTH {
        return Err(EvalError::Limit("replaced string too long".into()));
    }
    Ok(Value::Str(replaced))
}

/// `F.split(s[, sep])`: whitespace split without a separator.
fn builtin_split(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("F.split", &args, 1, 2)?;
    let s = string_arg("F.split", &args[0])?;
    let parts: Vec<Value> = match args.get(1) {
        None | Some(Value::Null) => s.split_whitespace().map(Value::from).collect(),
        Some(sep) => {
            let sep = string_arg("F.split", sep)?;
            if sep.is_empty() {
                return Err(EvalError::Value("F.split(): empty separator".into()));
            }
            s.split(sep).map(Value::from).collect()
        }
    };
    Ok(Value::List(parts))
}

/// `F.path_join(a, b, ...)`
fn builtin_path_join(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("F.path_join", &args, 1, usize::MAX)?;
    let mut path = PathBuf::new();
    for part in &args {
        path.push(string_arg("F.path_join", part)?);
    }
    Ok(Value::Str(path.to_string_lossy().into_owned()))
}

/// `F.format(template, args...)`: `{}` sequential, `{0}` positional,
/// `{name}` from a trailing mapping argument.
fn builtin_format(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("F.format", &args, 1, usize::MAX)?;
    let template = string_arg("F.format", &args[0])?;
    let positional = &args[1..];
    let named = positional.last().and_then(Value::as_map);
    let mut next = 0usize;
    let mut failure = None;

    let out = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let whole = &caps[0];
        if whole == "{{" {
            return "{".to_string();
        }
        if whole == "}}" {
            return "}".to_string();
        }
        let field = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let value = if field.is_empty() {
            next += 1;
            positional.get(next - 1)
        } else if let Ok(i) = field.parse::<usize>() {
            positional.get(i)
        } else {
            named.and_then(|m| m.get(field))
        };
        match value {
            Some(v) => v.to_string(),
            None => {
                failure.get_or_insert_with(|| {
                    EvalError::Index(format!("F.format(): no value for '{whole}'"))
                });
                String::new()
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(Value::Str(out.into_owned())),
    }
}

/// `F.encrypt(text)`
fn builtin_encrypt(env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("F.encrypt", &args, 1, 1)?;
    let plaintext = string_arg("F.encrypt", &args[0])?;
    env.crypto.encrypt(plaintext).map(Value::Str)
}

/// `F.decrypt(token)`
fn builtin_decrypt(env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("F.decrypt", &args, 1, 1)?;
    let token = string_arg("F.decrypt", &args[0])?;
    env.crypto.decrypt(token).map(Value::Str)
}

/// `F.linspace(start, stop, count)`
fn builtin_linspace(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("F.linspace", &args, 3, 3)?;
    foreach::linspace(&args[0], &args[1], &args[2]).map(Value::List)
}

/// `F.arange(stop)`, `F.arange(start, stop)` or `F.arange(start, stop, step)`
fn builtin_arange(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
    arity("F.arange", &args, 1, 3)?;
    let values = match args.as_slice() {
        [stop] => foreach::arange(&Value::Int(0), stop, &Value::Int(1))?,
        [start, stop] => foreach::arange(start, stop, &Value::Int(1))?,
        [start, stop, step] => foreach::arange(start, stop, step)?,
        _ => Vec::new(),
    };
    Ok(Value::List(values))
}
