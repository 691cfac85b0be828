// crates/conff-eval/src/evaluator/foreach.rs
//
// Parsing and validation of `foreach` directives, and the numeric generators
// shared with `F.linspace` / `F.arange`. Template expansion lives in the walker.

use super::errors::{EvalError, EvalResult, StructuralError, WalkResult};
use super::operators::MAX_SEQUENCE_LENGTH;
use crate::types::{Mapping, NodePath, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Linspace,
    Arange,
}

impl GeneratorKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linspace" => Some(GeneratorKind::Linspace),
            "arange" => Some(GeneratorKind::Arange),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GeneratorKind::Linspace => "linspace",
            GeneratorKind::Arange => "arange",
        }
    }

    /// Parameter names in call order; each entry lists accepted aliases.
    fn parameters(self) -> &'static [&'static [&'static str]] {
        match self {
            GeneratorKind::Linspace => &[&["start"], &["stop"], &["count", "num"]],
            GeneratorKind::Arange => &[&["start"], &["stop"], &["step"]],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSpec<'d> {
    pub kind: GeneratorKind,
    params: &'d Mapping,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValuesSource<'d> {
    Generator(GeneratorSpec<'d>),
    Sequence(&'d [Value]),
    Expression(&'d str),
}

/// A validated `foreach` directive borrowing from the document.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeachSpec<'d> {
    pub values: ValuesSource<'d>,
    pub template: &'d Mapping,
    pub key: Option<&'d str>,
}

fn malformed(path: &NodePath, message: impl Into<String>) -> StructuralError {
    StructuralError::MalformedForeach {
        path: path.clone(),
        message: message.into(),
    }
}

impl<'d> ForeachSpec<'d> {
    pub fn parse(directive: &'d Value, path: &NodePath) -> WalkResult<Self> {
        let fields = directive
            .as_map()
            .ok_or_else(|| malformed(path, "expected a mapping with 'values' and 'template'"))?;

        let values = match fields.get("values") {
            None => return Err(malformed(path, "missing 'values'")),
            Some(Value::Map(spec)) => ValuesSource::Generator(GeneratorSpec::parse(spec, path)?),
            Some(Value::List(items)) => ValuesSource::Sequence(items),
            Some(Value::Str(source)) => ValuesSource::Expression(source),
            Some(other) => {
                return Err(malformed(
                    path,
                    format!("'values' cannot be a {}", other.type_name()),
                ))
            }
        };

        let template = match fields.get("template") {
            None => return Err(malformed(path, "missing 'template'")),
            Some(Value::Map(t)) => t,
            Some(other) => {
                return Err(malformed(
                    path,
                    format!("'template' must be a mapping, not {}", other.type_name()),
                ))
            }
        };

        let key = match fields.get("key") {
            None | Some(Value::Null) => None,
            Some(Value::Str(k)) => Some(k.as_str()),
            Some(other) => {
                return Err(malformed(
                    path,
                    format!("'key' must be an expression string, not {}", other.type_name()),
                ))
            }
        };

        if let Some(unknown) = fields
            .keys()
            .find(|k| !matches!(k.as_str(), "values" | "template" | "key"))
        {
            return Err(malformed(path, format!("unknown field '{unknown}'")));
        }

        Ok(ForeachSpec {
            values,
            template,
            key,
        })
    }
}

impl<'d> GeneratorSpec<'d> {
    fn parse(spec: &'d Mapping, path: &NodePath) -> WalkResult<Self> {
        let kind_name = match spec.get("kind") {
            Some(Value::Str(k)) => k,
            Some(other) => {
                return Err(malformed(
                    path,
                    format!("generator 'kind' must be a string, not {}", other.type_name()),
                ))
            }
            None => return Err(malformed(path, "generator without 'kind'")),
        };
        let kind = GeneratorKind::from_name(kind_name).ok_or_else(|| {
            StructuralError::UnknownGenerator {
                path: path.clone(),
                kind: kind_name.clone(),
            }
        })?;
        for aliases in kind.parameters() {
            if !aliases.iter().any(|a| spec.contains_key(*a)) {
                return Err(StructuralError::MissingParameter {
                    path: path.clone(),
                    kind: kind.name().to_string(),
                    param: aliases[0].to_string(),
                });
            }
        }
        Ok(GeneratorSpec { kind, params: spec })
    }

    /// Produce the values. Expression-string parameters go through `eval`.
    pub fn generate<F>(&self, path: &NodePath, mut eval: F) -> WalkResult<Vec<Value>>
    where
        F: FnMut(&str) -> EvalResult<Value>,
    {
        let mut args = Vec::with_capacity(3);
        for aliases in self.kind.parameters() {
            let name = aliases[0];
            let raw = aliases
                .iter()
                .find_map(|a| self.params.get(*a))
                .unwrap_or(&Value::Null);
            let value = match raw {
                Value::Str(source) => eval(source).map_err(|e| {
                    malformed(path, format!("{} parameter '{name}': {e}", self.kind.name()))
                })?,
                other => other.clone(),
            };
            if !value.is_number() {
                return Err(malformed(
                    path,
                    format!(
                        "{} parameter '{name}' must be a number, got {}",
                        self.kind.name(),
                        value.repr()
                    ),
                ));
            }
            args.push(value);
        }
        let generated = match self.kind {
            GeneratorKind::Linspace => linspace(&args[0], &args[1], &args[2]),
            GeneratorKind::Arange => arange(&args[0], &args[1], &args[2]),
        };
        generated.map_err(|e| malformed(path, e.to_string()))
    }
}

fn number(v: &Value, what: &str) -> EvalResult<f64> {
    match v {
        Value::Int(_) | Value::Float(_) => v
            .as_f64()
            .ok_or_else(|| EvalError::Type(format!("{what} must be a number"))),
        other => Err(EvalError::Type(format!(
            "{what} must be a number, not {}",
            other.type_name()
        ))),
    }
}

fn check_count(count: usize) -> EvalResult<()> {
    if count > MAX_SEQUENCE_LENGTH {
        return Err(EvalError::Limit(format!(
            "{count} values exceed {MAX_SEQUENCE_LENGTH}"
        )));
    }
    Ok(())
}

/// `count` evenly spaced floats from `start` to `stop`, both ends included.
pub fn linspace(start: &Value, stop: &Value, count: &Value) -> EvalResult<Vec<Value>> {
    let start = number(start, "start")?;
    let stop = number(stop, "stop")?;
    let count = match count {
        Value::Int(n) if *n >= 0 => *n as usize,
        Value::Float(f) if f.fract() == 0.0 && *f >= 0.0 => *f as usize,
        other => {
            return Err(EvalError::Value(format!(
                "count must be a non-negative integer, got {}",
                other.repr()
            )))
        }
    };
    check_count(count)?;
    let values = match count {
        0 => Vec::new(),
        1 => vec![Value::Float(start)],
        n => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    if i == n - 1 {
                        Value::Float(stop)
                    } else {
                        Value::Float(start + step * i as f64)
                    }
                })
                .collect()
        }
    };
    Ok(values)
}

/// `start, start + step, ...` strictly before `stop`. Integers when every
/// argument is an integer.
pub fn arange(start: &Value, stop: &Value, step: &Value) -> EvalResult<Vec<Value>> {
    if let (Value::Int(a), Value::Int(b), Value::Int(s)) = (start, stop, step) {
        let (a, b, s) = (*a, *b, *s);
        if s == 0 {
            return Err(EvalError::Value("arange step must not be zero".into()));
        }
        let span = if s > 0 {
            b as i128 - a as i128
        } else {
            a as i128 - b as i128
        };
        let step_abs = s.unsigned_abs() as i128;
        let count = if span <= 0 {
            0
        } else {
            (span + step_abs - 1) / step_abs
        };
        if count > MAX_SEQUENCE_LENGTH as i128 {
            return Err(EvalError::Limit(format!(
                "{count} values exceed {MAX_SEQUENCE_LENGTH}"
            )));
        }
        let count = count as usize;
        return Ok((0..count as i64).map(|i| Value::Int(a + i * s)).collect());
    }

    let a = number(start, "start")?;
    let b = number(stop, "stop")?;
    let s = number(step, "step")?;
    if s == 0.0 {
        return Err(EvalError::Value("arange step must not be zero".into()));
    }
    let span = ((b - a) / s).ceil();
    let count = if span.is_finite() && span > 0.0 {
        span as usize
    } else {
        0
    };
    check_count(count)?;
    Ok((0..count).map(|i| Value::Float(a + s * i as f64)).collect())
}

/// Mapping key for one generated instance.
pub fn instance_key(value: &Value) -> Option<String> {
    match value {
        Value::Str(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Float(_) | Value::Bool(_) => Some(value.to_string()),
        _ => None,
    }
}
