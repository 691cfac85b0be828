// crates/conff-eval/src/evaluator/tests/test_foreach.rs

use super::{resolve, yaml};
use crate::evaluator::foreach::{arange, linspace, ForeachSpec, GeneratorKind, ValuesSource};
use crate::evaluator::{ErrorLog, EvalConfig, EvalError, Evaluator, StructuralError};
use crate::types::{NodePath, Value};
use pretty_assertions::assert_eq;

fn walk_err(text: &str) -> StructuralError {
    let mut errors = ErrorLog::new();
    match Evaluator::new(EvalConfig::default()).parse_value(&yaml(text), &mut errors) {
        Err(crate::evaluator::ConffError::Structural(e)) => e,
        other => panic!("expected a structural error, got {other:?}"),
    }
}

#[test]
fn test_linspace_values() {
    let values = linspace(&Value::Int(0), &Value::Int(1), &Value::Int(5)).unwrap();
    assert_eq!(
        values,
        vec![
            Value::Float(0.0),
            Value::Float(0.25),
            Value::Float(0.5),
            Value::Float(0.75),
            Value::Float(1.0),
        ]
    );
    assert_eq!(
        linspace(&Value::Int(2), &Value::Int(9), &Value::Int(1)).unwrap(),
        vec![Value::Float(2.0)]
    );
    assert!(linspace(&Value::Int(0), &Value::Int(1), &Value::Int(0))
        .unwrap()
        .is_empty());
    assert!(matches!(
        linspace(&Value::Int(0), &Value::Int(1), &Value::Int(-1)),
        Err(EvalError::Value(_))
    ));
}

#[test]
fn test_arange_values() {
    assert_eq!(
        arange(&Value::Int(0), &Value::Int(7), &Value::Int(3)).unwrap(),
        vec![Value::Int(0), Value::Int(3), Value::Int(6)]
    );
    assert_eq!(
        arange(&Value::Int(5), &Value::Int(0), &Value::Int(-2)).unwrap(),
        vec![Value::Int(5), Value::Int(3), Value::Int(1)]
    );
    assert_eq!(
        arange(&Value::Int(0), &Value::Float(1.0), &Value::Float(0.5)).unwrap(),
        vec![Value::Float(0.0), Value::Float(0.5)]
    );
    assert!(arange(&Value::Int(3), &Value::Int(0), &Value::Int(1))
        .unwrap()
        .is_empty());
    assert!(matches!(
        arange(&Value::Int(0), &Value::Int(i64::MAX), &Value::Int(1)),
        Err(EvalError::Limit(_))
    ));
}

#[test]
fn test_parse_directive() {
    let directive = yaml(
        r#"
values:
  kind: arange
  start: 0
  stop: 3
  step: 1
key: "F.format('n{}', index)"
template:
  value: item
"#,
    );
    let spec = ForeachSpec::parse(&directive, &NodePath::root()).unwrap();
    match &spec.values {
        ValuesSource::Generator(generator) => assert_eq!(generator.kind, GeneratorKind::Arange),
        other => panic!("expected a generator, got {other:?}"),
    }
    assert_eq!(spec.key, Some("F.format('n{}', index)"));
    assert_eq!(spec.template.len(), 1);
}

#[test]
fn test_linspace_generator_with_key_expression() {
    let (value, errors) = resolve(
        r#"
test_15:
  foreach:
    values:
      kind: linspace
      start: 0
      stop: 6
      count: 3
    key: "F.format('test{}', index)"
    template:
      value: item
      length: len(values)
"#,
    );
    assert!(errors.is_empty(), "{:?}", errors.entries());
    assert_eq!(
        value,
        yaml(
            r#"
test_15:
  test0: {value: 0.0, length: 3}
  test1: {value: 3.0, length: 3}
  test2: {value: 6.0, length: 3}
"#
        )
    );
}

#[test]
fn test_arange_generator_with_default_keys() {
    let (value, _) = resolve(
        r#"
test_16:
  foreach:
    values: {kind: arange, start: 0, stop: 7, step: 3}
    template:
      value: item
test_17:
  foreach:
    values: {kind: arange, start: 0, stop: 6, step: 4}
    template:
      value: item * 10
"#,
    );
    assert_eq!(
        value,
        yaml(
            r#"
test_16:
  "0": {value: 0}
  "1": {value: 3}
  "2": {value: 6}
test_17:
  "0": {value: 0}
  "1": {value: 40}
"#
        )
    );
}

#[test]
fn test_generator_parameters_may_be_expressions() {
    let (value, _) = resolve(
        r#"
count: 2
grid:
  foreach:
    values: {kind: linspace, start: 0, stop: "R.count * 5", num: "R.count"}
    template:
      x: item
"#,
    );
    assert_eq!(
        value.as_map().unwrap()["grid"],
        yaml(r#"{"0": {x: 0.0}, "1": {x: 10.0}}"#)
    );
}

#[test]
fn test_values_from_list_and_expression() {
    let (value, errors) = resolve(
        r#"
base_port: 8000
listed:
  foreach:
    values: ["'web'", "'db'"]
    key: item
    template:
      port: R.base_port + index
computed:
  foreach:
    values: "F.arange(2)"
    key: "F.format('n{}', item)"
    template:
      doubled: item * 2
"#,
    );
    assert!(errors.is_empty(), "{:?}", errors.entries());
    assert_eq!(
        value,
        yaml(
            r#"
base_port: 8000
listed:
  web: {port: 8000}
  db: {port: 8001}
computed:
  n0: {doubled: 0}
  n1: {doubled: 2}
"#
        )
    );
}

#[test]
fn test_own_keys_override_generated_instances() {
    let (value, _) = resolve(
        r#"
servers:
  foreach:
    values: [1, 2]
    template:
      port: 8000 + item
      tls: False
  "1":
    tls: True
  extra: 1
"#,
    );
    assert_eq!(
        value,
        yaml(
            r#"
servers:
  "0": {port: 8001, tls: false}
  "1": {port: 8002, tls: true}
  extra: 1
"#
        )
    );
}

#[test]
fn test_template_sees_instance_through_s() {
    let (value, _) = resolve(
        r#"
hosts:
  F.foreach:
    values: ["'a'", "'b'"]
    key: item
    template:
      name: item
      url: F.format('http://{}/', S.name)
"#,
    );
    assert_eq!(
        value.as_map().unwrap()["hosts"],
        yaml("{a: {name: a, url: 'http://a/'}, b: {name: b, url: 'http://b/'}}")
    );
}

#[test]
fn test_duplicate_generated_key() {
    let err = walk_err(
        r#"
dup:
  foreach:
    values: [1, 2]
    key: "'same'"
    template: {v: item}
"#,
    );
    assert_eq!(
        err,
        StructuralError::DuplicateKey {
            path: NodePath::parse("dup"),
            key: "same".into(),
        }
    );
}

#[test]
fn test_failing_key_expression() {
    let err = walk_err(
        r#"
bad:
  foreach:
    values: [1]
    key: F.nope(item)
    template: {v: item}
"#,
    );
    assert!(matches!(err, StructuralError::UnresolvedReference { .. }));
}

#[test]
fn test_malformed_directives() {
    let cases = [
        "x: {foreach: {template: {a: 1}}}",
        "x: {foreach: {values: [1]}}",
        "x: {foreach: {values: [1], template: [1]}}",
        "x: {foreach: {values: [1], template: {a: 1}, key: 3}}",
        "x: {foreach: {values: [1], template: {a: 1}, extra: 1}}",
        "x: {foreach: {values: 12, template: {a: 1}}}",
        "x: {foreach: {values: F.nope(), template: {a: 1}}}",
        "x: {foreach: {values: \"'text'\", template: {a: 1}}}",
        "x: {foreach: {values: {kind: arange, start: 0, stop: 5, step: 0}, template: {a: 1}}}",
        "x: {foreach: {values: {start: 0}, template: {a: 1}}}",
    ];
    for case in cases {
        let err = walk_err(case);
        assert!(
            matches!(err, StructuralError::MalformedForeach { .. }),
            "{case}: {err:?}"
        );
        assert_eq!(err.path(), &NodePath::parse("x"));
    }
}

#[test]
fn test_generator_errors() {
    let err = walk_err("x: {foreach: {values: {kind: logspace, start: 0}, template: {a: 1}}}");
    assert_eq!(
        err,
        StructuralError::UnknownGenerator {
            path: NodePath::parse("x"),
            kind: "logspace".into(),
        }
    );

    let err = walk_err("x: {foreach: {values: {kind: arange, start: 0, stop: 5}, template: {a: 1}}}");
    assert_eq!(
        err,
        StructuralError::MissingParameter {
            path: NodePath::parse("x"),
            kind: "arange".into(),
            param: "step".into(),
        }
    );

    let err = walk_err("x: {foreach: {values: {kind: linspace, start: 0, stop: 1}, template: {a: 1}}}");
    assert_eq!(
        err,
        StructuralError::MissingParameter {
            path: NodePath::parse("x"),
            kind: "linspace".into(),
            param: "count".into(),
        }
    );
}

#[test]
fn test_foreach_fails_before_its_siblings_are_evaluated() {
    let text = r#"
x:
  y: F.nope()
  foreach:
    values: {kind: linspace, start: 0, stop: 1}
    template: {a: 1}
"#;
    let err = walk_err(text);
    assert!(matches!(
        &err,
        StructuralError::MissingParameter { param, .. } if param == "count"
    ));

    let mut errors = ErrorLog::new();
    let result = Evaluator::new(EvalConfig::default())
        .run(&yaml(text), &mut errors)
        .unwrap();
    assert_eq!(result, None);
    assert_eq!(errors.len(), 1);
    assert!(errors.has_fatal());
    assert!(errors.at(&NodePath::parse("x.y")).is_empty());
}

#[test]
fn test_foreach_errors_are_logged_in_tolerant_mode() {
    let mut errors = ErrorLog::new();
    let result = Evaluator::new(EvalConfig::default())
        .run(&yaml("x: {foreach: {values: [1]}}"), &mut errors)
        .unwrap();
    assert_eq!(result, None);
    assert!(errors.has_fatal());
}
