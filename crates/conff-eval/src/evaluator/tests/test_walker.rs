// crates/conff-eval/src/evaluator/tests/test_walker.rs

use super::{resolve, yaml};
use crate::evaluator::{
    apply_update, deep_merge, ConffError, ErrorLog, EvalConfig, EvalError, Evaluator, Posture,
    StructuralError,
};
use crate::types::{Mapping, NodePath, Value};
use pretty_assertions::assert_eq;

fn strict_err(text: &str) -> StructuralError {
    let mut errors = ErrorLog::new();
    match Evaluator::new(EvalConfig::default()).parse_value(&yaml(text), &mut errors) {
        Err(ConffError::Structural(e)) => e,
        other => panic!("expected a structural error, got {other:?}"),
    }
}

const DOCUMENT: &str = r#"
data_1: [1, 2]
data_2:
  data2_1: 1
  data2_2: 2
  data2_3: 3
test_7:
  test_7_1: R.data_1
  test_7_2: "[1, 2]"
  test_7_3: R.data_2
test_8:
  extends: R.data_2
  data2_2: 22
  data2_4: 4
test_9:
  test_9_1: "[True, False, 1 == 1, 1 != 1]"
  test_9_2: "[1, F.upper('ro')]"
  test_9_3: "F.join(['1', '2', '3'], ' ')"
test_10: F.no_exist()
test_13:
  test_13_1: 1
  test_13_2: 2
  test_13_3: 3
  test_13_5:
    test_13_5_1: 1
  test_13_6:
    test_13_6_1: 1
test_14:
  extends: R.test_13
  test_13_1: 11
  test_13_4: 4
  update:
    test_13_5: 5
    test_13_6:
      test_13_6_2:
        test_13_6_2_1: 1
        test_13_6_2_2: 2
"#;

#[test]
fn test_full_document() {
    let (value, errors) = resolve(DOCUMENT);
    let expected = yaml(
        r#"
data_1: [1, 2]
data_2:
  data2_1: 1
  data2_2: 2
  data2_3: 3
test_7:
  test_7_1: [1, 2]
  test_7_2: [1, 2]
  test_7_3: {data2_1: 1, data2_2: 2, data2_3: 3}
test_8:
  data2_1: 1
  data2_2: 22
  data2_3: 3
  data2_4: 4
test_9:
  test_9_1: [true, false, true, false]
  test_9_2: [1, RO]
  test_9_3: 1 2 3
test_10: F.no_exist()
test_13:
  test_13_1: 1
  test_13_2: 2
  test_13_3: 3
  test_13_5:
    test_13_5_1: 1
  test_13_6:
    test_13_6_1: 1
test_14:
  test_13_1: 11
  test_13_2: 2
  test_13_3: 3
  test_13_5: 5
  test_13_6:
    test_13_6_1: 1
    test_13_6_2:
      test_13_6_2_1: 1
      test_13_6_2_2: 2
  test_13_4: 4
"#,
    );
    assert_eq!(value, expected);

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors.at(&NodePath::parse("test_10"))[..],
        [EvalError::Name(_)]
    ));
}

#[test]
fn test_extends_keeps_base_key_order() {
    let (value, _) = resolve(DOCUMENT);
    let test_14 = value.as_map().unwrap()["test_14"].as_map().unwrap();
    let keys: Vec<&str> = test_14.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["test_13_1", "test_13_2", "test_13_3", "test_13_5", "test_13_6", "test_13_4"]
    );
}

#[test]
fn test_extends_does_not_alias_the_base() {
    let (value, _) = resolve(
        r#"
base: {a: {x: 1}}
child:
  extends: R.base
  a: {y: 2}
"#,
    );
    assert_eq!(
        value,
        yaml("base: {a: {x: 1}}\nchild: {a: {x: 1, y: 2}}")
    );
}

#[test]
fn test_inline_extends_and_alias_keys() {
    let (value, errors) = resolve(
        r#"
inline:
  extends:
    host: localhost
    port: 80
  port: 8080
aliased:
  F.extend: R.inline
  F.update:
    port: S.port + 1
"#,
    );
    // `localhost` is an unbound name and stays text
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.entries()[0].path, NodePath::parse("inline.host"));
    assert_eq!(
        value,
        yaml(
            r#"
inline: {host: localhost, port: 8080}
aliased: {host: localhost, port: 8081}
"#
        )
    );
}

#[test]
fn test_own_children_see_the_base_through_s() {
    let (value, _) = resolve(
        r#"
defaults: {port: 80}
web:
  extends: R.defaults
  url: F.format('http://host:{}', S.port)
"#,
    );
    assert_eq!(
        value.as_map().unwrap()["web"],
        yaml("{port: 80, url: 'http://host:80'}")
    );
}

#[test]
fn test_update_with_dotted_keys() {
    let (value, _) = resolve(
        r#"
cfg:
  db: {host: a, port: 1}
  flag: 3
  update:
    db.port: 2
    flag.inner: 4
    new.deep.key: 5
"#,
    );
    assert_eq!(
        value,
        yaml(
            r#"
cfg:
  db: {host: a, port: 2}
  flag: {inner: 4}
  new: {deep: {key: 5}}
"#
        )
    );
}

#[test]
fn test_update_sees_own_keys() {
    let (value, _) = resolve(
        r#"
cfg:
  size: 2
  update:
    size: S.size * 10
"#,
    );
    assert_eq!(value, yaml("cfg: {size: 20}"));
}

#[test]
fn test_scalars_pass_through_and_lists_are_walked() {
    let (value, _) = resolve(
        r#"
int: 1
float: 1.5
bool: true
null_value: null
list: ["1 + 1", [2, "3 * 3"], {a: "4 - 1"}]
"#,
    );
    assert_eq!(
        value,
        yaml(
            r#"
int: 1
float: 1.5
bool: true
null_value: null
list: [2, [2, 9], {a: 3}]
"#
        )
    );
}

#[test]
fn test_root_scalar_and_list_documents() {
    let (value, _) = resolve("'1 + 2'");
    assert_eq!(value, Value::Int(3));
    let (value, _) = resolve("[1 + 2, x]");
    assert_eq!(value, Value::List(vec![Value::Int(3), Value::from("x")]));
}

#[test]
fn test_directive_conflicts() {
    let err = strict_err("x: {extends: R.a, import: other.yml}");
    assert!(matches!(err, StructuralError::InvalidDirective { .. }));
    let err = strict_err("x: {update: {a: 1}, F.update: {b: 2}}");
    assert!(matches!(err, StructuralError::InvalidDirective { .. }));
    let err = strict_err("x: {update: [1, 2]}");
    assert!(matches!(err, StructuralError::InvalidDirective { .. }));
    let err = strict_err("x: {extends: [1]}");
    assert!(matches!(err, StructuralError::InvalidDirective { .. }));
}

#[test]
fn test_unresolvable_extends() {
    let err = strict_err("x: {extends: R.missing}");
    assert!(matches!(
        &err,
        StructuralError::UnresolvedReference { reference, .. } if reference == "R.missing"
    ));
    let err = strict_err("a: 1\nx: {extends: R.a}");
    assert!(matches!(err, StructuralError::UnresolvedReference { .. }));
    assert_eq!(err.path(), &NodePath::parse("x"));
}

#[test]
fn test_tolerant_and_strict_postures() {
    let document = yaml("ok: 1\nbad: {extends: R.missing}");

    let mut errors = ErrorLog::new();
    let tolerant = Evaluator::new(EvalConfig::default());
    assert_eq!(tolerant.run(&document, &mut errors).unwrap(), None);
    assert!(errors.has_fatal());
    assert_eq!(errors.entries()[0].path, NodePath::parse("bad"));

    let strict = Evaluator::new(EvalConfig {
        posture: Posture::Strict,
        ..EvalConfig::default()
    });
    let mut errors = ErrorLog::new();
    assert!(matches!(
        strict.run(&document, &mut errors),
        Err(ConffError::Structural(StructuralError::UnresolvedReference { .. }))
    ));
    // strict runs return the error instead of logging it
    assert!(!errors.has_fatal());
}

#[test]
fn test_parse_text() {
    let mut errors = ErrorLog::new();
    let value = Evaluator::new(EvalConfig::default())
        .parse_text("a: 1 + 1\nb: R.a * 2\n", &mut errors)
        .unwrap();
    assert_eq!(value, yaml("a: 2\nb: 4"));
    assert!(matches!(
        Evaluator::new(EvalConfig::default()).parse_text("a: [", &mut errors),
        Err(ConffError::Load(_))
    ));
}

#[test]
fn test_merge_helpers() {
    let merged = deep_merge(yaml("{a: {x: 1, y: 2}, b: [1]}"), yaml("{a: {y: 3}, b: [2]}"));
    assert_eq!(merged, yaml("{a: {x: 1, y: 3}, b: [2]}"));

    let mut target: Mapping = match yaml("{a: 1}") {
        Value::Map(m) => m,
        _ => unreachable!(),
    };
    apply_update(&mut target, "b.c", Value::Int(2));
    assert_eq!(Value::Map(target), yaml("{a: 1, b: {c: 2}}"));
}

#[test]
fn test_set_path_builds_and_replaces_containers() {
    let mut tree = yaml("{a: 1, list: [x]}");
    tree.set_path(&NodePath::parse("b.c"), Value::Int(2));
    tree.set_path(&NodePath::parse("a.inner"), Value::Int(3));
    tree.set_path(&NodePath::root().key("list").index(2), Value::from("z"));
    tree.set_path(&NodePath::root().key("fresh").index(1).key("k"), Value::Bool(true));
    assert_eq!(
        tree,
        yaml("{a: {inner: 3}, list: [x, null, z], b: {c: 2}, fresh: [null, {k: true}]}")
    );
    assert_eq!(
        tree.get_path(&NodePath::root().key("fresh").index(1).key("k")),
        Some(&Value::Bool(true))
    );

    tree.set_path(&NodePath::root(), Value::Int(0));
    assert_eq!(tree, Value::Int(0));
}

#[test]
fn test_quoted_strings_resolve_to_plain_text() {
    let (value, errors) = resolve("test_1: \"'test_1'\"\ntest_2: 2\n");
    assert_eq!(value, yaml("test_1: test_1\ntest_2: 2"));
    assert!(errors.is_empty());
}

#[test]
fn test_division_by_zero_keeps_the_text() {
    let (value, errors) = resolve("a: a\nb: 1/0\n");
    assert_eq!(
        value,
        Value::Map(
            [("a", "a"), ("b", "1/0")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), Value::from(v)))
                .collect()
        )
    );
    assert!(matches!(
        errors.at(&NodePath::parse("b"))[..],
        [EvalError::ZeroDivision(_)]
    ));
    // the bare word `a` is an unbound name
    assert!(matches!(
        errors.at(&NodePath::parse("a"))[..],
        [EvalError::Name(_)]
    ));
    assert_eq!(errors.len(), 2);
    assert!(!errors.has_fatal());
}
