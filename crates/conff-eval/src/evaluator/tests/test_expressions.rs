// crates/conff-eval/src/evaluator/tests/test_expressions.rs

use super::mapping;
use crate::evaluator::{EvalConfig, EvalError, Evaluator};
use crate::types::Value;
use pretty_assertions::assert_eq;

fn eval(source: &str) -> Result<Value, EvalError> {
    Evaluator::new(EvalConfig::default()).parse_expr(source)
}

fn ok(source: &str) -> Value {
    eval(source).unwrap_or_else(|e| panic!("{source:?} failed: {e}"))
}

#[test]
fn test_dict_literal_with_division_text() {
    let value = ok(r#"{"a": "a", "b": "1/0"}"#);
    let expected = mapping(&[("a", Value::from("a")), ("b", Value::from("1/0"))]);
    assert_eq!(value, Value::Map(expected));
}

#[test]
fn test_unparsable_and_blank_text_comes_back_unchanged() {
    assert_eq!(ok("hello world"), Value::from("hello world"));
    assert_eq!(ok("http://localhost:8080"), Value::from("http://localhost:8080"));
    assert_eq!(ok(""), Value::from(""));
    assert_eq!(ok("   "), Value::from("   "));
}

#[test]
fn test_literals() {
    assert_eq!(ok("42"), Value::Int(42));
    assert_eq!(ok("2.5"), Value::Float(2.5));
    assert_eq!(ok("'text'"), Value::from("text"));
    assert_eq!(ok("True"), Value::Bool(true));
    assert_eq!(ok("None"), Value::Null);
    assert_eq!(
        ok("[1, 'a', (2, 3)]"),
        Value::List(vec![
            Value::Int(1),
            Value::from("a"),
            Value::List(vec![Value::Int(2), Value::Int(3)]),
        ])
    );
}

#[test]
fn test_names_from_config() {
    let config = EvalConfig {
        names: mapping(&[("c", Value::Int(1)), ("d", Value::Int(2))]),
        ..EvalConfig::default()
    };
    let evaluator = Evaluator::new(config);
    assert_eq!(evaluator.parse_expr("c + d").unwrap(), Value::Int(3));
}

#[test]
fn test_params_are_under_p() {
    let config = EvalConfig {
        params: mapping(&[("env", Value::from("prod"))]),
        ..EvalConfig::default()
    };
    let evaluator = Evaluator::new(config);
    assert_eq!(evaluator.parse_expr("P.env").unwrap(), Value::from("prod"));
    assert!(matches!(
        evaluator.parse_expr("env"),
        Err(EvalError::Name(_))
    ));
}

#[test]
fn test_unknown_function_is_a_name_error() {
    assert!(matches!(eval("F.no_exist()"), Err(EvalError::Name(_))));
    assert!(matches!(eval("undefined_name"), Err(EvalError::Name(_))));
}

#[test]
fn test_only_named_functions_are_callable() {
    assert!(matches!(eval("(1)(2)"), Err(EvalError::NotCallable(_))));
    assert!(matches!(eval("[len][0]('x')"), Err(EvalError::NotCallable(_))));
}

#[test]
fn test_attribute_access_requires_a_mapping() {
    let config = EvalConfig {
        names: mapping(&[("s", Value::from("text"))]),
        ..EvalConfig::default()
    };
    let evaluator = Evaluator::new(config);
    assert!(matches!(
        evaluator.parse_expr("s.upper"),
        Err(EvalError::Name(_))
    ));
}

#[test]
fn test_subscripts() {
    assert_eq!(ok("[1, 2, 3][-1]"), Value::Int(3));
    assert_eq!(ok("'abc'[1]"), Value::from("b"));
    assert_eq!(ok("{'a': 1}['a']"), Value::Int(1));
    assert!(matches!(eval("[1][5]"), Err(EvalError::Index(_))));
    assert!(matches!(eval("{'a': 1}['b']"), Err(EvalError::Index(_))));
    assert!(matches!(eval("5[0]"), Err(EvalError::Type(_))));
}

#[test]
fn test_boolean_operators_return_operands() {
    assert_eq!(ok("True and 0"), Value::Int(0));
    assert_eq!(ok("0 or 'x'"), Value::from("x"));
    assert_eq!(ok("not 0"), Value::Bool(true));
    // the right side is never evaluated
    assert_eq!(ok("False and F.no_exist()"), Value::Bool(false));
    assert_eq!(ok("1 or F.no_exist()"), Value::Int(1));
}

#[test]
fn test_comparison_chains() {
    assert_eq!(ok("1 < 2 < 3"), Value::Bool(true));
    assert_eq!(ok("1 < 3 < 2"), Value::Bool(false));
    assert_eq!(ok("3 == 3.0"), Value::Bool(true));
    assert_eq!(ok("'a' in 'abc'"), Value::Bool(true));
    assert_eq!(ok("2 not in [1, 2]"), Value::Bool(false));
    assert_eq!(ok("'k' in {'k': 1}"), Value::Bool(true));
    assert_eq!(ok("None is None"), Value::Bool(true));
    assert!(matches!(eval("1 < 'a'"), Err(EvalError::Type(_))));
}

#[test]
fn test_conversion_builtins() {
    assert_eq!(ok("len('abc')"), Value::Int(3));
    assert_eq!(ok("len([1, 2])"), Value::Int(2));
    assert_eq!(ok("str(1.0)"), Value::from("1.0"));
    assert_eq!(ok("int('42')"), Value::Int(42));
    assert_eq!(ok("int(3.9)"), Value::Int(3));
    assert_eq!(ok("float('2.5')"), Value::Float(2.5));
    assert_eq!(ok("bool([])"), Value::Bool(false));
    assert_eq!(ok("abs(-3)"), Value::Int(3));
    assert!(matches!(eval("int('x')"), Err(EvalError::Value(_))));
    assert!(matches!(eval("len(1)"), Err(EvalError::Type(_))));
    assert!(matches!(
        eval("len()"),
        Err(EvalError::Arity { got: 0, .. })
    ));
}

#[test]
fn test_min_max_round() {
    assert_eq!(ok("max([3, 1, 2])"), Value::Int(3));
    assert_eq!(ok("min(3, 1.5)"), Value::Float(1.5));
    assert_eq!(ok("round(2.5)"), Value::Int(2));
    assert_eq!(ok("round(3.5)"), Value::Int(4));
    assert_eq!(ok("round(1.25, 1)"), Value::Float(1.2));
    assert!(matches!(eval("max([])"), Err(EvalError::Value(_))));
}

#[test]
fn test_string_helpers() {
    assert_eq!(ok("F.join(['1', '2', '3'], ' ')"), Value::from("1 2 3"));
    assert_eq!(ok("F.join([1, 2])"), Value::from("12"));
    assert_eq!(ok("F.upper('ro')"), Value::from("RO"));
    assert_eq!(ok("F.lower('RO')"), Value::from("ro"));
    assert_eq!(ok("F.replace('a-b-c', '-', '.')"), Value::from("a.b.c"));
    assert_eq!(
        ok("F.split('a b  c')"),
        Value::List(vec![Value::from("a"), Value::from("b"), Value::from("c")])
    );
    assert_eq!(
        ok("F.split('a,b', ',')"),
        Value::List(vec![Value::from("a"), Value::from("b")])
    );
    let joined = std::path::Path::new("ro").join("ro");
    assert_eq!(
        ok("F.path_join('ro', 'ro')"),
        Value::from(joined.to_string_lossy().as_ref())
    );
}

#[test]
fn test_format() {
    assert_eq!(ok("F.format('{}-{}', 'a', 1)"), Value::from("a-1"));
    assert_eq!(ok("F.format('{1}{0}', 'a', 'b')"), Value::from("ba"));
    assert_eq!(ok("F.format('{name}!', {'name': 'hi'})"), Value::from("hi!"));
    assert_eq!(ok("F.format('{{}}')"), Value::from("{}"));
    assert!(matches!(eval("F.format('{}')"), Err(EvalError::Index(_))));
}

#[test]
fn test_generators_as_functions() {
    assert_eq!(
        ok("F.linspace(0, 6, 3)"),
        Value::List(vec![
            Value::Float(0.0),
            Value::Float(3.0),
            Value::Float(6.0)
        ])
    );
    assert_eq!(
        ok("F.arange(0, 6, 4)"),
        Value::List(vec![Value::Int(0), Value::Int(4)])
    );
    assert_eq!(
        ok("F.arange(3)"),
        Value::List(vec![Value::Int(0), Value::Int(1), Value::Int(2)])
    );
    assert!(matches!(eval("F.arange(0, 5, 0)"), Err(EvalError::Value(_))));
}

#[test]
fn test_custom_function_registry() {
    use crate::evaluator::{Env, EvalResult, FunctionRegistry};

    fn double(_env: &Env<'_>, args: Vec<Value>) -> EvalResult<Value> {
        match args.as_slice() {
            [Value::Int(i)] => Ok(Value::Int(i * 2)),
            _ => Err(EvalError::Type("double() takes one int".into())),
        }
    }

    let mut functions = FunctionRegistry::new();
    functions.register("F.double", double);
    let evaluator = Evaluator::new(EvalConfig::default()).with_functions(functions);
    assert_eq!(evaluator.parse_expr("F.double(21)").unwrap(), Value::Int(42));
    assert!(matches!(
        evaluator.parse_expr("len('x')"),
        Err(EvalError::Name(_))
    ));
}

#[test]
fn test_deep_nesting_hits_the_limit_without_panicking() {
    let source = format!("{}1{}", "[".repeat(200), "]".repeat(200));
    // too deep to parse, so the text survives
    assert_eq!(ok(&source), Value::from(source.as_str()));
}

#[test]
fn test_functions_on_an_existing_evaluator() {
    use crate::evaluator::{Env, EvalResult, Posture};

    fn answer(_env: &Env<'_>, _args: Vec<Value>) -> EvalResult<Value> {
        Ok(Value::Int(42))
    }

    let mut evaluator = Evaluator::new(EvalConfig::default());
    assert_eq!(evaluator.posture(), Posture::Tolerant);
    assert_eq!(evaluator.crypto().etype(), "fernet");

    let functions = evaluator.functions_mut();
    assert!(functions.contains("F.upper"));
    assert!(functions.remove("F.upper").is_some());
    functions.register("F.answer", answer);
    assert!(functions.names().contains(&"F.answer"));
    assert!(!functions.names().contains(&"F.upper"));

    assert_eq!(evaluator.parse_expr("F.answer()").unwrap(), Value::Int(42));
    assert!(matches!(
        evaluator.parse_expr("F.upper('a')"),
        Err(EvalError::Name(_))
    ));
}

#[test]
fn test_long_flat_expressions_evaluate() {
    assert_eq!(ok(&vec!["1"; 100].join(" + ")), Value::Int(100));
    assert_eq!(ok(&vec!["'a'"; 70].join(" + ")), Value::from("a".repeat(70).as_str()));
    assert_eq!(ok(&vec!["3"; 80].join(" - ")), Value::Int(3 - 79 * 3));

    // oversized text is not parsed and survives as is
    let huge = vec!["1"; 300_000].join("+");
    assert_eq!(ok(&huge), Value::from(huge.as_str()));
}

#[test]
fn test_trailers_after_names_and_calls() {
    let servers = Value::List(vec![
        Value::Map(mapping(&[("host", Value::from("a"))])),
        Value::Map(mapping(&[
            ("host", Value::from("b")),
            ("ports", Value::List(vec![Value::Int(80), Value::Int(443)])),
        ])),
    ]);
    let config = EvalConfig {
        params: mapping(&[("servers", servers)]),
        ..EvalConfig::default()
    };
    let evaluator = Evaluator::new(config);
    assert_eq!(evaluator.parse_expr("P.servers[1].host").unwrap(), Value::from("b"));
    assert_eq!(
        evaluator.parse_expr("P.servers[1].ports[-1]").unwrap(),
        Value::Int(443)
    );
    assert_eq!(evaluator.parse_expr("F.upper('ab')[1]").unwrap(), Value::from("B"));
    assert_eq!(evaluator.parse_expr("[10, 20][0]").unwrap(), Value::Int(10));
    assert!(matches!(
        evaluator.parse_expr("P.servers[0].missing"),
        Err(EvalError::Name(_))
    ));
}
