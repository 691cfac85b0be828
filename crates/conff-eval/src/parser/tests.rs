// crates/conff-eval/src/parser/tests.rs

use crate::ast::{BinaryOp, BoolOp, CmpOp, Expr, UnaryOp};
use crate::ast::ParseError;
use crate::parser::{parse_expression, MAX_DEPTH, MAX_SOURCE_LEN, MAX_TRAILERS};
use pretty_assertions::assert_eq;

fn name(n: &str) -> Expr {
    Expr::Name(n.to_string())
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn chain(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    Expr::Chain {
        first: Box::new(first),
        rest,
    }
}

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    let expr = parse_expression("1 + 2 * 3").unwrap();
    assert_eq!(
        expr,
        chain(
            Expr::Int(1),
            vec![(
                BinaryOp::Add,
                chain(Expr::Int(2), vec![(BinaryOp::Mult, Expr::Int(3))])
            )]
        )
    );
}

#[test]
fn test_one_precedence_level_is_one_flat_chain() {
    let expr = parse_expression("a - b + c - d").unwrap();
    assert_eq!(
        expr,
        chain(
            name("a"),
            vec![
                (BinaryOp::Sub, name("b")),
                (BinaryOp::Add, name("c")),
                (BinaryOp::Sub, name("d")),
            ]
        )
    );
    assert_eq!(parse_expression("a").unwrap(), name("a"));
}

#[test]
fn test_long_chains_do_not_nest() {
    let source = vec!["1"; 30_000].join("+");
    match parse_expression(&source).unwrap() {
        Expr::Chain { first, rest } => {
            assert_eq!(*first, Expr::Int(1));
            assert_eq!(rest.len(), 29_999);
        }
        other => panic!("expected a chain, got {other:?}"),
    }
}

#[test]
fn test_oversized_source_is_rejected() {
    let source = vec!["1"; MAX_SOURCE_LEN].join("+");
    assert_eq!(
        parse_expression(&source).unwrap_err(),
        ParseError::TooLong {
            limit: MAX_SOURCE_LEN
        }
    );
}

#[test]
fn test_trailer_limit() {
    let ok = format!("R{}", ".a".repeat(MAX_TRAILERS));
    assert!(parse_expression(&ok).is_ok());
    let too_long = format!("R{}", ".a".repeat(MAX_TRAILERS + 1));
    let err = parse_expression(&too_long).unwrap_err();
    assert!(err.to_string().contains("trailers"));
}

#[test]
fn test_power_is_right_associative_and_beats_unary_minus() {
    let expr = parse_expression("-2 ** 3 ** 2").unwrap();
    assert_eq!(
        expr,
        Expr::Unary {
            op: UnaryOp::USub,
            operand: Box::new(binary(
                BinaryOp::Pow,
                Expr::Int(2),
                binary(BinaryOp::Pow, Expr::Int(3), Expr::Int(2))
            )),
        }
    );
}

#[test]
fn test_comparison_chain() {
    let expr = parse_expression("1 < x <= 3").unwrap();
    assert_eq!(
        expr,
        Expr::Compare {
            left: Box::new(Expr::Int(1)),
            ops: vec![(CmpOp::Lt, name("x")), (CmpOp::LtE, Expr::Int(3))],
        }
    );
}

#[test]
fn test_not_in_and_is_not() {
    let expr = parse_expression("a not in b").unwrap();
    assert_eq!(
        expr,
        Expr::Compare {
            left: Box::new(name("a")),
            ops: vec![(CmpOp::NotIn, name("b"))],
        }
    );
    let expr = parse_expression("a is not None").unwrap();
    assert_eq!(
        expr,
        Expr::Compare {
            left: Box::new(name("a")),
            ops: vec![(CmpOp::IsNot, Expr::Null)],
        }
    );
}

#[test]
fn test_boolean_operators_collect_operands() {
    let expr = parse_expression("a or b and not c or d").unwrap();
    assert_eq!(
        expr,
        Expr::Logical {
            op: BoolOp::Or,
            values: vec![
                name("a"),
                Expr::Logical {
                    op: BoolOp::And,
                    values: vec![
                        name("b"),
                        Expr::Unary {
                            op: UnaryOp::Not,
                            operand: Box::new(name("c")),
                        },
                    ],
                },
                name("d"),
            ],
        }
    );
}

#[test]
fn test_call_on_dotted_name() {
    let expr = parse_expression("F.join(['a', 'b'], ' ')").unwrap();
    match expr {
        Expr::Call { func, args } => {
            assert_eq!(func.dotted_name().as_deref(), Some("F.join"));
            assert_eq!(args.len(), 2);
            assert_eq!(
                args[0],
                Expr::List(vec![Expr::Str("a".into()), Expr::Str("b".into())])
            );
        }
        other => panic!("expected a call, got {other:?}"),
    }
}

#[test]
fn test_subscript_after_attribute() {
    let expr = parse_expression("R.items[1]").unwrap();
    assert_eq!(
        expr,
        Expr::Subscript {
            value: Box::new(Expr::Attribute {
                value: Box::new(name("R")),
                attr: "items".into(),
            }),
            index: Box::new(Expr::Int(1)),
        }
    );
}

#[test]
fn test_dict_literal_keeps_order() {
    let expr = parse_expression(r#"{"a": "a", "b": "1/0",}"#).unwrap();
    assert_eq!(
        expr,
        Expr::Dict(vec![
            (Expr::Str("a".into()), Expr::Str("a".into())),
            (Expr::Str("b".into()), Expr::Str("1/0".into())),
        ])
    );
}

#[test]
fn test_tuples() {
    assert_eq!(parse_expression("()").unwrap(), Expr::Tuple(vec![]));
    assert_eq!(parse_expression("(1)").unwrap(), Expr::Int(1));
    assert_eq!(
        parse_expression("(1,)").unwrap(),
        Expr::Tuple(vec![Expr::Int(1)])
    );
    assert_eq!(
        parse_expression("1, 2").unwrap(),
        Expr::Tuple(vec![Expr::Int(1), Expr::Int(2)])
    );
}

#[test]
fn test_bitwise_operators_parse() {
    let expr = parse_expression("1 | 2 & 3").unwrap();
    assert_eq!(
        expr,
        chain(
            Expr::Int(1),
            vec![(
                BinaryOp::BitOr,
                chain(Expr::Int(2), vec![(BinaryOp::BitAnd, Expr::Int(3))])
            )]
        )
    );
    assert!(matches!(
        parse_expression("~x").unwrap(),
        Expr::Unary {
            op: UnaryOp::Invert,
            ..
        }
    ));
}

#[test]
fn test_plain_text_does_not_parse() {
    assert!(parse_expression("hello world").is_err());
    assert!(parse_expression("http://example.com").is_err());
    assert!(parse_expression("").is_err());
    assert!(parse_expression("a +").is_err());
    assert!(parse_expression("f(1, 2").is_err());
}

#[test]
fn test_nesting_limit() {
    let ok = format!("{}1{}", "(".repeat(MAX_DEPTH - 2), ")".repeat(MAX_DEPTH - 2));
    assert!(parse_expression(&ok).is_ok());
    let too_deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
    let err = parse_expression(&too_deep).unwrap_err();
    assert!(err.to_string().contains("nested"));
}
