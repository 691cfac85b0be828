// crates/conff-eval/src/evaluator/operators.rs

use std::cmp::Ordering;
use std::collections::HashMap;

use super::errors::{EvalError, EvalResult};
use crate::ast::{BinaryOp, CmpOp, Operator, UnaryOp};
use crate::types::Value;

/// Longest string or list an operator may produce.
pub const MAX_SEQUENCE_LENGTH: usize = 100_000;
/// Largest exponent accepted by `**`.
pub const MAX_POWER: i64 = 4_000_000;

/// Type for a binary operator handler: (left, right) -> result
pub type BinaryFn = fn(&Value, &Value) -> EvalResult<Value>;
/// Type for a unary operator handler: operand -> result
pub type UnaryFn = fn(&Value) -> EvalResult<Value>;

/// Dispatch table from operator to handler. An operator missing from the
/// table makes the evaluator fail with `UnsupportedOperator`.
#[derive(Clone)]
pub struct OperatorTable {
    binary: HashMap<BinaryOp, BinaryFn>,
    unary: HashMap<UnaryOp, UnaryFn>,
    compare: HashMap<CmpOp, BinaryFn>,
}

impl Default for OperatorTable {
    /// Arithmetic, comparison, membership, identity, `not` and unary sign.
    fn default() -> Self {
        let mut table = OperatorTable::empty();
        table.binary.insert(BinaryOp::Add, op_add as BinaryFn);
        table.binary.insert(BinaryOp::Sub, op_sub as BinaryFn);
        table.binary.insert(BinaryOp::Mult, op_mult as BinaryFn);
        table.binary.insert(BinaryOp::Div, op_div as BinaryFn);
        table.binary.insert(BinaryOp::FloorDiv, op_floordiv as BinaryFn);
        table.binary.insert(BinaryOp::Mod, op_mod as BinaryFn);
        table.binary.insert(BinaryOp::Pow, op_pow as BinaryFn);

        table.unary.insert(UnaryOp::USub, op_neg as UnaryFn);
        table.unary.insert(UnaryOp::UAdd, op_pos as UnaryFn);
        table.unary.insert(UnaryOp::Not, op_not as UnaryFn);

        table.compare.insert(CmpOp::Eq, cmp_eq as BinaryFn);
        table.compare.insert(CmpOp::NotEq, cmp_ne as BinaryFn);
        table.compare.insert(CmpOp::Lt, cmp_lt as BinaryFn);
        table.compare.insert(CmpOp::LtE, cmp_le as BinaryFn);
        table.compare.insert(CmpOp::Gt, cmp_gt as BinaryFn);
        table.compare.insert(CmpOp::GtE, cmp_ge as BinaryFn);
        table.compare.insert(CmpOp::In, cmp_in as BinaryFn);
        table.compare.insert(CmpOp::NotIn, cmp_not_in as BinaryFn);
        table.compare.insert(CmpOp::Is, cmp_is as BinaryFn);
        table.compare.insert(CmpOp::IsNot, cmp_is_not as BinaryFn);
        table
    }
}

impl OperatorTable {
    pub fn empty() -> Self {
        OperatorTable {
            binary: HashMap::new(),
            unary: HashMap::new(),
            compare: HashMap::new(),
        }
    }

    /// Default table plus integer bitwise operators and `~`.
    pub fn with_bitwise() -> Self {
        let mut table = OperatorTable::default();
        table.binary.insert(BinaryOp::BitAnd, op_bitand as BinaryFn);
        table.binary.insert(BinaryOp::BitOr, op_bitor as BinaryFn);
        table.binary.insert(BinaryOp::BitXor, op_bitxor as BinaryFn);
        table.binary.insert(BinaryOp::LShift, op_lshift as BinaryFn);
        table.binary.insert(BinaryOp::RShift, op_rshift as BinaryFn);
        table.unary.insert(UnaryOp::Invert, op_invert as UnaryFn);
        table
    }

    pub fn set_binary(&mut self, op: BinaryOp, handler: BinaryFn) {
        self.binary.insert(op, handler);
    }

    pub fn set_unary(&mut self, op: UnaryOp, handler: UnaryFn) {
        self.unary.insert(op, handler);
    }

    pub fn set_compare(&mut self, op: CmpOp, handler: BinaryFn) {
        self.compare.insert(op, handler);
    }

    pub fn remove(&mut self, op: Operator) {
        match op {
            Operator::Binary(b) => {
                self.binary.remove(&b);
            }
            Operator::Unary(u) => {
                self.unary.remove(&u);
            }
            Operator::Compare(c) => {
                self.compare.remove(&c);
            }
        }
    }

    pub fn supports(&self, op: Operator) -> bool {
        match op {
            Operator::Binary(b) => self.binary.contains_key(&b),
            Operator::Unary(u) => self.unary.contains_key(&u),
            Operator::Compare(c) => self.compare.contains_key(&c),
        }
    }

    pub fn binary(&self, op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
        match self.binary.get(&op) {
            Some(handler) => handler(left, right),
            None => Err(unsupported(Operator::Binary(op))),
        }
    }

    pub fn unary(&self, op: UnaryOp, operand: &Value) -> EvalResult<Value> {
        match self.unary.get(&op) {
            Some(handler) => handler(operand),
            None => Err(unsupported(Operator::Unary(op))),
        }
    }

    pub fn compare(&self, op: CmpOp, left: &Value, right: &Value) -> EvalResult<bool> {
        match self.compare.get(&op) {
            Some(handler) => Ok(handler(left, right)?.is_truthy()),
            None => Err(unsupported(Operator::Compare(op))),
        }
    }
}

fn unsupported(op: Operator) -> EvalError {
    EvalError::UnsupportedOperator(op.name().to_string())
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

fn num(v: &Value) -> Option<Num> {
    match v {
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Bool(b) => Some(Num::Int(*b as i64)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn as_float(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

fn operand_error(symbol: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::Type(format!(
        "unsupported operand type(s) for {symbol}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

fn overflow(symbol: &str) -> EvalError {
    EvalError::Overflow(format!("integer overflow in {symbol}"))
}

fn check_length(len: usize) -> EvalResult<()> {
    if len > MAX_SEQUENCE_LENGTH {
        return Err(EvalError::Limit(format!(
            "result length {len} exceeds {MAX_SEQUENCE_LENGTH}"
        )));
    }
    Ok(())
}

/// Shared numeric skeleton: integers with a checked op, everything else as floats.
fn arith(
    symbol: &str,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult<Value> {
    match (num(left), num(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => {
            int_op(a, b).map(Value::Int).ok_or_else(|| overflow(symbol))
        }
        (Some(a), Some(b)) => Ok(Value::Float(float_op(as_float(a), as_float(b)))),
        _ => Err(operand_error(symbol, left, right)),
    }
}

fn op_add(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => {
            check_length(a.len() + b.len())?;
            Ok(Value::Str(format!("{a}{b}")))
        }
        (Value::List(a), Value::List(b)) => {
            check_length(a.len() + b.len())?;
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            Ok(Value::List(out))
        }
        _ => arith("+", left, right, i64::checked_add, |a, b| a + b),
    }
}

fn op_sub(left: &Value, right: &Value) -> EvalResult<Value> {
    arith("-", left, right, i64::checked_sub, |a, b| a - b)
}

/// Copies needed for `unit * count`; an empty sequence stays empty whatever the count.
fn repeat_count(count: i64, unit: usize) -> EvalResult<usize> {
    if unit == 0 {
        return Ok(0);
    }
    let count = count.max(0) as usize;
    check_length(count.saturating_mul(unit))?;
    Ok(count)
}

fn op_mult(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            let count = repeat_count(*n, s.len())?;
            Ok(Value::Str(s.repeat(count)))
        }
        (Value::List(l), Value::Int(n)) | (Value::Int(n), Value::List(l)) => {
            let count = repeat_count(*n, l.len())?;
            let mut out = Vec::with_capacity(l.len() * count);
            for _ in 0..count {
                out.extend(l.iter().cloned());
            }
            Ok(Value::List(out))
        }
        _ => arith("*", left, right, i64::checked_mul, |a, b| a * b),
    }
}

fn op_div(left: &Value, right: &Value) -> EvalResult<Value> {
    match (num(left), num(right)) {
        (Some(a), Some(b)) => {
            let divisor = as_float(b);
            if divisor == 0.0 {
                return Err(EvalError::ZeroDivision("division by zero".into()));
            }
            Ok(Value::Float(as_float(a) / divisor))
        }
        _ => Err(operand_error("/", left, right)),
    }
}

fn op_floordiv(left: &Value, right: &Value) -> EvalResult<Value> {
    match (num(left), num(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => {
            if b == 0 {
                return Err(EvalError::ZeroDivision(
                    "integer division or modulo by zero".into(),
                ));
            }
            let q = a.checked_div(b).ok_or_else(|| overflow("//"))?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                Ok(Value::Int(q - 1))
            } else {
                Ok(Value::Int(q))
            }
        }
        (Some(a), Some(b)) => {
            let divisor = as_float(b);
            if divisor == 0.0 {
                return Err(EvalError::ZeroDivision("float floor division by zero".into()));
            }
            Ok(Value::Float((as_float(a) / divisor).floor()))
        }
        _ => Err(operand_error("//", left, right)),
    }
}

fn op_mod(left: &Value, right: &Value) -> EvalResult<Value> {
    match (num(left), num(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => {
            if b == 0 {
                return Err(EvalError::ZeroDivision(
                    "integer division or modulo by zero".into(),
                ));
            }
            let r = a.checked_rem(b).ok_or_else(|| overflow("%"))?;
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(Value::Int(r + b))
            } else {
                Ok(Value::Int(r))
            }
        }
        (Some(a), Some(b)) => {
            let (a, b) = (as_float(a), as_float(b));
            if b == 0.0 {
                return Err(EvalError::ZeroDivision("float modulo".into()));
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                Ok(Value::Float(r + b))
            } else {
                Ok(Value::Float(r))
            }
        }
        _ => Err(operand_error("%", left, right)),
    }
}

fn op_pow(left: &Value, right: &Value) -> EvalResult<Value> {
    let (base, exp) = match (num(left), num(right)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(operand_error("** or pow()", left, right)),
    };
    if as_float(exp).abs() > MAX_POWER as f64 {
        return Err(EvalError::Limit(format!(
            "exponent larger than {MAX_POWER}"
        )));
    }
    match (base, exp) {
        (Num::Int(a), Num::Int(b)) if b >= 0 => a
            .checked_pow(b as u32)
            .map(Value::Int)
            .ok_or_else(|| overflow("**")),
        (a, b) => {
            let (a, b) = (as_float(a), as_float(b));
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::ZeroDivision(
                    "0.0 cannot be raised to a negative power".into(),
                ));
            }
            let result = a.powf(b);
            if result.is_nan() {
                return Err(EvalError::Value("math domain error".into()));
            }
            Ok(Value::Float(result))
        }
    }
}

fn int_operands(symbol: &str, left: &Value, right: &Value) -> EvalResult<(i64, i64)> {
    match (left.as_i64(), right.as_i64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(operand_error(symbol, left, right)),
    }
}

fn op_bitand(left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = int_operands("&", left, right)?;
    Ok(Value::Int(a & b))
}

fn op_bitor(left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = int_operands("|", left, right)?;
    Ok(Value::Int(a | b))
}

fn op_bitxor(left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = int_operands("^", left, right)?;
    Ok(Value::Int(a ^ b))
}

fn shift_amount(b: i64) -> EvalResult<u32> {
    if b < 0 {
        return Err(EvalError::Value("negative shift count".into()));
    }
    u32::try_from(b).map_err(|_| overflow("shift"))
}

fn op_lshift(left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = int_operands("<<", left, right)?;
    let shift = shift_amount(b)?;
    let result = a.checked_shl(shift).ok_or_else(|| overflow("<<"))?;
    if result >> shift != a {
        return Err(overflow("<<"));
    }
    Ok(Value::Int(result))
}

fn op_rshift(left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = int_operands(">>", left, right)?;
    let shift = shift_amount(b)?.min(63);
    Ok(Value::Int(a >> shift))
}

fn op_neg(operand: &Value) -> EvalResult<Value> {
    match num(operand) {
        Some(Num::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(|| overflow("-")),
        Some(Num::Float(f)) => Ok(Value::Float(-f)),
        None => Err(EvalError::Type(format!(
            "bad operand type for unary -: '{}'",
            operand.type_name()
        ))),
    }
}

fn op_pos(operand: &Value) -> EvalResult<Value> {
    match num(operand) {
        Some(Num::Int(i)) => Ok(Value::Int(i)),
        Some(Num::Float(f)) => Ok(Value::Float(f)),
        None => Err(EvalError::Type(format!(
            "bad operand type for unary +: '{}'",
            operand.type_name()
        ))),
    }
}

fn op_not(operand: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(!operand.is_truthy()))
}

fn op_invert(operand: &Value) -> EvalResult<Value> {
    match operand.as_i64() {
        Some(i) => Ok(Value::Int(!i)),
        None => Err(EvalError::Type(format!(
            "bad operand type for unary ~: '{}'",
            operand.type_name()
        ))),
    }
}

/// Ordering for `<`-family comparisons; `None` when either side is NaN.
pub fn partial_order(left: &Value, right: &Value) -> EvalResult<Option<Ordering>> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                if x == y {
                    continue;
                }
                return partial_order(x, y);
            }
            Ok(Some(a.len().cmp(&b.len())))
        }
        _ => match (num(left), num(right)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(Some(a.cmp(&b))),
            (Some(a), Some(b)) => Ok(as_float(a).partial_cmp(&as_float(b))),
            _ => Err(EvalError::Type(format!(
                "comparison not supported between instances of '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn cmp_eq(left: &Value, right: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(left == right))
}

fn cmp_ne(left: &Value, right: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(left != right))
}

fn cmp_lt(left: &Value, right: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(partial_order(left, right)? == Some(Ordering::Less)))
}

fn cmp_le(left: &Value, right: &Value) -> EvalResult<Value> {
    let ord = partial_order(left, right)?;
    Ok(Value::Bool(matches!(
        ord,
        Some(Ordering::Less) | Some(Ordering::Equal)
    )))
}

fn cmp_gt(left: &Value, right: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(partial_order(left, right)? == Some(Ordering::Greater)))
}

fn cmp_ge(left: &Value, right: &Value) -> EvalResult<Value> {
    let ord = partial_order(left, right)?;
    Ok(Value::Bool(matches!(
        ord,
        Some(Ordering::Greater) | Some(Ordering::Equal)
    )))
}

fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Str(_), other) => Err(EvalError::Type(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::List(items), _) => Ok(items.iter().any(|v| v == item)),
        (Value::Map(m), Value::Str(key)) => Ok(m.contains_key(key)),
        (Value::Map(_), _) => Ok(false),
        (other, _) => Err(EvalError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn cmp_in(left: &Value, right: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(contains(right, left)?))
}

fn cmp_not_in(left: &Value, right: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(!contains(right, left)?))
}

/// Identity on plain data: same kind and same value for scalars; containers
/// are never identical to each other.
fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => false,
    }
}

fn cmp_is(left: &Value, right: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(identical(left, right)))
}

fn cmp_is_not(left: &Value, right: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(!identical(left, right)))
}
