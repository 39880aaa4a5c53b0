//! The operator protocol for plain data values. Instances of user and
//! built-in classes are dispatched by the interpreter before reaching here.

use super::errors::ErrorKind;
use super::value::{ArrayRef, Number, Value};
use crate::radon_frontend::operator::{BinaryOperator, UnaryOperator};

type OpResult<T = Value> = Result<T, ErrorKind>;

/// Longest string (in bytes) or array that `*` repetition may build.
pub const MAX_REPEAT_LEN: usize = 1 << 28;

/// Division by a zero number fails the same way whatever the dividend is.
pub fn divides_by_zero(op: BinaryOperator, rhs: &Value) -> bool {
    matches!(
        op,
        BinaryOperator::Divide | BinaryOperator::IntDivide | BinaryOperator::Modulo
    ) && matches!(rhs, Value::Number(n) if n.is_zero())
}

pub fn binary_op(op: BinaryOperator, lhs: &Value, rhs: &Value) -> OpResult {
    if divides_by_zero(op, rhs) {
        return Err(ErrorKind::DivisionByZero);
    }
    match op {
        BinaryOperator::Add => add(lhs, rhs),
        BinaryOperator::Subtract => numerical_binop(op, lhs, rhs, arith_sub),
        BinaryOperator::Multiply => multiply(lhs, rhs),
        BinaryOperator::Divide => numerical_binop(op, lhs, rhs, |a, b| {
            Ok(Number::Float(a.as_f64() / b.as_f64()))
        }),
        BinaryOperator::IntDivide => numerical_binop(op, lhs, rhs, floor_div),
        BinaryOperator::Modulo => numerical_binop(op, lhs, rhs, modulo),
        BinaryOperator::Power => numerical_binop(op, lhs, rhs, power),
        BinaryOperator::EqualTo => Ok(Value::Boolean(lhs == rhs)),
        BinaryOperator::NotEqualTo => Ok(Value::Boolean(lhs != rhs)),
        BinaryOperator::LessThan
        | BinaryOperator::LessEq
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterEq => compare(op, lhs, rhs),
        BinaryOperator::In => contains(rhs, lhs).map(Value::Boolean),
    }
}

pub fn unary_op(op: UnaryOperator, value: &Value) -> OpResult {
    match (op, value) {
        (UnaryOperator::Negate, Value::Number(Number::Int(n))) => Ok(match n.checked_neg() {
            Some(n) => Value::int(n),
            None => Value::float(-(*n as f64)),
        }),
        (UnaryOperator::Negate, Value::Number(Number::Float(n))) => Ok(Value::float(-n)),
        (UnaryOperator::Plus, Value::Number(_)) => Ok(value.clone()),
        (UnaryOperator::LogicalNot, _) => Ok(Value::Boolean(!value.is_true())),
        _ => Err(ErrorKind::illegal_unary(op.symbol(), value)),
    }
}

fn add(lhs: &Value, rhs: &Value) -> OpResult {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => arith_add(*a, *b).map(Value::Number),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (Value::String(s), Value::Number(n)) => Ok(Value::String(format!("{}{}", s, n))),
        (Value::Number(n), Value::String(s)) => Ok(Value::String(format!("{}{}", n, s))),
        (Value::Array(a), Value::Array(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::array(items))
        }
        (Value::HashMap(a), Value::HashMap(b)) => {
            let mut merged = a.borrow().clone();
            merged.extend(b.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Value::hashmap(merged))
        }
        _ => Err(ErrorKind::illegal_binary("+", lhs, rhs)),
    }
}

fn multiply(lhs: &Value, rhs: &Value) -> OpResult {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => arith_mul(*a, *b).map(Value::Number),
        (Value::String(s), Value::Number(Number::Int(n))) => {
            let times = repeat_count(s.len(), *n)?;
            Ok(Value::String(s.repeat(times)))
        }
        (Value::Array(items), Value::Number(Number::Int(n))) => {
            let items = items.borrow();
            let times = repeat_count(items.len(), *n)?;
            let mut repeated = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                repeated.extend(items.iter().cloned());
            }
            Ok(Value::array(repeated))
        }
        _ => Err(ErrorKind::illegal_binary("*", lhs, rhs)),
    }
}

/// How many copies `len * n` repetition makes. Negative counts give none.
fn repeat_count(len: usize, n: i64) -> OpResult<usize> {
    if len == 0 {
        return Ok(0);
    }
    let times = usize::try_from(n.max(0)).unwrap_or(usize::MAX);
    match len.checked_mul(times) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(times),
        _ => Err(ErrorKind::InvalidValue("Repetition result too large".to_owned())),
    }
}

fn numerical_binop<F>(op: BinaryOperator, lhs: &Value, rhs: &Value, func: F) -> OpResult
where
    F: Fn(Number, Number) -> OpResult<Number>,
{
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => func(*a, *b).map(Value::Number),
        (a, b) => Err(ErrorKind::illegal_binary(op.symbol(), a, b)),
    }
}

pub fn arith_add(a: Number, b: Number) -> OpResult<Number> {
    Ok(match (a, b) {
        (Number::Int(a), Number::Int(b)) => match a.checked_add(b) {
            Some(n) => Number::Int(n),
            None => Number::Float(a as f64 + b as f64),
        },
        (a, b) => Number::Float(a.as_f64() + b.as_f64()),
    })
}

fn arith_sub(a: Number, b: Number) -> OpResult<Number> {
    Ok(match (a, b) {
        (Number::Int(a), Number::Int(b)) => match a.checked_sub(b) {
            Some(n) => Number::Int(n),
            None => Number::Float(a as f64 - b as f64),
        },
        (a, b) => Number::Float(a.as_f64() - b.as_f64()),
    })
}

fn arith_mul(a: Number, b: Number) -> OpResult<Number> {
    Ok(match (a, b) {
        (Number::Int(a), Number::Int(b)) => match a.checked_mul(b) {
            Some(n) => Number::Int(n),
            None => Number::Float(a as f64 * b as f64),
        },
        (a, b) => Number::Float(a.as_f64() * b.as_f64()),
    })
}

/// Callers have already rejected a zero divisor.
fn floor_div(a: Number, b: Number) -> OpResult<Number> {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => {
            let quotient = match a.checked_div(b) {
                Some(q) => q,
                None => return Ok(Number::Float((a as f64 / b as f64).floor())),
            };
            let rem = a % b;
            let floored = if rem != 0 && ((a < 0) != (b < 0)) {
                quotient - 1
            } else {
                quotient
            };
            Ok(Number::Int(floored))
        }
        (a, b) => Ok(Number::Float((a.as_f64() / b.as_f64()).floor())),
    }
}

/// The result takes the sign of the divisor.
fn modulo(a: Number, b: Number) -> OpResult<Number> {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => {
            let rem = a.checked_rem(b).unwrap_or(0);
            if rem != 0 && ((rem < 0) != (b < 0)) {
                Ok(Number::Int(rem + b))
            } else {
                Ok(Number::Int(rem))
            }
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let rem = a % b;
            if rem != 0.0 && ((rem < 0.0) != (b < 0.0)) {
                Ok(Number::Float(rem + b))
            } else {
                Ok(Number::Float(rem))
            }
        }
    }
}

fn power(a: Number, b: Number) -> OpResult<Number> {
    if let (Number::Int(base), Number::Int(exp)) = (a, b) {
        if exp >= 0 {
            let checked = u32::try_from(exp).ok().and_then(|exp| base.checked_pow(exp));
            if let Some(n) = checked {
                return Ok(Number::Int(n));
            }
        }
    }
    Ok(Number::Float(a.as_f64().powf(b.as_f64())))
}

fn compare(op: BinaryOperator, lhs: &Value, rhs: &Value) -> OpResult {
    use std::cmp::Ordering;

    let ordering = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => return Err(ErrorKind::illegal_binary(op.symbol(), lhs, rhs)),
    };

    let result = match (op, ordering) {
        (_, None) => false,
        (BinaryOperator::LessThan, Some(o)) => o == Ordering::Less,
        (BinaryOperator::LessEq, Some(o)) => o != Ordering::Greater,
        (BinaryOperator::GreaterThan, Some(o)) => o == Ordering::Greater,
        (BinaryOperator::GreaterEq, Some(o)) => o != Ordering::Less,
        _ => false,
    };
    Ok(Value::Boolean(result))
}

/// Membership test; `container` is the right operand of `in`.
pub fn contains(container: &Value, item: &Value) -> OpResult<bool> {
    match (container, item) {
        (Value::Array(items), _) => Ok(items.borrow().iter().any(|v| v == item)),
        (Value::String(s), Value::String(sub)) => Ok(s.contains(sub.as_str())),
        (Value::HashMap(map), Value::String(key)) => Ok(map.borrow().contains_key(key)),
        _ => Err(ErrorKind::illegal_binary("in", item, container)),
    }
}

/// Resolves a possibly negative index against a length.
pub fn resolve_index(index: &Value, len: usize, what: &str) -> OpResult<usize> {
    let raw = expect_index(index)?;
    let resolved = if raw < 0 { raw + len as i64 } else { raw };
    if resolved < 0 || resolved >= len as i64 {
        return Err(ErrorKind::IndexOutOfBounds(format!(
            "Index {} is out of bounds for {} of length {}",
            raw, what, len
        )));
    }
    Ok(resolved as usize)
}

pub fn expect_index(index: &Value) -> OpResult<i64> {
    match index {
        Value::Number(n) => n.as_int().ok_or_else(|| {
            ErrorKind::TypeMismatch(format!("Index must be an integer, got {}", n))
        }),
        other => Err(ErrorKind::TypeMismatch(format!(
            "Index must be an integer, got {}",
            other.type_name()
        ))),
    }
}

pub fn map_key(key: &Value) -> OpResult<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        other => Err(ErrorKind::TypeMismatch(format!(
            "HashMap keys must be strings, got {}",
            other.type_name()
        ))),
    }
}

pub fn get_index(target: &Value, index: &Value) -> OpResult {
    match target {
        Value::Array(items) => {
            let items = items.borrow();
            let idx = resolve_index(index, items.len(), "array")?;
            Ok(items[idx].clone())
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let idx = resolve_index(index, chars.len(), "string")?;
            Ok(Value::String(chars[idx].to_string()))
        }
        Value::HashMap(map) => {
            let key = map_key(index)?;
            map.borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| ErrorKind::KeyNotFound(format!("{:?}", key)))
        }
        _ => Err(ErrorKind::illegal_binary("[]", target, index)),
    }
}

pub fn set_index(target: &Value, index: &Value, value: Value) -> OpResult<()> {
    match target {
        Value::Array(items) => {
            let len = items.borrow().len();
            let idx = resolve_index(index, len, "array")?;
            items.borrow_mut()[idx] = value;
            Ok(())
        }
        Value::HashMap(map) => {
            let key = map_key(index)?;
            map.borrow_mut().insert(key, value);
            Ok(())
        }
        _ => Err(ErrorKind::illegal_binary("[]=", target, index)),
    }
}

/// Python slice semantics: bounds are clamped and a negative step walks
/// backwards.
pub fn slice(
    target: &Value,
    start: Option<&Value>,
    end: Option<&Value>,
    step: Option<&Value>,
) -> OpResult {
    let step = match step {
        Some(step) => expect_index(step)?,
        None => 1,
    };
    if step == 0 {
        return Err(ErrorKind::InvalidValue("Slice step cannot be zero".to_owned()));
    }

    match target {
        Value::Array(items) => {
            let items = items.borrow();
            let picked = slice_indices(items.len(), start, end, step)?;
            Ok(Value::array(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked = slice_indices(chars.len(), start, end, step)?;
            Ok(Value::String(picked.into_iter().map(|i| chars[i]).collect()))
        }
        other => Err(ErrorKind::illegal_unary("[:]", other)),
    }
}

fn slice_indices(
    len: usize,
    start: Option<&Value>,
    end: Option<&Value>,
    step: i64,
) -> OpResult<Vec<usize>> {
    let len = len as i64;
    let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };

    let clamp = |bound: Option<&Value>, default: i64| -> OpResult<i64> {
        match bound {
            None | Some(Value::Null) => Ok(default),
            Some(value) => {
                let raw = expect_index(value)?;
                Ok(if raw < 0 {
                    std::cmp::max(raw + len, lower)
                } else {
                    std::cmp::min(raw, upper)
                })
            }
        }
    };

    let start = clamp(start, if step > 0 { lower } else { upper })?;
    let end = clamp(end, if step > 0 { upper } else { lower })?;

    let mut picked = vec![];
    let mut i = start;
    while (step > 0 && i < end) || (step < 0 && i > end) {
        picked.push(i as usize);
        i += step;
    }
    Ok(picked)
}

/// A snapshot of the items of an iterable. Maps yield their keys.
pub fn iterate(value: &Value) -> OpResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.borrow().clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        Value::HashMap(map) => Ok(map.borrow().keys().map(|k| Value::str(k)).collect()),
        other => Err(ErrorKind::NotIterable(other.type_name())),
    }
}

/// The sequence a `for ... in` loop walks. An array is read by index on
/// every step, so the body sees its own appends and removals. Strings and
/// map keys are taken up front.
pub enum LoopItems {
    Live { items: ArrayRef, next: usize },
    Snapshot(std::vec::IntoIter<Value>),
}

impl Iterator for LoopItems {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            LoopItems::Live { items, next } => {
                let item = items.borrow().get(*next).cloned()?;
                *next += 1;
                Some(item)
            }
            LoopItems::Snapshot(items) => items.next(),
        }
    }
}

pub fn loop_items(value: &Value) -> OpResult<LoopItems> {
    match value {
        Value::Array(items) => Ok(LoopItems::Live {
            items: items.clone(),
            next: 0,
        }),
        other => iterate(other).map(|items| LoopItems::Snapshot(items.into_iter())),
    }
}

pub fn length(value: &Value) -> OpResult<usize> {
    match value {
        Value::String(s) => Ok(s.chars().count()),
        Value::Array(items) => Ok(items.borrow().len()),
        Value::HashMap(map) => Ok(map.borrow().len()),
        other => Err(ErrorKind::TypeMismatch(format!(
            "{} has no length",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: BinaryOperator, lhs: Value, rhs: Value) -> OpResult {
        binary_op(op, &lhs, &rhs)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(bin(BinaryOperator::Add, Value::int(1), Value::int(2)).unwrap(), Value::int(3));
        assert_eq!(
            bin(BinaryOperator::Divide, Value::int(7), Value::int(2)).unwrap().to_string(),
            "3.5"
        );
        assert_eq!(
            bin(BinaryOperator::Divide, Value::int(6), Value::int(2)).unwrap().to_string(),
            "3.0"
        );
        assert_eq!(bin(BinaryOperator::IntDivide, Value::int(-7), Value::int(2)).unwrap(), Value::int(-4));
        assert_eq!(bin(BinaryOperator::Modulo, Value::int(-7), Value::int(3)).unwrap(), Value::int(2));
        assert_eq!(bin(BinaryOperator::Modulo, Value::int(7), Value::int(-3)).unwrap(), Value::int(-2));
        assert_eq!(
            bin(BinaryOperator::Power, Value::int(2), Value::int(10)).unwrap().to_string(),
            "1024"
        );
        assert_eq!(
            bin(BinaryOperator::Power, Value::int(2), Value::int(-1)).unwrap().to_string(),
            "0.5"
        );
    }

    #[test]
    fn test_division_by_zero() {
        for op in [BinaryOperator::Divide, BinaryOperator::IntDivide, BinaryOperator::Modulo] {
            assert_eq!(bin(op, Value::int(1), Value::int(0)), Err(ErrorKind::DivisionByZero));
            assert_eq!(bin(op, Value::float(1.5), Value::float(0.0)), Err(ErrorKind::DivisionByZero));
            assert_eq!(bin(op, Value::str("abc"), Value::int(0)), Err(ErrorKind::DivisionByZero));
            assert_eq!(
                bin(op, Value::array(vec![Value::int(1)]), Value::int(0)),
                Err(ErrorKind::DivisionByZero)
            );
            assert_eq!(bin(op, Value::Null, Value::float(0.0)), Err(ErrorKind::DivisionByZero));
        }
    }

    #[test]
    fn test_floor_div_overflow_goes_float() {
        let result = bin(BinaryOperator::IntDivide, Value::int(i64::MIN), Value::int(-1)).unwrap();
        assert!(matches!(result, Value::Number(Number::Float(_))));
        assert_eq!(result, Value::float(9223372036854775808.0));
        assert_eq!(bin(BinaryOperator::Modulo, Value::int(i64::MIN), Value::int(-1)).unwrap(), Value::int(0));
    }

    #[test]
    fn test_repetition() {
        assert_eq!(bin(BinaryOperator::Multiply, Value::str("ab"), Value::int(3)).unwrap(), Value::str("ababab"));
        assert_eq!(bin(BinaryOperator::Multiply, Value::str("ab"), Value::int(-2)).unwrap(), Value::str(""));
        assert_eq!(
            bin(BinaryOperator::Multiply, Value::array(vec![Value::int(1)]), Value::int(2))
                .unwrap()
                .to_string(),
            "[1, 1]"
        );

        let too_large = Err(ErrorKind::InvalidValue("Repetition result too large".to_owned()));
        assert_eq!(bin(BinaryOperator::Multiply, Value::str("ab"), Value::int(i64::MAX)), too_large);
        assert_eq!(
            bin(
                BinaryOperator::Multiply,
                Value::array(vec![Value::int(1), Value::int(2)]),
                Value::int(i64::MAX)
            ),
            too_large
        );
        assert_eq!(
            bin(BinaryOperator::Multiply, Value::array(vec![]), Value::int(i64::MAX))
                .unwrap()
                .to_string(),
            "[]"
        );
    }

    #[test]
    fn test_string_number_concat() {
        assert_eq!(
            bin(BinaryOperator::Add, Value::str("n="), Value::int(4)).unwrap(),
            Value::str("n=4")
        );
        assert_eq!(
            bin(BinaryOperator::Add, Value::float(1.0), Value::str("!")).unwrap(),
            Value::str("1.0!")
        );
    }

    #[test]
    fn test_illegal_operation_names_operands() {
        let err = bin(BinaryOperator::Subtract, Value::str("a"), Value::array(vec![])).unwrap_err();
        assert_eq!(err.to_string(), "Illegal operation '-' between String and Array");
    }

    #[test]
    fn test_indexing() {
        let arr = Value::array(vec![Value::int(1), Value::int(2), Value::int(3)]);
        assert_eq!(get_index(&arr, &Value::int(-1)).unwrap(), Value::int(3));
        assert!(matches!(
            get_index(&arr, &Value::int(3)),
            Err(ErrorKind::IndexOutOfBounds(_))
        ));
        set_index(&arr, &Value::int(0), Value::int(9)).unwrap();
        assert_eq!(arr.to_string(), "[9, 2, 3]");
        assert_eq!(get_index(&Value::str("hey"), &Value::int(1)).unwrap(), Value::str("e"));
    }

    #[test]
    fn test_slices() {
        let arr = Value::array((0..6).map(Value::int).collect());
        let s = |a: Option<i64>, b: Option<i64>, c: Option<i64>| {
            let (a, b, c) = (a.map(Value::int), b.map(Value::int), c.map(Value::int));
            slice(&arr, a.as_ref(), b.as_ref(), c.as_ref()).unwrap().to_string()
        };
        assert_eq!(s(Some(1), Some(3), None), "[1, 2]");
        assert_eq!(s(None, None, Some(2)), "[0, 2, 4]");
        assert_eq!(s(None, None, Some(-1)), "[5, 4, 3, 2, 1, 0]");
        assert_eq!(s(Some(-2), None, None), "[4, 5]");
        assert_eq!(s(Some(10), None, None), "[]");
        assert_eq!(
            slice(&Value::str("radon"), None, None, Some(&Value::int(-1))).unwrap(),
            Value::str("nodar")
        );
    }

    #[test]
    fn test_membership_and_iteration() {
        assert!(contains(&Value::str("radon"), &Value::str("do")).unwrap());
        let keys = iterate(&Value::hashmap(
            [("b".to_owned(), Value::Null), ("a".to_owned(), Value::Null)].into_iter().collect(),
        ))
        .unwrap();
        assert_eq!(keys, vec![Value::str("a"), Value::str("b")]);
        assert!(matches!(iterate(&Value::int(1)), Err(ErrorKind::NotIterable(_))));
    }

    #[test]
    fn test_loop_items_read_array_live() {
        let arr = Value::array(vec![Value::int(1)]);
        let items = match &arr {
            Value::Array(items) => items.clone(),
            _ => unreachable!(),
        };
        let mut walk = loop_items(&arr).unwrap();
        assert_eq!(walk.next(), Some(Value::int(1)));
        items.borrow_mut().push(Value::int(2));
        assert_eq!(walk.next(), Some(Value::int(2)));
        assert_eq!(walk.next(), None);

        let chars: Vec<_> = loop_items(&Value::str("ab")).unwrap().collect();
        assert_eq!(chars, vec![Value::str("a"), Value::str("b")]);
    }
}
