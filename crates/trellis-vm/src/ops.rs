//! Value operations behind the arithmetic, comparison and array opcodes.
//!
//! Integer arithmetic is checked. Mixed integer/real operands promote to
//! real. `+` also concatenates strings and arrays.

use std::cmp::Ordering;
use std::sync::Arc;

use trellis_core::{RuntimeError, Value};

type Result<T> = std::result::Result<T, RuntimeError>;

fn mismatch(op: &'static str, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::type_mismatch(op, format!("{} and {}", a.type_name(), b.type_name()))
}

pub fn add(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_add(*y)
            .map(Value::Int)
            .ok_or(RuntimeError::Overflow { op: "+" }),
        (Value::Str(x), Value::Str(y)) => Ok(Value::str(format!("{x}{y}"))),
        (Value::Str(x), other) => Ok(Value::str(format!("{x}{other}"))),
        (other, Value::Str(y)) => Ok(Value::str(format!("{other}{y}"))),
        (Value::Array(x), Value::Array(y)) => {
            let mut items = Vec::with_capacity(x.len() + y.len());
            items.extend(x.iter().cloned());
            items.extend(y.iter().cloned());
            Ok(Value::array(items))
        }
        _ => real_op("+", a, b, |x, y| x + y),
    }
}

pub fn sub(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_sub(*y)
            .map(Value::Int)
            .ok_or(RuntimeError::Overflow { op: "-" }),
        _ => real_op("-", a, b, |x, y| x - y),
    }
}

pub fn mul(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_mul(*y)
            .map(Value::Int)
            .ok_or(RuntimeError::Overflow { op: "*" }),
        _ => real_op("*", a, b, |x, y| x * y),
    }
}

/// `/` always produces a real.
pub fn div(a: &Value, b: &Value) -> Result<Value> {
    let (Some(x), Some(y)) = (numeric(a), numeric(b)) else {
        return Err(mismatch("/", a, b));
    };
    if y == 0.0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(Value::Real(x / y))
}

/// Integer division, truncating toward zero.
pub fn int_div(a: &Value, b: &Value) -> Result<Value> {
    let (Value::Int(x), Value::Int(y)) = (a, b) else {
        return Err(mismatch("div", a, b));
    };
    if *y == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    x.checked_div(*y)
        .map(Value::Int)
        .ok_or(RuntimeError::Overflow { op: "div" })
}

pub fn modulo(a: &Value, b: &Value) -> Result<Value> {
    let (Value::Int(x), Value::Int(y)) = (a, b) else {
        return Err(mismatch("mod", a, b));
    };
    if *y == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    x.checked_rem(*y)
        .map(Value::Int)
        .ok_or(RuntimeError::Overflow { op: "mod" })
}

pub fn neg(a: &Value) -> Result<Value> {
    match a {
        Value::Int(x) => x
            .checked_neg()
            .map(Value::Int)
            .ok_or(RuntimeError::Overflow { op: "negate" }),
        Value::Real(x) => Ok(Value::Real(-x)),
        other => Err(RuntimeError::type_mismatch("negate", other.type_name())),
    }
}

/// Order two numbers or two strings; anything else is a type error.
pub fn compare(op: &'static str, a: &Value, b: &Value) -> Result<Ordering> {
    let ordering = match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => return Err(mismatch(op, a, b)),
        },
    };
    // NaN compares false under every ordering operator.
    ordering.ok_or_else(|| RuntimeError::type_mismatch(op, "NaN is unordered"))
}

/// Zero-based array element or string character.
pub fn index(target: &Value, index: &Value) -> Result<Value> {
    let Value::Int(i) = index else {
        return Err(RuntimeError::type_mismatch("index", index.type_name()));
    };
    match target {
        Value::Array(items) => position(*i, items.len()).map(|p| items[p].clone()),
        Value::Str(s) => {
            let len = s.chars().count();
            let p = position(*i, len)?;
            Ok(s.chars().nth(p).map(|c| Value::str(c.to_string())).unwrap_or_default())
        }
        other => Err(RuntimeError::type_mismatch("index", other.type_name())),
    }
}

/// Write `value` at `index`, copying the array first if it is shared.
pub fn set_index(target: Value, index: &Value, value: Value) -> Result<Value> {
    let Value::Int(i) = index else {
        return Err(RuntimeError::type_mismatch("index assignment", index.type_name()));
    };
    let Value::Array(mut items) = target else {
        return Err(RuntimeError::type_mismatch(
            "index assignment",
            target.type_name(),
        ));
    };
    let p = position(*i, items.len())?;
    Arc::make_mut(&mut items)[p] = value;
    Ok(Value::Array(items))
}

fn position(index: i64, len: usize) -> Result<usize> {
    usize::try_from(index)
        .ok()
        .filter(|p| *p < len)
        .ok_or(RuntimeError::IndexOutOfBounds { index, len })
}

fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Real(r) => Some(*r),
        _ => None,
    }
}

fn real_op(op: &'static str, a: &Value, b: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value> {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => Ok(Value::Real(f(x, y))),
        _ => Err(mismatch(op, a, b)),
    }
}
