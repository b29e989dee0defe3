//! Numeric builtins.
//!
//! Integer arguments stay integers where the operation allows it
//! (`abs`, `min`, `max`, `sqr`); everything else works on reals.

use ordered_float::OrderedFloat;
use trellis_core::{RuntimeError, Value};
use trellis_registry::{Arity, BuiltinHost, Module};

use crate::args;

// =============================================================================
// INTEGER-PRESERVING
// =============================================================================

pub fn abs(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    match args.first() {
        Some(Value::Int(i)) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or(RuntimeError::Overflow { op: "abs" }),
        _ => Ok(Value::Real(args::real("abs", args, 0)?.abs())),
    }
}

pub fn sqr(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    match args.first() {
        Some(Value::Int(i)) => i
            .checked_mul(*i)
            .map(Value::Int)
            .ok_or(RuntimeError::Overflow { op: "sqr" }),
        _ => {
            let x = args::real("sqr", args, 0)?;
            Ok(Value::Real(x * x))
        }
    }
}

/// Smallest argument. All integers give an integer.
pub fn min(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    extreme("min", args, |a, b| a < b)
}

/// Largest argument. All integers give an integer.
pub fn max(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    extreme("max", args, |a, b| a > b)
}

fn extreme(
    name: &str,
    args: &[Value],
    better: fn(OrderedFloat<f64>, OrderedFloat<f64>) -> bool,
) -> Result<Value, RuntimeError> {
    let mut best = args.first().cloned().unwrap_or_default();
    let mut best_key = OrderedFloat(args::real(name, args, 0)?);
    for index in 1..args.len() {
        let key = OrderedFloat(args::real(name, args, index)?);
        if better(key, best_key) {
            best = args[index].clone();
            best_key = key;
        }
    }
    Ok(best)
}

// =============================================================================
// REAL-VALUED
// =============================================================================

pub fn sqrt(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    let x = args::real("sqrt", args, 0)?;
    if x < 0.0 {
        return Err(RuntimeError::builtin("sqrt", "argument must not be negative"));
    }
    Ok(Value::Real(x.sqrt()))
}

pub fn sin(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Real(args::real("sin", args, 0)?.sin()))
}

pub fn cos(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Real(args::real("cos", args, 0)?.cos()))
}

pub fn round(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(args::real("round", args, 0)?.round() as i64))
}

pub fn trunc(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(args::real("trunc", args, 0)?.trunc() as i64))
}

pub fn module() -> Module {
    Module::new("math")
        .group("arith")
        .group("trig")
        .function_in("arith", "abs", Arity::Exact(1), abs)
        .function_in("arith", "sqr", Arity::Exact(1), sqr)
        .function_in("arith", "sqrt", Arity::Exact(1), sqrt)
        .function_in("arith", "min", Arity::AtLeast(1), min)
        .function_in("arith", "max", Arity::AtLeast(1), max)
        .function_in("arith", "round", Arity::Exact(1), round)
        .function_in("arith", "trunc", Arity::Exact(1), trunc)
        .function_in("trig", "sin", Arity::Exact(1), sin)
        .function_in("trig", "cos", Arity::Exact(1), cos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::NullHost;

    #[test]
    fn integer_results_stay_integers() {
        let mut host = NullHost;
        assert_eq!(abs(&mut host, &[Value::Int(-3)]).unwrap(), Value::Int(3));
        assert_eq!(
            max(&mut host, &[Value::Int(2), Value::Int(9), Value::Int(4)]).unwrap(),
            Value::Int(9)
        );
        assert_eq!(
            min(&mut host, &[Value::Int(2), Value::Real(1.5)]).unwrap(),
            Value::Real(1.5)
        );
    }

    #[test]
    fn sqrt_rejects_negative() {
        let mut host = NullHost;
        assert!(sqrt(&mut host, &[Value::Int(-1)]).is_err());
        assert_eq!(sqrt(&mut host, &[Value::Int(9)]).unwrap(), Value::Real(3.0));
    }

    #[test]
    fn non_numeric_argument_is_reported() {
        let mut host = NullHost;
        let err = abs(&mut host, &[Value::str("x")]).unwrap_err();
        assert!(err.to_string().contains("argument 1 must be a number"));
    }
}
