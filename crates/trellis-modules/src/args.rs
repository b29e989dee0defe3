//! Argument coercion shared by the builtin categories.

use trellis_core::{RuntimeError, Value};

pub(crate) fn int(name: &str, args: &[Value], index: usize) -> Result<i64, RuntimeError> {
    args.get(index)
        .and_then(Value::as_int)
        .ok_or_else(|| expected(name, index, "an integer", args))
}

pub(crate) fn real(name: &str, args: &[Value], index: usize) -> Result<f64, RuntimeError> {
    args.get(index)
        .and_then(Value::as_real)
        .ok_or_else(|| expected(name, index, "a number", args))
}

pub(crate) fn string<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a str, RuntimeError> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| expected(name, index, "a string", args))
}

fn expected(name: &str, index: usize, what: &str, args: &[Value]) -> RuntimeError {
    let found = args.get(index).map_or("nothing", Value::type_name);
    RuntimeError::builtin(name, format!("argument {} must be {what}, found {found}", index + 1))
}
