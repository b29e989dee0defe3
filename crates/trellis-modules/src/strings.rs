//! String builtins. Positions are zero-based and count characters.

use trellis_core::{RuntimeError, Value};
use trellis_registry::{Arity, BuiltinHost, Module};

use crate::args;

/// Character count of a string, or element count of an array.
pub fn length(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    match args.first() {
        Some(Value::Array(items)) => Ok(Value::Int(items.len() as i64)),
        _ => Ok(Value::Int(args::string("length", args, 0)?.chars().count() as i64)),
    }
}

pub fn upper(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::str(args::string("upper", args, 0)?.to_uppercase()))
}

pub fn lower(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::str(args::string("lower", args, 0)?.to_lowercase()))
}

/// `substr(s, start, count)`; a range past the end is clipped.
pub fn substr(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = args::string("substr", args, 0)?;
    let start = args::int("substr", args, 1)?;
    let count = args::int("substr", args, 2)?;
    if start < 0 || count < 0 {
        return Err(RuntimeError::builtin("substr", "start and count must not be negative"));
    }
    let text: String = s.chars().skip(start as usize).take(count as usize).collect();
    Ok(Value::str(text))
}

/// Position of the first occurrence of `needle`, or -1.
pub fn find(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    let haystack = args::string("find", args, 0)?;
    let needle = args::string("find", args, 1)?;
    let position = haystack
        .find(needle)
        .map(|byte| haystack[..byte].chars().count() as i64)
        .unwrap_or(-1);
    Ok(Value::Int(position))
}

/// Display form of any value.
pub fn to_str(_: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::str(args.first().cloned().unwrap_or_default().to_string()))
}

pub fn module() -> Module {
    Module::new("strings")
        .function("length", Arity::Exact(1), length)
        .function("upper", Arity::Exact(1), upper)
        .function("lower", Arity::Exact(1), lower)
        .function("substr", Arity::Exact(3), substr)
        .function("find", Arity::Exact(2), find)
        .function("str", Arity::Exact(1), to_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::NullHost;

    #[test]
    fn substr_counts_characters() {
        let mut host = NullHost;
        let args = [Value::str("héllo"), Value::Int(1), Value::Int(3)];
        assert_eq!(substr(&mut host, &args).unwrap(), Value::str("éll"));
        let args = [Value::str("abc"), Value::Int(2), Value::Int(10)];
        assert_eq!(substr(&mut host, &args).unwrap(), Value::str("c"));
    }

    #[test]
    fn find_reports_missing_as_minus_one() {
        let mut host = NullHost;
        let args = [Value::str("héllo"), Value::str("lo")];
        assert_eq!(find(&mut host, &args).unwrap(), Value::Int(3));
        let args = [Value::str("abc"), Value::str("z")];
        assert_eq!(find(&mut host, &args).unwrap(), Value::Int(-1));
    }

    #[test]
    fn length_accepts_arrays() {
        let mut host = NullHost;
        let arr = Value::array(vec![Value::Nil, Value::Nil]);
        assert_eq!(length(&mut host, &[arr]).unwrap(), Value::Int(2));
        assert!(length(&mut host, &[Value::Int(3)]).is_err());
    }
}
