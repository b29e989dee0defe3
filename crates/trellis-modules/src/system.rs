//! Program output.

use trellis_core::{RuntimeError, Value};
use trellis_registry::{Arity, BuiltinHost, Module};

/// Write every argument, without separators.
pub fn write(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    for arg in args {
        host.write_output(&arg.to_string());
    }
    Ok(Value::Nil)
}

/// Write every argument followed by a newline.
pub fn writeln(host: &mut dyn BuiltinHost, args: &[Value]) -> Result<Value, RuntimeError> {
    write(host, args)?;
    host.write_output("\n");
    Ok(Value::Nil)
}

pub fn module() -> Module {
    Module::new("system")
        .group("io")
        .procedure_in("io", "write", Arity::AtLeast(0), write)
        .procedure_in("io", "writeln", Arity::AtLeast(0), writeln)
}
