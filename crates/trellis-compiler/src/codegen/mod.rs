//! Code generation from a resolved program.
//!
//! Every routine compiles into its own chunk. Nested functions and lambdas
//! met while compiling a routine are queued and compiled after it, then
//! every chunk is appended behind the main program's region. Jumps are
//! relative, so appending needs no fix-ups; each procedure record simply
//! points at the offset its chunk landed on.

mod expr;
mod function;
mod pattern;
mod stmt;

use std::collections::VecDeque;

use tracing::debug;
use trellis_ast::{FunctionDecl, FunctionId, Program};
use trellis_core::CompileError;

use crate::bytecode::{BytecodeChunk, CompiledUnit, ConstantPool, ProcedureRecord, BYTECODE_VERSION};
use crate::resolve::Resolution;
pub use function::FunctionCompiler;

type Result<T> = std::result::Result<T, CompileError>;

/// Generate the compiled unit for a resolved program.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn generate(program: &Program, resolution: &Resolution) -> Result<CompiledUnit> {
    let mut constants = ConstantPool::new();
    let mut queue: VecDeque<&FunctionDecl> = VecDeque::new();

    let mut compiler = FunctionCompiler::new(&mut constants, resolution, FunctionId(0));
    compiler.compile_main(program)?;
    let (main, nested) = compiler.finish()?;
    queue.extend(nested);

    let mut code = BytecodeChunk::new();
    code.append(&main);
    let mut procedures = vec![procedure_record(resolution, FunctionId(0), 0)?];

    while let Some(decl) = queue.pop_front() {
        let function = decl.function.ok_or_else(|| CompileError::Unresolved {
            name: decl.name.name.clone(),
            span: decl.span,
        })?;
        let mut compiler = FunctionCompiler::new(&mut constants, resolution, function);
        compiler.compile_function(decl)?;
        let (chunk, nested) = compiler.finish()?;
        queue.extend(nested);
        let entry = code.append(&chunk);
        procedures.push(procedure_record(resolution, function, entry)?);
    }

    let (code, lines) = code.into_parts();
    debug!(
        code_len = code.len(),
        constants = constants.len(),
        procedures = procedures.len(),
        "generated unit"
    );
    Ok(CompiledUnit {
        version: BYTECODE_VERSION,
        code,
        lines,
        constants,
        procedures,
    })
}

fn procedure_record(
    resolution: &Resolution,
    function: FunctionId,
    entry: usize,
) -> Result<ProcedureRecord> {
    let info = resolution.function(function);
    let local_count = u16::try_from(info.local_count).map_err(|_| CompileError::TooManyLocals {
        function: info.procedure.clone(),
        limit: u16::MAX as usize,
    })?;
    let upvalue_count =
        u8::try_from(info.captures.len()).map_err(|_| CompileError::TooManyUpvalues {
            function: info.procedure.clone(),
            limit: u8::MAX as usize,
        })?;
    let arity = u8::try_from(info.arity).map_err(|_| CompileError::TooManyArguments {
        span: Default::default(),
        limit: u8::MAX as usize,
    })?;
    Ok(ProcedureRecord {
        name: info.procedure.clone(),
        entry: entry as u32,
        local_count,
        upvalue_count,
        arity,
    })
}
