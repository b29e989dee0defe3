//! Scope resolution and bytecode generation for trellis programs.
//!
//! Compilation is two passes over the shared AST:
//!
//! 1. [`resolve`] binds every name, decides which locals become cells,
//!    assigns frame and global slots and rejects scope violations
//! 2. [`codegen::generate`] lowers the decorated tree into a
//!    [`CompiledUnit`](bytecode::CompiledUnit)
//!
//! ```ignore
//! use trellis_compiler::{compile_program, FrontendPolicy};
//!
//! let unit = compile_program(&mut program, &registry, FrontendPolicy::pascal())?;
//! println!("{}", trellis_compiler::bytecode::disassemble(&unit));
//! ```

pub mod bytecode;
pub mod codegen;
pub mod emit;
pub mod resolve;

use tracing::debug;
use trellis_ast::Program;
use trellis_registry::BuiltinRegistry;

pub use bytecode::{CompiledUnit, OpCode};
pub use resolve::{FrontendPolicy, Resolution, resolve};

/// Resolve and compile a program.
///
/// The program is decorated in place; on error nothing is emitted.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn compile_program(
    program: &mut Program,
    registry: &BuiltinRegistry,
    policy: FrontendPolicy,
) -> trellis_core::Result<CompiledUnit> {
    let resolution = resolve(program, registry, policy)?;
    debug!(
        bindings = resolution.bindings.len(),
        functions = resolution.functions.len(),
        globals = resolution.global_count,
        "resolved program"
    );
    let unit = codegen::generate(program, &resolution)?;
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_ast::build::*;
    use trellis_core::{TrellisError, Value};
    use trellis_registry::{Arity, BuiltinKind};

    use crate::bytecode::{opcodes, MAIN_PROCEDURE};

    fn registry() -> BuiltinRegistry {
        let mut builder = BuiltinRegistry::builder();
        builder
            .register(
                "system",
                "io",
                "writeln",
                Arity::AtLeast(0),
                BuiltinKind::Procedure,
                |_, _| Ok(Value::Nil),
            )
            .unwrap();
        builder.build()
    }

    fn compile(mut program: Program) -> CompiledUnit {
        compile_program(&mut program, &registry(), FrontendPolicy::c_like()).unwrap()
    }

    fn region(unit: &CompiledUnit, name: &str) -> Vec<OpCode> {
        let (index, record) = unit.procedure(name).unwrap();
        let end = unit
            .procedures
            .get(index + 1)
            .map(|p| p.entry as usize)
            .unwrap_or(unit.code.len());
        opcodes(&unit.code[record.entry as usize..end])
    }

    #[test]
    fn main_region_comes_first_and_halts() {
        let unit = compile(Program::new(vec![var("x", int(2))]));
        assert_eq!(unit.procedures[0].name, MAIN_PROCEDURE);
        assert_eq!(unit.procedures[0].entry, 0);
        assert_eq!(
            region(&unit, MAIN_PROCEDURE),
            vec![
                OpCode::Constant,
                OpCode::DefineGlobal,
                OpCode::PushNil,
                OpCode::Halt
            ]
        );
    }

    #[test]
    fn functions_get_records_and_implicit_return() {
        let unit = compile(Program::new(vec![
            function("twice", &["n"], vec![ret(mul(name("n"), int(2)))]),
            expr(call("twice", vec![int(4)])),
        ]));
        let (_, record) = unit.procedure("twice").unwrap();
        assert_eq!(record.arity, 1);
        assert_eq!(record.local_count, 1);
        let ops = region(&unit, "twice");
        assert_eq!(
            ops,
            vec![
                OpCode::GetLocal,
                OpCode::Constant,
                OpCode::Mul,
                OpCode::Return,
                OpCode::PushNil,
                OpCode::Return
            ]
        );
        assert!(region(&unit, MAIN_PROCEDURE).contains(&OpCode::Call));
    }

    #[test]
    fn builtin_calls_use_builtin_opcode() {
        let unit = compile(Program::new(vec![expr(call("WriteLn", vec![string("hi")]))]));
        let ops = region(&unit, MAIN_PROCEDURE);
        assert!(ops.contains(&OpCode::CallBuiltin));
        assert!(!ops.contains(&OpCode::Call));
    }

    #[test]
    fn captured_local_becomes_cell_before_closure() {
        let unit = compile(Program::new(vec![function(
            "outer",
            &[],
            vec![
                var("count", int(0)),
                function(
                    "bump",
                    &[],
                    vec![expr(assign("count", add(name("count"), int(1))))],
                ),
                expr(call("bump", vec![])),
                ret(name("count")),
            ],
        )]));
        let ops = region(&unit, "outer");
        let cell = ops.iter().position(|op| *op == OpCode::MakeCell).unwrap();
        let closure = ops.iter().position(|op| *op == OpCode::Closure).unwrap();
        assert!(cell < closure);
        assert!(ops.contains(&OpCode::SetCell));
        assert!(ops.contains(&OpCode::GetCell));

        let bump = region(&unit, "outer.bump");
        assert!(bump.contains(&OpCode::GetUpvalue));
        assert!(bump.contains(&OpCode::SetUpvalue));
        assert_eq!(unit.procedure("outer.bump").unwrap().1.upvalue_count, 1);
    }

    #[test]
    fn captured_parameter_is_boxed_at_entry() {
        let unit = compile(Program::new(vec![function(
            "outer",
            &["n"],
            vec![
                function("peek", &[], vec![ret(name("n"))]),
                ret(call("peek", vec![])),
            ],
        )]));
        assert_eq!(region(&unit, "outer")[0], OpCode::BoxLocal);
    }

    #[test]
    fn while_loop_jumps_back() {
        let unit = compile(Program::new(vec![
            var("i", int(0)),
            while_(
                lt(name("i"), int(3)),
                vec![expr(assign("i", add(name("i"), int(1))))],
            ),
        ]));
        let ops = region(&unit, MAIN_PROCEDURE);
        assert!(ops.contains(&OpCode::JumpIfFalse));
        assert!(ops.contains(&OpCode::Loop));
    }

    #[test]
    fn break_inside_try_closes_the_region() {
        let unit = compile(Program::new(vec![while_(
            boolean(true),
            vec![try_catch(vec![brk()], None, vec![])],
        )]));
        let ops = region(&unit, MAIN_PROCEDURE);
        let ends = ops.iter().filter(|op| **op == OpCode::TryEnd).count();
        assert_eq!(ends, 2);
    }

    #[test]
    fn match_falls_through_to_no_match() {
        let unit = compile(Program::new(vec![match_(
            int(2),
            vec![
                arm(plit(trellis_ast::Literal::Int(1)), None, vec![]),
                arm(pbind("other"), Some(lt(name("other"), int(0))), vec![]),
            ],
        )]));
        let ops = region(&unit, MAIN_PROCEDURE);
        assert!(ops.contains(&OpCode::NoMatch));
        assert!(ops.contains(&OpCode::Equal));
    }

    #[test]
    fn folded_constants_leave_no_storage() {
        let unit = compile(Program::new(vec![
            constant("limit", mul(int(6), int(7))),
            expr(call("writeln", vec![name("limit")])),
        ]));
        let ops = region(&unit, MAIN_PROCEDURE);
        assert!(!ops.contains(&OpCode::DefineGlobal));
        assert!(unit.constants.constants().iter().any(|c| matches!(c, bytecode::Constant::Int(42))));
    }

    #[test]
    fn resolution_errors_surface_unwrapped() {
        let mut program = Program::new(vec![expr(call("writeln", vec![name("missing")]))]);
        let err = compile_program(&mut program, &registry(), FrontendPolicy::c_like()).unwrap_err();
        assert!(matches!(err, TrellisError::Resolve(ref e) if e.identifier() == "missing"));
    }

    #[test]
    fn lines_cover_every_byte() {
        let unit = compile(Program::new(vec![var("x", int(1))]));
        assert_eq!(unit.lines.len(), unit.code.len());
    }
}
