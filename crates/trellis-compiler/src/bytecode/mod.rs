//! Bytecode representation: opcodes, chunks, the constant pool and the
//! compiled unit with its procedure table.

mod chunk;
mod constant;
mod disasm;
mod opcode;
mod unit;

pub use chunk::{opcodes, read_u16, BytecodeChunk};
pub use constant::{Constant, ConstantPool};
pub use disasm::disassemble;
pub use opcode::OpCode;
pub use unit::{CompiledUnit, ProcedureRecord, BYTECODE_VERSION, MAIN_PROCEDURE};
