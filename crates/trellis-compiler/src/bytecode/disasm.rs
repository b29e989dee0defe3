//! Human-readable listing of a compiled unit.

use std::fmt::Write;

use super::chunk::read_u16;
use super::{CompiledUnit, OpCode};

/// Render the procedure table and every instruction.
///
/// ```text
/// == procedures ==
///    0 <main>  entry=0000 locals=1 upvalues=0 arity=0
/// == code ==
/// 0000    1 CONSTANT            0 '42'
/// ```
pub fn disassemble(unit: &CompiledUnit) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_listing(unit, &mut out);
    out
}

fn write_listing(unit: &CompiledUnit, out: &mut String) -> std::fmt::Result {
    writeln!(out, "== procedures ==")?;
    for (idx, proc) in unit.procedures.iter().enumerate() {
        writeln!(
            out,
            "{idx:4} {}  entry={:04} locals={} upvalues={} arity={}",
            proc.name, proc.entry, proc.local_count, proc.upvalue_count, proc.arity
        )?;
    }
    writeln!(out, "== code ==")?;

    let code = &unit.code;
    let mut offset = 0;
    let mut last_line = None;
    while offset < code.len() {
        if let Some(proc) = unit.procedures.iter().find(|p| p.entry as usize == offset) {
            writeln!(out, "-- {} --", proc.name)?;
        }
        let line = unit.line_at(offset);
        write!(out, "{offset:04} ")?;
        if last_line == Some(line) {
            write!(out, "   | ")?;
        } else {
            write!(out, "{line:4} ")?;
            last_line = Some(line);
        }

        let Some(op) = OpCode::from_u8(code[offset]) else {
            writeln!(out, "<invalid {:#04x}>", code[offset])?;
            offset += 1;
            continue;
        };
        let operands = offset + 1;
        match op {
            OpCode::Constant | OpCode::CallBuiltin => {
                let idx = code.get(operands).copied().unwrap_or(0) as u32;
                write!(out, "{:<20}{idx:4} {}", op.name(), constant_text(unit, idx))?;
                if op == OpCode::CallBuiltin {
                    let argc = code.get(operands + 1).copied().unwrap_or(0);
                    write!(out, " argc={argc}")?;
                }
            }
            OpCode::ConstantWide | OpCode::PushFunction => {
                let idx = read_u16(code, operands).unwrap_or(0) as u32;
                write!(out, "{:<20}{idx:4} {}", op.name(), constant_text(unit, idx))?;
            }
            OpCode::Call | OpCode::CallBuiltinWide | OpCode::Closure => {
                let idx = read_u16(code, operands).unwrap_or(0) as u32;
                let count = code.get(operands + 2).copied().unwrap_or(0);
                let label = if op == OpCode::Closure { "captures" } else { "argc" };
                write!(
                    out,
                    "{:<20}{idx:4} {} {label}={count}",
                    op.name(),
                    constant_text(unit, idx)
                )?;
            }
            OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfTrue | OpCode::TryBegin => {
                let distance = read_u16(code, operands).unwrap_or(0) as usize;
                let target = operands + 2 + distance;
                write!(out, "{:<20}{offset:4} -> {target}", op.name())?;
            }
            OpCode::Loop => {
                let distance = read_u16(code, operands).unwrap_or(0) as usize;
                let target = (operands + 2).saturating_sub(distance);
                write!(out, "{:<20}{offset:4} -> {target}", op.name())?;
            }
            _ => match op.operand_size() {
                0 => write!(out, "{}", op.name())?,
                1 => {
                    let value = code.get(operands).copied().unwrap_or(0);
                    write!(out, "{:<20}{value:4}", op.name())?;
                }
                _ => {
                    let value = read_u16(code, operands).unwrap_or(0);
                    write!(out, "{:<20}{value:4}", op.name())?;
                }
            },
        }
        writeln!(out)?;
        offset += 1 + op.operand_size();
    }
    Ok(())
}

fn constant_text(unit: &CompiledUnit, idx: u32) -> String {
    unit.constant(idx)
        .map(|c| format!("'{c}'"))
        .unwrap_or_else(|| "<missing>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{BytecodeChunk, ConstantPool, ProcedureRecord, BYTECODE_VERSION};

    #[test]
    fn lists_procedures_and_instructions() {
        let mut constants = ConstantPool::new();
        let idx = constants.add_int(42);
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write_byte(idx as u8, 1);
        chunk.write_op(OpCode::Halt, 2);
        let (code, lines) = chunk.into_parts();
        let unit = CompiledUnit {
            version: BYTECODE_VERSION,
            code,
            lines,
            constants,
            procedures: vec![ProcedureRecord {
                name: "<main>".into(),
                entry: 0,
                local_count: 0,
                upvalue_count: 0,
                arity: 0,
            }],
        };
        let text = disassemble(&unit);
        assert!(text.contains("<main>  entry=0000"));
        assert!(text.contains("CONSTANT"));
        assert!(text.contains("'42'"));
        assert!(text.contains("HALT"));
    }
}
