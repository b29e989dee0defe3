//! Bytecode chunk for one compiled function.
//!
//! A `BytecodeChunk` holds a function's code and a line number for every
//! byte. Jump operands are relative, so a finished chunk can be appended
//! anywhere in the unit's code stream without patching.

use trellis_core::CompileError;

use super::OpCode;

/// A chunk of compiled bytecode for a single function.
///
/// Constants live in the unit-level `ConstantPool`, not per chunk.
#[derive(Debug, Clone, Default)]
pub struct BytecodeChunk {
    code: Vec<u8>,
    /// Parallel to `code`.
    lines: Vec<u32>,
}

impl BytecodeChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.code.push(op.into());
        self.lines.push(line);
    }

    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Write a 16-bit operand (big-endian).
    pub fn write_u16(&mut self, value: u16, line: u32) {
        self.code.push((value >> 8) as u8);
        self.lines.push(line);
        self.code.push(value as u8);
        self.lines.push(line);
    }

    /// Current code offset (for jump patching).
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Emit a forward jump and return the operand offset to patch later.
    ///
    /// The operand is initialized to 0xFFFF as a placeholder.
    pub fn emit_jump(&mut self, op: OpCode, line: u32) -> usize {
        self.write_op(op, line);
        let offset = self.code.len();
        self.write_u16(0xFFFF, line);
        offset
    }

    /// Patch the jump whose operand is at `offset` to land on the current position.
    pub fn patch_jump(&mut self, offset: usize) -> Result<(), CompileError> {
        let distance = self.code.len() - offset - 2;
        if distance > u16::MAX as usize {
            return Err(CompileError::JumpTooFar { distance });
        }
        self.code[offset] = (distance >> 8) as u8;
        self.code[offset + 1] = distance as u8;
        Ok(())
    }

    /// Emit a backward jump to `loop_start`.
    pub fn emit_loop(&mut self, loop_start: usize, line: u32) -> Result<(), CompileError> {
        self.write_op(OpCode::Loop, line);
        // +2 for the operand bytes about to be written
        let distance = self.code.len() - loop_start + 2;
        if distance > u16::MAX as usize {
            return Err(CompileError::JumpTooFar { distance });
        }
        self.write_u16(distance as u16, line);
        Ok(())
    }

    /// Append another chunk, returning the offset it starts at.
    pub fn append(&mut self, other: &BytecodeChunk) -> usize {
        let start = self.code.len();
        self.code.extend_from_slice(&other.code);
        self.lines.extend_from_slice(&other.lines);
        start
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u32>) {
        (self.code, self.lines)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        read_u16(&self.code, offset)
    }

    /// All opcodes in the chunk, skipping operands.
    pub fn opcodes(&self) -> Vec<OpCode> {
        opcodes(&self.code)
    }

    /// Check the chunk holds exactly the given opcode sequence.
    #[track_caller]
    pub fn assert_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        assert_eq!(
            actual,
            expected,
            "Bytecode mismatch.\nExpected: {:?}\nActual:   {:?}",
            expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }
}

/// Read a big-endian u16 operand.
pub fn read_u16(code: &[u8], offset: usize) -> Option<u16> {
    let hi = *code.get(offset)?;
    let lo = *code.get(offset + 1)?;
    Some(((hi as u16) << 8) | lo as u16)
}

/// Walk a code stream and collect its opcodes.
pub fn opcodes(code: &[u8]) -> Vec<OpCode> {
    let mut ops = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        match OpCode::from_u8(code[offset]) {
            Some(op) => {
                ops.push(op);
                offset += 1 + op.operand_size();
            }
            None => offset += 1,
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_op_records_line() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::PushNil, 7);
        assert_eq!(chunk.code(), &[OpCode::PushNil as u8]);
        assert_eq!(chunk.lines(), &[7]);
    }

    #[test]
    fn u16_is_big_endian() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_u16(0x1234, 1);
        assert_eq!(chunk.code(), &[0x12, 0x34]);
        assert_eq!(chunk.read_u16(0), Some(0x1234));
        assert_eq!(chunk.read_u16(1), None);
    }

    #[test]
    fn forward_jump_patches_to_current_position() {
        let mut chunk = BytecodeChunk::new();
        let jump = chunk.emit_jump(OpCode::Jump, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.patch_jump(jump).unwrap();
        assert_eq!(chunk.read_u16(jump), Some(2));
    }

    #[test]
    fn loop_offset_lands_on_start() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::PushNil, 1);
        let start = chunk.current_offset();
        chunk.write_op(OpCode::Pop, 1);
        chunk.emit_loop(start, 1).unwrap();
        let operand = chunk.current_offset() - 2;
        let distance = chunk.read_u16(operand).unwrap() as usize;
        // The VM subtracts after reading the operand.
        assert_eq!(chunk.current_offset() - distance, start);
    }

    #[test]
    fn oversized_jump_is_an_error() {
        let mut chunk = BytecodeChunk::new();
        let jump = chunk.emit_jump(OpCode::Jump, 1);
        for _ in 0..=u16::MAX as usize {
            chunk.write_op(OpCode::Pop, 1);
        }
        assert!(matches!(
            chunk.patch_jump(jump),
            Err(CompileError::JumpTooFar { .. })
        ));
    }

    #[test]
    fn opcodes_skip_operands() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write_byte(3, 1);
        let jump = chunk.emit_jump(OpCode::JumpIfFalse, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.patch_jump(jump).unwrap();
        chunk.assert_opcodes(&[OpCode::Constant, OpCode::JumpIfFalse, OpCode::Pop]);
    }

    #[test]
    fn append_concatenates_code_and_lines() {
        let mut a = BytecodeChunk::new();
        a.write_op(OpCode::PushNil, 1);
        let mut b = BytecodeChunk::new();
        b.write_op(OpCode::Return, 9);
        let start = a.append(&b);
        assert_eq!(start, 1);
        assert_eq!(a.lines(), &[1, 9]);
    }
}
