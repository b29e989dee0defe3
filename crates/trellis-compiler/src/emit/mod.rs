//! Bytecode emitter.
//!
//! [`BytecodeEmitter`] wraps a [`BytecodeChunk`] with the unit's shared
//! constant pool and a [`JumpManager`], choosing narrow or wide operand
//! variants by index range.
//!
//! ```ignore
//! let mut constants = ConstantPool::new();
//! let mut emitter = BytecodeEmitter::new(&mut constants);
//! emitter.set_line(1);
//! emitter.emit_int(42)?;
//! emitter.emit(OpCode::Return);
//! let chunk = emitter.finish();
//! ```

mod jumps;

use trellis_ast::Literal;
use trellis_core::CompileError;

use crate::bytecode::{BytecodeChunk, Constant, ConstantPool, OpCode};
use jumps::JumpManager;

/// Operand offset of a forward jump awaiting its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpLabel(pub usize);

/// How a closure obtains one captured cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOp {
    /// The cell stored in a slot of the creating frame.
    Local(u16),
    /// An upvalue of the creating closure.
    Upvalue(u8),
}

type Result<T> = std::result::Result<T, CompileError>;

/// Emits bytecode for one function.
pub struct BytecodeEmitter<'pool> {
    chunk: BytecodeChunk,
    constants: &'pool mut ConstantPool,
    jumps: JumpManager,
    current_line: u32,
    /// Protected regions currently open.
    try_depth: usize,
}

impl<'pool> BytecodeEmitter<'pool> {
    pub fn new(constants: &'pool mut ConstantPool) -> Self {
        Self {
            chunk: BytecodeChunk::new(),
            constants,
            jumps: JumpManager::new(),
            current_line: 1,
            try_depth: 0,
        }
    }

    /// Set the source line attached to subsequent instructions.
    pub fn set_line(&mut self, line: u32) {
        if line != 0 {
            self.current_line = line;
        }
    }

    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    pub fn emit(&mut self, op: OpCode) {
        self.chunk.write_op(op, self.current_line);
    }

    pub fn emit_byte(&mut self, op: OpCode, byte: u8) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_byte(byte, self.current_line);
    }

    pub fn emit_u16(&mut self, op: OpCode, value: u16) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_u16(value, self.current_line);
    }

    /// Pick the narrow or wide form of an instruction by operand range.
    fn emit_sized(&mut self, narrow: OpCode, wide: OpCode, index: u16) {
        if index < 256 {
            self.emit_byte(narrow, index as u8);
        } else {
            self.emit_u16(wide, index);
        }
    }

    /// Intern a constant, returning its 16-bit index.
    pub fn constant_index(&mut self, constant: Constant) -> Result<u16> {
        let index = self.constants.add(constant);
        u16::try_from(index).map_err(|_| CompileError::TooManyConstants {
            limit: u16::MAX as usize + 1,
        })
    }

    fn name_index(&mut self, name: &str) -> Result<u16> {
        self.constant_index(Constant::Str(name.to_string()))
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    pub fn emit_constant(&mut self, constant: Constant) -> Result<()> {
        let index = self.constant_index(constant)?;
        self.emit_sized(OpCode::Constant, OpCode::ConstantWide, index);
        Ok(())
    }

    /// Emit an integer, using `PushZero`/`PushOne` for 0 and 1.
    pub fn emit_int(&mut self, value: i64) -> Result<()> {
        match value {
            0 => self.emit(OpCode::PushZero),
            1 => self.emit(OpCode::PushOne),
            _ => self.emit_constant(Constant::Int(value))?,
        }
        Ok(())
    }

    pub fn emit_literal(&mut self, literal: &Literal) -> Result<()> {
        match literal {
            Literal::Nil => self.emit(OpCode::PushNil),
            Literal::Bool(true) => self.emit(OpCode::PushTrue),
            Literal::Bool(false) => self.emit(OpCode::PushFalse),
            Literal::Int(v) => self.emit_int(*v)?,
            Literal::Real(v) => self.emit_constant(Constant::Real(*v))?,
            Literal::Str(s) => self.emit_constant(Constant::Str(s.clone()))?,
        }
        Ok(())
    }

    // ==========================================================================
    // Variables
    // ==========================================================================

    pub fn emit_get_local(&mut self, slot: u16) {
        self.emit_sized(OpCode::GetLocal, OpCode::GetLocalWide, slot);
    }

    pub fn emit_set_local(&mut self, slot: u16) {
        self.emit_sized(OpCode::SetLocal, OpCode::SetLocalWide, slot);
    }

    pub fn emit_get_global(&mut self, slot: u16) {
        self.emit_sized(OpCode::GetGlobal, OpCode::GetGlobalWide, slot);
    }

    pub fn emit_set_global(&mut self, slot: u16) {
        self.emit_sized(OpCode::SetGlobal, OpCode::SetGlobalWide, slot);
    }

    pub fn emit_define_global(&mut self, slot: u16) {
        self.emit_sized(OpCode::DefineGlobal, OpCode::DefineGlobalWide, slot);
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Call a procedure by name.
    pub fn emit_call(&mut self, procedure: &str, argc: u8) -> Result<()> {
        let index = self.name_index(procedure)?;
        self.emit_u16(OpCode::Call, index);
        self.chunk.write_byte(argc, self.current_line);
        Ok(())
    }

    pub fn emit_call_builtin(&mut self, name: &str, argc: u8) -> Result<()> {
        let index = self.name_index(name)?;
        if index < 256 {
            self.emit_byte(OpCode::CallBuiltin, index as u8);
        } else {
            self.emit_u16(OpCode::CallBuiltinWide, index);
        }
        self.chunk.write_byte(argc, self.current_line);
        Ok(())
    }

    pub fn emit_push_function(&mut self, procedure: &str) -> Result<()> {
        let index = self.name_index(procedure)?;
        self.emit_u16(OpCode::PushFunction, index);
        Ok(())
    }

    /// Build a closure over `procedure` with the given captures.
    pub fn emit_closure(&mut self, procedure: &str, captures: &[CaptureOp]) -> Result<()> {
        let index = self.name_index(procedure)?;
        let count = u8::try_from(captures.len()).map_err(|_| CompileError::TooManyUpvalues {
            function: procedure.to_string(),
            limit: u8::MAX as usize,
        })?;
        self.emit_u16(OpCode::Closure, index);
        self.chunk.write_byte(count, self.current_line);
        for capture in captures {
            match *capture {
                CaptureOp::Local(slot) => self.emit_u16(OpCode::CaptureLocal, slot),
                CaptureOp::Upvalue(idx) => self.emit_byte(OpCode::CaptureUpvalue, idx),
            }
        }
        Ok(())
    }

    // ==========================================================================
    // Jumps
    // ==========================================================================

    pub fn emit_jump(&mut self, op: OpCode) -> JumpLabel {
        JumpLabel(self.chunk.emit_jump(op, self.current_line))
    }

    pub fn patch_jump(&mut self, label: JumpLabel) -> Result<()> {
        self.chunk.patch_jump(label.0)
    }

    pub fn emit_loop(&mut self, target: usize) -> Result<()> {
        self.chunk.emit_loop(target, self.current_line)
    }

    pub fn current_offset(&self) -> usize {
        self.chunk.current_offset()
    }

    // ==========================================================================
    // Loops
    // ==========================================================================

    /// Enter a loop. `None` means the continue target follows the body.
    pub fn enter_loop(&mut self, continue_target: Option<usize>) {
        self.jumps.enter_loop(continue_target, self.try_depth);
    }

    /// Fix the continue target and patch continues emitted so far.
    pub fn set_continue_target(&mut self, target: usize) -> Result<()> {
        for label in self.jumps.set_continue_target(target) {
            self.chunk.patch_jump(label.0)?;
        }
        Ok(())
    }

    /// Exit the loop, pointing every break at the current position.
    pub fn exit_loop(&mut self) -> Result<()> {
        let (breaks, continues) = self.jumps.exit_loop();
        for label in breaks.into_iter().chain(continues) {
            self.chunk.patch_jump(label.0)?;
        }
        Ok(())
    }

    pub fn emit_break(&mut self) -> Result<()> {
        self.close_regions_for_loop_exit("break")?;
        let label = self.emit_jump(OpCode::Jump);
        self.jumps.add_break(label);
        Ok(())
    }

    pub fn emit_continue(&mut self) -> Result<()> {
        self.close_regions_for_loop_exit("continue")?;
        match self.jumps.continue_target() {
            Some(target) => self.emit_loop(target),
            None => {
                let label = self.emit_jump(OpCode::Jump);
                self.jumps.add_pending_continue(label);
                Ok(())
            }
        }
    }

    /// Leave every protected region opened inside the current loop.
    fn close_regions_for_loop_exit(&mut self, keyword: &'static str) -> Result<()> {
        let loop_depth = self
            .jumps
            .loop_try_depth()
            .ok_or(CompileError::NotInLoop { keyword })?;
        for _ in loop_depth..self.try_depth {
            self.emit(OpCode::TryEnd);
        }
        Ok(())
    }

    pub fn in_loop(&self) -> bool {
        self.jumps.in_loop()
    }

    // ==========================================================================
    // Protected regions
    // ==========================================================================

    /// Emit `TryBegin` and return the handler-offset label.
    pub fn begin_try(&mut self) -> JumpLabel {
        self.try_depth += 1;
        self.emit_jump(OpCode::TryBegin)
    }

    pub fn end_try(&mut self) {
        self.try_depth = self.try_depth.saturating_sub(1);
        self.emit(OpCode::TryEnd);
    }

    pub fn try_depth(&self) -> usize {
        self.try_depth
    }

    pub fn finish(self) -> BytecodeChunk {
        self.chunk
    }

    pub fn code_size(&self) -> usize {
        self.chunk.len()
    }
}
