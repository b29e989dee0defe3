//! Bytecode operation codes.
//!
//! Each opcode is a single byte with its operands following inline,
//! big-endian. Operand widths are fixed per opcode so the stream can be
//! walked without decoding semantics (see [`OpCode::operand_size`]).

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bytecode operation codes.
///
/// The VM is a stack machine: operations pop their inputs and push their
/// result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push constant from pool. Operand: u8 index.
    Constant = 0,
    /// Push constant from pool. Operand: u16 index.
    ConstantWide,
    PushNil,
    PushTrue,
    PushFalse,
    PushZero,
    PushOne,

    // =========================================================================
    // Stack
    // =========================================================================
    Pop,
    Dup,

    // =========================================================================
    // Locals and cells
    // =========================================================================
    /// Operand: u8 slot.
    GetLocal,
    /// Pop into a local. Operand: u8 slot.
    SetLocal,
    /// Operand: u16 slot.
    GetLocalWide,
    /// Operand: u16 slot.
    SetLocalWide,
    /// Replace a slot with a fresh cell holding nil. Operand: u16 slot.
    MakeCell,
    /// Move a slot's value into a fresh cell. Operand: u16 slot.
    BoxLocal,
    /// Read through the cell in a slot. Operand: u16 slot.
    GetCell,
    /// Pop and write through the cell in a slot. Operand: u16 slot.
    SetCell,
    /// Operand: u8 upvalue index.
    GetUpvalue,
    /// Operand: u8 upvalue index.
    SetUpvalue,

    // =========================================================================
    // Globals
    // =========================================================================
    /// Operand: u8 slot.
    GetGlobal,
    /// Operand: u16 slot.
    GetGlobalWide,
    /// Pop into a global. Operand: u8 slot.
    SetGlobal,
    /// Operand: u16 slot.
    SetGlobalWide,
    /// Pop into a global, defining it. Operand: u8 slot.
    DefineGlobal,
    /// Operand: u16 slot.
    DefineGlobalWide,

    // =========================================================================
    // Arithmetic and comparison
    // =========================================================================
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Neg,
    Not,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // =========================================================================
    // Control flow
    // =========================================================================
    /// Unconditional forward jump. Operand: u16 offset.
    Jump,
    /// Pop; jump forward when falsy. Operand: u16 offset.
    JumpIfFalse,
    /// Pop; jump forward when truthy. Operand: u16 offset.
    JumpIfTrue,
    /// Unconditional backward jump. Operand: u16 offset.
    Loop,

    // =========================================================================
    // Calls and closures
    // =========================================================================
    /// Call a procedure by name. Operands: u16 name constant, u8 argc.
    Call,
    /// Call the function value beneath the arguments. Operand: u8 argc.
    CallValue,
    /// Operands: u8 name constant, u8 argc.
    CallBuiltin,
    /// Operands: u16 name constant, u8 argc.
    CallBuiltinWide,
    /// Build a closure. Operands: u16 procedure name constant, u8 capture
    /// count; followed by that many capture instructions.
    Closure,
    /// Capture the cell in an enclosing-frame slot. Operand: u16 slot.
    CaptureLocal,
    /// Capture an upvalue of the enclosing closure. Operand: u8 index.
    CaptureUpvalue,
    /// Push a top-level procedure as a function value. Operand: u16 name constant.
    PushFunction,
    /// Pop the return value and leave the current frame.
    Return,
    /// Pop the program result and stop.
    Halt,

    // =========================================================================
    // Arrays and patterns
    // =========================================================================
    /// Operand: u16 element count.
    MakeArray,
    /// Pop index and array, push element.
    Index,
    /// Pop value, index and array; push the value, then the updated array.
    SetIndex,
    /// Pop a value, push whether it is an array of the given length.
    /// Operand: u16 length.
    MatchArray,
    /// Raise the no-match error.
    NoMatch,

    // =========================================================================
    // Exceptions
    // =========================================================================
    /// Enter a protected region. Operand: u16 forward offset to the handler.
    TryBegin,
    /// Leave the innermost protected region.
    TryEnd,
    /// Pop a value and raise it.
    Throw,
}

impl OpCode {
    /// Decode a byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Size of the inline operands in bytes, excluding the opcode byte.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetUpvalue
            | OpCode::SetUpvalue
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::DefineGlobal
            | OpCode::CallValue
            | OpCode::CaptureUpvalue => 1,

            OpCode::ConstantWide
            | OpCode::GetLocalWide
            | OpCode::SetLocalWide
            | OpCode::MakeCell
            | OpCode::BoxLocal
            | OpCode::GetCell
            | OpCode::SetCell
            | OpCode::GetGlobalWide
            | OpCode::SetGlobalWide
            | OpCode::DefineGlobalWide
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfTrue
            | OpCode::Loop
            | OpCode::CallBuiltin
            | OpCode::CaptureLocal
            | OpCode::PushFunction
            | OpCode::MakeArray
            | OpCode::MatchArray
            | OpCode::TryBegin => 2,

            OpCode::Call | OpCode::CallBuiltinWide | OpCode::Closure => 3,

            OpCode::PushNil
            | OpCode::PushTrue
            | OpCode::PushFalse
            | OpCode::PushZero
            | OpCode::PushOne
            | OpCode::Pop
            | OpCode::Dup
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::IntDiv
            | OpCode::Mod
            | OpCode::Neg
            | OpCode::Not
            | OpCode::Equal
            | OpCode::NotEqual
            | OpCode::Less
            | OpCode::LessEqual
            | OpCode::Greater
            | OpCode::GreaterEqual
            | OpCode::Return
            | OpCode::Halt
            | OpCode::Index
            | OpCode::SetIndex
            | OpCode::NoMatch
            | OpCode::TryEnd
            | OpCode::Throw => 0,
        }
    }

    /// Mnemonic used by the disassembler.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::ConstantWide => "CONSTANT_WIDE",
            OpCode::PushNil => "PUSH_NIL",
            OpCode::PushTrue => "PUSH_TRUE",
            OpCode::PushFalse => "PUSH_FALSE",
            OpCode::PushZero => "PUSH_ZERO",
            OpCode::PushOne => "PUSH_ONE",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::GetLocalWide => "GET_LOCAL_WIDE",
            OpCode::SetLocalWide => "SET_LOCAL_WIDE",
            OpCode::MakeCell => "MAKE_CELL",
            OpCode::BoxLocal => "BOX_LOCAL",
            OpCode::GetCell => "GET_CELL",
            OpCode::SetCell => "SET_CELL",
            OpCode::GetUpvalue => "GET_UPVALUE",
            OpCode::SetUpvalue => "SET_UPVALUE",
            OpCode::GetGlobal => "GET_GLOBAL",
            OpCode::GetGlobalWide => "GET_GLOBAL_WIDE",
            OpCode::SetGlobal => "SET_GLOBAL",
            OpCode::SetGlobalWide => "SET_GLOBAL_WIDE",
            OpCode::DefineGlobal => "DEFINE_GLOBAL",
            OpCode::DefineGlobalWide => "DEFINE_GLOBAL_WIDE",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::IntDiv => "INT_DIV",
            OpCode::Mod => "MOD",
            OpCode::Neg => "NEG",
            OpCode::Not => "NOT",
            OpCode::Equal => "EQUAL",
            OpCode::NotEqual => "NOT_EQUAL",
            OpCode::Less => "LESS",
            OpCode::LessEqual => "LESS_EQUAL",
            OpCode::Greater => "GREATER",
            OpCode::GreaterEqual => "GREATER_EQUAL",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfTrue => "JUMP_IF_TRUE",
            OpCode::Loop => "LOOP",
            OpCode::Call => "CALL",
            OpCode::CallValue => "CALL_VALUE",
            OpCode::CallBuiltin => "CALL_BUILTIN",
            OpCode::CallBuiltinWide => "CALL_BUILTIN_WIDE",
            OpCode::Closure => "CLOSURE",
            OpCode::CaptureLocal => "CAPTURE_LOCAL",
            OpCode::CaptureUpvalue => "CAPTURE_UPVALUE",
            OpCode::PushFunction => "PUSH_FUNCTION",
            OpCode::Return => "RETURN",
            OpCode::Halt => "HALT",
            OpCode::MakeArray => "MAKE_ARRAY",
            OpCode::Index => "INDEX",
            OpCode::SetIndex => "SET_INDEX",
            OpCode::MatchArray => "MATCH_ARRAY",
            OpCode::NoMatch => "NO_MATCH",
            OpCode::TryBegin => "TRY_BEGIN",
            OpCode::TryEnd => "TRY_END",
            OpCode::Throw => "THROW",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        for byte in 0..=u8::MAX {
            if let Some(op) = OpCode::from_u8(byte) {
                assert_eq!(u8::from(op), byte);
            }
        }
        assert_eq!(OpCode::from_u8(0), Some(OpCode::Constant));
        assert_eq!(OpCode::from_u8(OpCode::Throw as u8 + 1), None);
    }

    #[test]
    fn operand_sizes() {
        assert_eq!(OpCode::Pop.operand_size(), 0);
        assert_eq!(OpCode::Return.operand_size(), 0);
        assert_eq!(OpCode::Constant.operand_size(), 1);
        assert_eq!(OpCode::ConstantWide.operand_size(), 2);
        assert_eq!(OpCode::CallBuiltin.operand_size(), 2);
        assert_eq!(OpCode::CallBuiltinWide.operand_size(), 3);
        assert_eq!(OpCode::Call.operand_size(), 3);
        assert_eq!(OpCode::Jump.operand_size(), 2);
    }

    #[test]
    fn names_are_screaming_snake() {
        assert_eq!(OpCode::JumpIfFalse.name(), "JUMP_IF_FALSE");
        assert_eq!(OpCode::DefineGlobalWide.name(), "DEFINE_GLOBAL_WIDE");
    }
}
