//! Call frames.

use trellis_core::{SharedCell, Value};

/// A frame slot: a plain value, or a cell shared with closures.
#[derive(Debug, Clone)]
pub enum Local {
    Value(Value),
    Cell(SharedCell),
}

impl Default for Local {
    fn default() -> Self {
        Local::Value(Value::Nil)
    }
}

#[derive(Debug)]
pub struct Frame {
    /// Index into the unit's procedure table.
    pub procedure: u32,
    /// Where execution resumes in the caller.
    pub return_ip: usize,
    /// Operand stack height to restore on return.
    pub stack_base: usize,
    pub locals: Vec<Local>,
    pub upvalues: Box<[SharedCell]>,
}

impl Frame {
    pub fn new(
        procedure: u32,
        return_ip: usize,
        stack_base: usize,
        local_count: usize,
        upvalues: Box<[SharedCell]>,
    ) -> Self {
        Self {
            procedure,
            return_ip,
            stack_base,
            locals: vec![Local::default(); local_count],
            upvalues,
        }
    }
}

/// An open protected region.
#[derive(Debug, Clone, Copy)]
pub struct Handler {
    pub handler_ip: usize,
    /// Frame count when the region was entered.
    pub frame_depth: usize,
    pub stack_height: usize,
}
