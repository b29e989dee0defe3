//! The bytecode interpreter.
//!
//! One [`Vm`] is one thread of execution: an operand stack, a frame stack
//! and the open protected regions. Everything shared between threads lives
//! in the [`Runtime`] it was created from.
//!
//! Raised values travel as [`Unwind`] results rather than native unwinding.
//! Catchable runtime errors become string exceptions; the innermost handler
//! truncates frames and the operand stack back to where its region opened.

use std::cmp::Ordering;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;
use trellis_compiler::bytecode::{self, CompiledUnit, OpCode};
use trellis_core::{Closure, RuntimeError, SharedCell, Value};
use trellis_registry::{BuiltinId, BuiltinKind};

use crate::frame::{Frame, Handler, Local};
use crate::ops;
use crate::runtime::Runtime;

type Result<T> = std::result::Result<T, RuntimeError>;

/// Execution state of a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// Not started yet.
    Idle,
    Running,
    /// Inside a builtin call.
    SuspendedInCall,
    /// The outermost frame returned.
    Returned,
    /// An exception escaped every handler.
    Raised,
    /// The main region executed `Halt`.
    Halted,
}

/// Why normal execution stopped.
#[derive(Debug)]
pub enum Unwind {
    /// A program-level `throw`.
    Raise(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Error(err)
    }
}

enum Flow {
    Continue,
    Finish(Value),
}

/// One thread of execution over a shared [`Runtime`].
///
/// A VM is single-use per entry point: create one, call [`run_main`],
/// [`call_procedure`] or [`call_closure`], then inspect [`state`].
///
/// [`run_main`]: Vm::run_main
/// [`call_procedure`]: Vm::call_procedure
/// [`call_closure`]: Vm::call_closure
/// [`state`]: Vm::state
pub struct Vm {
    pub(crate) runtime: Arc<Runtime>,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    handlers: Vec<Handler>,
    ip: usize,
    /// Offset of the instruction being executed, for diagnostics.
    op_start: usize,
    state: VmState,
    /// Builtins resolved on first call, keyed by name constant.
    builtins: FxHashMap<u16, BuiltinId>,
    /// Procedures resolved on first call, keyed by name constant.
    procedures: FxHashMap<u16, u32>,
}

impl Vm {
    /// A fresh VM with empty stacks over `runtime`.
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            runtime,
            stack: Vec::with_capacity(256),
            frames: Vec::new(),
            handlers: Vec::new(),
            ip: 0,
            op_start: 0,
            state: VmState::Idle,
            builtins: FxHashMap::default(),
            procedures: FxHashMap::default(),
        }
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    /// The shared state this VM executes against.
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Run the main program region.
    pub fn run_main(&mut self) -> Result<Value> {
        let main = self
            .runtime
            .procedure(0)
            .ok_or_else(|| RuntimeError::InvalidBytecode {
                offset: 0,
                detail: "unit has no main procedure".into(),
            })?;
        let (entry, locals) = (main.entry as usize, main.local_count as usize);
        self.frames
            .push(Frame::new(0, 0, self.stack.len(), locals, Box::new([])));
        self.ip = entry;
        self.execute()
    }

    /// Call a top-level procedure by name and run it to completion.
    pub fn call_procedure(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let index = self
            .runtime
            .procedure_index(name)
            .ok_or_else(|| RuntimeError::UnknownProcedure { name: name.into() })?;
        self.call_closure(Arc::new(Closure::new(index, Arc::from(name), Box::new([]))), args)
    }

    /// Call a function value and run it to completion.
    pub fn call_closure(&mut self, closure: Arc<Closure>, args: Vec<Value>) -> Result<Value> {
        let argc = args.len();
        self.stack.extend(args);
        self.enter(closure.procedure, argc, closure.upvalues.clone(), false)?;
        self.execute()
    }

    fn execute(&mut self) -> Result<Value> {
        self.state = VmState::Running;
        let runtime = self.runtime.clone();
        let unit = runtime.unit();
        loop {
            match self.step(unit) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Finish(value)) => return Ok(value),
                Err(unwind) => self.unwind(unwind, unit)?,
            }
        }
    }

    /// Transfer control to the innermost handler, or fail the run.
    fn unwind(&mut self, unwind: Unwind, unit: &CompiledUnit) -> Result<()> {
        let value = match unwind {
            Unwind::Raise(value) => value,
            Unwind::Error(err) if err.is_catchable() => Value::str(err.to_string()),
            Unwind::Error(err) => {
                self.state = VmState::Raised;
                return Err(err);
            }
        };
        match self.handlers.pop() {
            Some(handler) => {
                trace!(
                    handler = handler.handler_ip,
                    depth = handler.frame_depth,
                    "unwinding to handler"
                );
                self.frames.truncate(handler.frame_depth);
                self.stack.truncate(handler.stack_height);
                self.stack.push(value);
                self.ip = handler.handler_ip;
                Ok(())
            }
            None => {
                self.state = VmState::Raised;
                Err(RuntimeError::Uncaught {
                    message: value.to_string(),
                    line: unit.line_at(self.op_start),
                })
            }
        }
    }

    // ==========================================================================
    // Dispatch
    // ==========================================================================

    fn step(&mut self, unit: &CompiledUnit) -> std::result::Result<Flow, Unwind> {
        let code = unit.code.as_slice();
        self.op_start = self.ip;
        let byte = self.read_u8(code)?;
        let op = OpCode::from_u8(byte).ok_or_else(|| self.invalid(format!("unknown opcode {byte}")))?;

        match op {
            OpCode::Constant => {
                let index = self.read_u8(code)? as usize;
                self.push_constant(index)?;
            }
            OpCode::ConstantWide => {
                let index = self.read_u16(code)? as usize;
                self.push_constant(index)?;
            }
            OpCode::PushNil => self.stack.push(Value::Nil),
            OpCode::PushTrue => self.stack.push(Value::Bool(true)),
            OpCode::PushFalse => self.stack.push(Value::Bool(false)),
            OpCode::PushZero => self.stack.push(Value::Int(0)),
            OpCode::PushOne => self.stack.push(Value::Int(1)),

            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Dup => {
                let top = self.peek()?.clone();
                self.stack.push(top);
            }

            OpCode::GetLocal => {
                let slot = self.read_u8(code)? as usize;
                self.get_local(slot)?;
            }
            OpCode::GetLocalWide => {
                let slot = self.read_u16(code)? as usize;
                self.get_local(slot)?;
            }
            OpCode::SetLocal => {
                let slot = self.read_u8(code)? as usize;
                self.set_local(slot)?;
            }
            OpCode::SetLocalWide => {
                let slot = self.read_u16(code)? as usize;
                self.set_local(slot)?;
            }
            OpCode::MakeCell => {
                let slot = self.read_u16(code)? as usize;
                *self.local_mut(slot)? = Local::Cell(SharedCell::default());
            }
            OpCode::BoxLocal => {
                let slot = self.read_u16(code)? as usize;
                self.box_local(slot)?;
            }
            OpCode::GetCell => {
                let slot = self.read_u16(code)? as usize;
                let value = self.cell_of(slot)?.get();
                self.stack.push(value);
            }
            OpCode::SetCell => {
                let slot = self.read_u16(code)? as usize;
                let value = self.pop()?;
                self.cell_of(slot)?.set(value);
            }
            OpCode::GetUpvalue => {
                let index = self.read_u8(code)? as usize;
                let value = self.upvalue(index)?.get();
                self.stack.push(value);
            }
            OpCode::SetUpvalue => {
                let index = self.read_u8(code)? as usize;
                let value = self.pop()?;
                self.upvalue(index)?.set(value);
            }

            OpCode::GetGlobal => {
                let slot = self.read_u8(code)? as usize;
                let value = self.runtime.global(slot)?;
                self.stack.push(value);
            }
            OpCode::GetGlobalWide => {
                let slot = self.read_u16(code)? as usize;
                let value = self.runtime.global(slot)?;
                self.stack.push(value);
            }
            OpCode::SetGlobal | OpCode::DefineGlobal => {
                let slot = self.read_u8(code)? as usize;
                let value = self.pop()?;
                self.runtime.set_global(slot, value);
            }
            OpCode::SetGlobalWide | OpCode::DefineGlobalWide => {
                let slot = self.read_u16(code)? as usize;
                let value = self.pop()?;
                self.runtime.set_global(slot, value);
            }

            OpCode::Add => self.binary(ops::add)?,
            OpCode::Sub => self.binary(ops::sub)?,
            OpCode::Mul => self.binary(ops::mul)?,
            OpCode::Div => self.binary(ops::div)?,
            OpCode::IntDiv => self.binary(ops::int_div)?,
            OpCode::Mod => self.binary(ops::modulo)?,
            OpCode::Neg => {
                let value = self.pop()?;
                self.stack.push(ops::neg(&value)?);
            }
            OpCode::Not => {
                let value = self.pop()?;
                self.stack.push(Value::Bool(!value.is_truthy()));
            }
            OpCode::Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(Value::Bool(a == b));
            }
            OpCode::NotEqual => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(Value::Bool(a != b));
            }
            OpCode::Less => self.compare("<", |o| o == Ordering::Less)?,
            OpCode::LessEqual => self.compare("<=", |o| o != Ordering::Greater)?,
            OpCode::Greater => self.compare(">", |o| o == Ordering::Greater)?,
            OpCode::GreaterEqual => self.compare(">=", |o| o != Ordering::Less)?,

            OpCode::Jump => {
                let offset = self.read_u16(code)? as usize;
                self.ip += offset;
            }
            OpCode::JumpIfFalse => {
                let offset = self.read_u16(code)? as usize;
                if !self.pop()?.is_truthy() {
                    self.ip += offset;
                }
            }
            OpCode::JumpIfTrue => {
                let offset = self.read_u16(code)? as usize;
                if self.pop()?.is_truthy() {
                    self.ip += offset;
                }
            }
            OpCode::Loop => {
                let offset = self.read_u16(code)? as usize;
                self.ip = self
                    .ip
                    .checked_sub(offset)
                    .ok_or_else(|| self.invalid("loop target before code start"))?;
            }

            OpCode::Call => {
                let name = self.read_u16(code)?;
                let argc = self.read_u8(code)? as usize;
                let procedure = self.procedure_for(name)?;
                self.enter(procedure, argc, Box::new([]), false)?;
            }
            OpCode::CallValue => {
                let argc = self.read_u8(code)? as usize;
                let callee_at = self
                    .stack
                    .len()
                    .checked_sub(argc + 1)
                    .ok_or_else(|| self.invalid("stack underflow in call"))?;
                match &self.stack[callee_at] {
                    Value::Function(closure) => {
                        let (procedure, upvalues) = (closure.procedure, closure.upvalues.clone());
                        self.enter(procedure, argc, upvalues, true)?;
                    }
                    other => {
                        return Err(RuntimeError::NotCallable {
                            type_name: other.type_name(),
                        }
                        .into());
                    }
                }
            }
            OpCode::CallBuiltin => {
                let name = self.read_u8(code)? as u16;
                let argc = self.read_u8(code)? as usize;
                self.call_builtin(name, argc)?;
            }
            OpCode::CallBuiltinWide => {
                let name = self.read_u16(code)?;
                let argc = self.read_u8(code)? as usize;
                self.call_builtin(name, argc)?;
            }
            OpCode::Closure => {
                let name = self.read_u16(code)?;
                let count = self.read_u8(code)? as usize;
                let mut upvalues = Vec::with_capacity(count);
                for _ in 0..count {
                    let byte = self.read_u8(code)?;
                    let cell = match OpCode::from_u8(byte) {
                        Some(OpCode::CaptureLocal) => {
                            let slot = self.read_u16(code)? as usize;
                            self.capture_local(slot)?
                        }
                        Some(OpCode::CaptureUpvalue) => {
                            let index = self.read_u8(code)? as usize;
                            self.upvalue(index)?.clone()
                        }
                        _ => return Err(self.invalid("closure without capture instruction").into()),
                    };
                    upvalues.push(cell);
                }
                let closure = self.make_closure(name, upvalues.into_boxed_slice())?;
                self.stack.push(Value::Function(closure));
            }
            OpCode::CaptureLocal | OpCode::CaptureUpvalue => {
                return Err(self.invalid("capture outside of closure").into());
            }
            OpCode::PushFunction => {
                let name = self.read_u16(code)?;
                let closure = self.make_closure(name, Box::new([]))?;
                self.stack.push(Value::Function(closure));
            }
            OpCode::Return => {
                let result = self.pop()?;
                let frame = self
                    .frames
                    .pop()
                    .ok_or_else(|| self.invalid("return without frame"))?;
                self.stack.truncate(frame.stack_base);
                let depth = self.frames.len();
                self.handlers.retain(|h| h.frame_depth <= depth);
                if self.frames.is_empty() {
                    self.state = VmState::Returned;
                    return Ok(Flow::Finish(result));
                }
                self.stack.push(result);
                self.ip = frame.return_ip;
            }
            OpCode::Halt => {
                let result = self.pop()?;
                self.state = VmState::Halted;
                return Ok(Flow::Finish(result));
            }

            OpCode::MakeArray => {
                let count = self.read_u16(code)? as usize;
                let start = self
                    .stack
                    .len()
                    .checked_sub(count)
                    .ok_or_else(|| self.invalid("stack underflow in array literal"))?;
                let items = self.stack.split_off(start);
                self.stack.push(Value::array(items));
            }
            OpCode::Index => {
                let index = self.pop()?;
                let target = self.pop()?;
                self.stack.push(ops::index(&target, &index)?);
            }
            OpCode::SetIndex => {
                let value = self.pop()?;
                let index = self.pop()?;
                let target = self.pop()?;
                let updated = ops::set_index(target, &index, value.clone())?;
                self.stack.push(value);
                self.stack.push(updated);
            }
            OpCode::MatchArray => {
                let len = self.read_u16(code)? as usize;
                let value = self.pop()?;
                let matched = matches!(&value, Value::Array(items) if items.len() == len);
                self.stack.push(Value::Bool(matched));
            }
            OpCode::NoMatch => return Err(RuntimeError::NoMatch.into()),

            OpCode::TryBegin => {
                let offset = self.read_u16(code)? as usize;
                self.handlers.push(Handler {
                    handler_ip: self.ip + offset,
                    frame_depth: self.frames.len(),
                    stack_height: self.stack.len(),
                });
            }
            OpCode::TryEnd => {
                self.handlers.pop();
            }
            OpCode::Throw => {
                let value = self.pop()?;
                return Err(Unwind::Raise(value));
            }
        }
        Ok(Flow::Continue)
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Push a frame for `procedure`, moving its arguments off the stack.
    fn enter(
        &mut self,
        procedure: u32,
        argc: usize,
        upvalues: Box<[SharedCell]>,
        drop_callee: bool,
    ) -> Result<()> {
        let runtime = self.runtime.clone();
        let record = runtime
            .procedure(procedure)
            .ok_or_else(|| self.invalid(format!("procedure {procedure} out of range")))?;
        if argc != record.arity as usize {
            return Err(RuntimeError::Arity {
                name: record.name.clone(),
                expected: record.arity as usize,
                found: argc,
            });
        }
        if self.frames.len() >= runtime.config().max_frames {
            return Err(RuntimeError::StackOverflow {
                depth: self.frames.len(),
            });
        }
        let args_start = self
            .stack
            .len()
            .checked_sub(argc)
            .ok_or_else(|| self.invalid("stack underflow in call"))?;
        let args = self.stack.split_off(args_start);
        if drop_callee {
            self.stack.pop();
        }
        let mut frame = Frame::new(
            procedure,
            self.ip,
            self.stack.len(),
            (record.local_count as usize).max(argc),
            upvalues,
        );
        for (slot, value) in args.into_iter().enumerate() {
            frame.locals[slot] = Local::Value(value);
        }
        self.frames.push(frame);
        self.ip = record.entry as usize;
        Ok(())
    }

    fn call_builtin(&mut self, name: u16, argc: usize) -> Result<()> {
        let id = match self.builtins.get(&name) {
            Some(id) => *id,
            None => {
                let text = self.name_constant(name)?;
                let entry = self
                    .runtime
                    .registry()
                    .lookup(&text)
                    .ok_or(RuntimeError::UnknownBuiltin { name: text })?;
                let id = entry.id;
                self.builtins.insert(name, id);
                id
            }
        };
        let start = self
            .stack
            .len()
            .checked_sub(argc)
            .ok_or_else(|| self.invalid("stack underflow in builtin call"))?;
        let args = self.stack.split_off(start);
        let value = self.call_builtin_by_id(id, &args)?;
        self.stack.push(value);
        Ok(())
    }

    /// Run a builtin with the VM as its host. Procedures yield `nil`.
    pub(crate) fn call_builtin_by_id(&mut self, id: BuiltinId, args: &[Value]) -> Result<Value> {
        let registry = self.runtime.registry().clone();
        let entry = registry
            .get(id)
            .ok_or_else(|| self.invalid(format!("builtin id {} out of range", id.0)))?;
        if !entry.arity.accepts(args.len()) {
            return Err(RuntimeError::builtin(
                entry.name.clone(),
                format!("expects {} arguments, found {}", entry.arity, args.len()),
            ));
        }
        let previous = self.state;
        self.state = VmState::SuspendedInCall;
        let result = (entry.func)(self, args);
        self.state = previous;
        let value = result?;
        Ok(match entry.kind {
            BuiltinKind::Function => value,
            BuiltinKind::Procedure => Value::Nil,
        })
    }

    fn procedure_for(&mut self, name: u16) -> Result<u32> {
        if let Some(index) = self.procedures.get(&name) {
            return Ok(*index);
        }
        let text = self.name_constant(name)?;
        let index = self
            .runtime
            .procedure_index(&text)
            .ok_or(RuntimeError::UnknownProcedure { name: text })?;
        self.procedures.insert(name, index);
        Ok(index)
    }

    fn make_closure(&mut self, name: u16, upvalues: Box<[SharedCell]>) -> Result<Arc<Closure>> {
        let procedure = self.procedure_for(name)?;
        let name = self.name_constant(name)?;
        Ok(Arc::new(Closure::new(procedure, Arc::from(name), upvalues)))
    }

    fn name_constant(&self, index: u16) -> Result<String> {
        match self.runtime.constant(index as usize) {
            Some(Value::Str(name)) => Ok(name.to_string()),
            _ => Err(self.invalid(format!("constant {index} is not a name"))),
        }
    }

    // ==========================================================================
    // Stack, locals and cells
    // ==========================================================================

    /// Read a one-byte operand and advance past it.
    fn read_u8(&mut self, code: &[u8]) -> Result<u8> {
        let byte = *code
            .get(self.ip)
            .ok_or_else(|| self.invalid("operand runs past the end of code"))?;
        self.ip += 1;
        Ok(byte)
    }

    /// Read a big-endian two-byte operand and advance past it.
    fn read_u16(&mut self, code: &[u8]) -> Result<u16> {
        let value = bytecode::read_u16(code, self.ip)
            .ok_or_else(|| self.invalid("operand runs past the end of code"))?;
        self.ip += 2;
        Ok(value)
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| self.invalid("operand stack underflow"))
    }

    fn peek(&self) -> Result<&Value> {
        self.stack
            .last()
            .ok_or_else(|| self.invalid("operand stack underflow"))
    }

    fn push_constant(&mut self, index: usize) -> Result<()> {
        let value = self
            .runtime
            .constant(index)
            .cloned()
            .ok_or_else(|| self.invalid(format!("constant {index} out of range")))?;
        self.stack.push(value);
        Ok(())
    }

    fn binary(&mut self, op: fn(&Value, &Value) -> Result<Value>) -> Result<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.stack.push(op(&a, &b)?);
        Ok(())
    }

    fn compare(&mut self, name: &'static str, test: fn(Ordering) -> bool) -> Result<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let ordering = ops::compare(name, &a, &b)?;
        self.stack.push(Value::Bool(test(ordering)));
        Ok(())
    }

    fn frame(&self) -> Result<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| self.invalid("no active frame"))
    }

    fn local_mut(&mut self, slot: usize) -> Result<&mut Local> {
        let offset = self.op_start;
        self.frames
            .last_mut()
            .and_then(|frame| frame.locals.get_mut(slot))
            .ok_or_else(|| RuntimeError::InvalidBytecode {
                offset,
                detail: format!("local slot {slot} out of range"),
            })
    }

    fn get_local(&mut self, slot: usize) -> Result<()> {
        let local = self
            .frame()?
            .locals
            .get(slot)
            .cloned()
            .ok_or_else(|| self.invalid(format!("local slot {slot} out of range")))?;
        let value = match local {
            Local::Value(value) => value,
            Local::Cell(cell) => cell.get(),
        };
        self.stack.push(value);
        Ok(())
    }

    /// Plain stores replace the slot: a reused slot must not write through
    /// a cell some closure still holds.
    fn set_local(&mut self, slot: usize) -> Result<()> {
        let value = self.pop()?;
        *self.local_mut(slot)? = Local::Value(value);
        Ok(())
    }

    /// Move a slot's value into a fresh cell, unless it already has one.
    fn box_local(&mut self, slot: usize) -> Result<SharedCell> {
        let local = self.local_mut(slot)?;
        match local {
            Local::Cell(cell) => Ok(cell.clone()),
            Local::Value(value) => {
                let cell = SharedCell::new(std::mem::take(value));
                *local = Local::Cell(cell.clone());
                Ok(cell)
            }
        }
    }

    fn cell_of(&self, slot: usize) -> Result<&SharedCell> {
        match self.frame()?.locals.get(slot) {
            Some(Local::Cell(cell)) => Ok(cell),
            _ => Err(self.invalid(format!("slot {slot} holds no cell"))),
        }
    }

    fn capture_local(&mut self, slot: usize) -> Result<SharedCell> {
        self.box_local(slot)
    }

    fn upvalue(&self, index: usize) -> Result<&SharedCell> {
        self.frame()?
            .upvalues
            .get(index)
            .ok_or_else(|| self.invalid(format!("upvalue {index} out of range")))
    }

    fn invalid(&self, detail: impl Into<String>) -> RuntimeError {
        RuntimeError::InvalidBytecode {
            offset: self.op_start,
            detail: detail.into(),
        }
    }
}
