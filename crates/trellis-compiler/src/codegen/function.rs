//! Per-routine compiler state.

use rustc_hash::{FxHashMap, FxHashSet};
use trellis_ast::{BindingId, FunctionDecl, FunctionId, Program, Resolved, Stmt};
use trellis_core::{CompileError, Span};

use crate::bytecode::{BytecodeChunk, ConstantPool, OpCode};
use crate::emit::{BytecodeEmitter, CaptureOp, JumpLabel};
use crate::resolve::{Binding, CaptureSource, Resolution};

use super::Result;

/// Compiles one routine (a function, a lambda, or the main program).
pub struct FunctionCompiler<'ast, 'pool, 'res> {
    pub(super) emitter: BytecodeEmitter<'pool>,
    pub(super) resolution: &'res Resolution,
    function: FunctionId,
    /// Captured bindings whose cell was already created at block entry.
    premade: FxHashSet<BindingId>,
    labels: FxHashMap<String, usize>,
    pending_gotos: FxHashMap<String, Vec<JumpLabel>>,
    /// Functions met in this routine, compiled after it.
    pub(super) nested: Vec<&'ast FunctionDecl>,
}

impl<'ast, 'pool, 'res> FunctionCompiler<'ast, 'pool, 'res> {
    pub fn new(
        constants: &'pool mut ConstantPool,
        resolution: &'res Resolution,
        function: FunctionId,
    ) -> Self {
        Self {
            emitter: BytecodeEmitter::new(constants),
            resolution,
            function,
            premade: FxHashSet::default(),
            labels: FxHashMap::default(),
            pending_gotos: FxHashMap::default(),
            nested: Vec::new(),
        }
    }

    /// Compile the main program region: module initialisers in dependency
    /// order, the top-level statements, the optional entry call, `Halt`.
    pub fn compile_main(&mut self, program: &'ast Program) -> Result<()> {
        for &index in &self.resolution.module_order {
            let Some(module) = program.modules.get(index) else {
                continue;
            };
            self.emitter.set_line(module.name.span.line);
            for item in &module.items {
                self.compile_stmt(&item.stmt)?;
            }
        }

        self.prepare_block(&program.body)?;
        for stmt in &program.body {
            self.compile_stmt(stmt)?;
        }

        match &program.entry {
            Some(entry) => {
                self.emitter.set_line(entry.ident.span.line);
                match &entry.resolved {
                    Some(Resolved::Procedure(name)) => self.emitter.emit_call(name, 0)?,
                    Some(resolved) => {
                        self.emit_load(resolved, &entry.ident.name, entry.ident.span)?;
                        self.emitter.emit_byte(OpCode::CallValue, 0);
                    }
                    None => {
                        return Err(CompileError::Unresolved {
                            name: entry.ident.name.clone(),
                            span: entry.ident.span,
                        });
                    }
                }
            }
            None => self.emitter.emit(OpCode::PushNil),
        }
        self.emitter.emit(OpCode::Halt);
        Ok(())
    }

    /// Compile a function body with its implicit trailing return.
    pub fn compile_function(&mut self, decl: &'ast FunctionDecl) -> Result<()> {
        self.emitter.set_line(decl.span.line);
        for param in &decl.params {
            if let Some(Resolved::Local(id)) = &param.resolved {
                let binding = self.binding(*id);
                if binding.is_captured() {
                    let slot = self.slot_of(*id)?;
                    self.emitter.emit_u16(OpCode::BoxLocal, slot);
                    self.premade.insert(*id);
                }
            }
        }

        self.prepare_block(&decl.body.stmts)?;
        for stmt in &decl.body.stmts {
            self.compile_stmt(stmt)?;
        }
        self.emitter.emit(OpCode::PushNil);
        self.emitter.emit(OpCode::Return);
        Ok(())
    }

    pub fn finish(self) -> Result<(BytecodeChunk, Vec<&'ast FunctionDecl>)> {
        if let Some((name, _)) = self.pending_gotos.iter().find(|(_, l)| !l.is_empty()) {
            return Err(CompileError::Unresolved {
                name: name.clone(),
                span: Span::default(),
            });
        }
        Ok((self.emitter.finish(), self.nested))
    }

    // ==========================================================================
    // Bindings
    // ==========================================================================

    pub(super) fn binding(&self, id: BindingId) -> &'res Binding {
        self.resolution.binding(id)
    }

    pub(super) fn slot_of(&self, id: BindingId) -> Result<u16> {
        let binding = self.binding(id);
        let slot = binding.local_slot().ok_or_else(|| CompileError::Unresolved {
            name: binding.name.clone(),
            span: binding.span,
        })?;
        u16::try_from(slot).map_err(|_| CompileError::TooManyLocals {
            function: self.resolution.function(self.function).procedure.clone(),
            limit: u16::MAX as usize,
        })
    }

    fn global_slot(slot: u32) -> Result<u16> {
        u16::try_from(slot).map_err(|_| CompileError::TooManyGlobals {
            slot: slot as usize,
        })
    }

    /// Create the cell of a captured local unless block entry already did.
    pub(super) fn ensure_cell(&mut self, id: BindingId) -> Result<()> {
        if self.binding(id).is_captured() && self.premade.insert(id) {
            let slot = self.slot_of(id)?;
            self.emitter.emit_u16(OpCode::MakeCell, slot);
        }
        Ok(())
    }

    /// Block entry: create cells for captured locals the block declares,
    /// then instantiate its nested functions so they can call each other.
    pub(super) fn prepare_block(&mut self, stmts: &'ast [Stmt]) -> Result<()> {
        for stmt in stmts {
            let id = match stmt {
                Stmt::Var(decl) => match &decl.resolved {
                    Some(Resolved::Local(id)) => Some(*id),
                    _ => None,
                },
                Stmt::Function(decl) => match &decl.resolved {
                    Some(Resolved::Local(id)) => Some(*id),
                    _ => None,
                },
                _ => None,
            };
            if let Some(id) = id {
                if self.binding(id).is_captured() {
                    let slot = self.slot_of(id)?;
                    self.emitter.emit_u16(OpCode::MakeCell, slot);
                    self.premade.insert(id);
                }
            }
        }
        for stmt in stmts {
            if let Stmt::Function(decl) = stmt {
                if let Some(Resolved::Local(id)) = &decl.resolved {
                    self.emitter.set_line(decl.span.line);
                    self.emit_closure(decl)?;
                    self.emit_store_local(*id)?;
                }
            }
        }
        Ok(())
    }

    /// Queue `decl` for compilation and push a closure over it.
    pub(super) fn emit_closure(&mut self, decl: &'ast FunctionDecl) -> Result<()> {
        let function = decl.function.ok_or_else(|| CompileError::Unresolved {
            name: decl.name.name.clone(),
            span: decl.span,
        })?;
        let info = self.resolution.function(function);
        let mut captures = Vec::with_capacity(info.captures.len());
        for capture in &info.captures {
            captures.push(match capture.source {
                CaptureSource::Local(id) => CaptureOp::Local(self.slot_of(id)?),
                CaptureSource::Upvalue(index) => {
                    CaptureOp::Upvalue(u8::try_from(index).map_err(|_| {
                        CompileError::TooManyUpvalues {
                            function: info.procedure.clone(),
                            limit: u8::MAX as usize,
                        }
                    })?)
                }
            });
        }
        self.emitter.emit_closure(&info.procedure, &captures)?;
        self.nested.push(decl);
        Ok(())
    }

    /// Queue a top-level function; it is reached through the procedure table.
    pub(super) fn queue_procedure(&mut self, decl: &'ast FunctionDecl) {
        self.nested.push(decl);
    }

    // ==========================================================================
    // Loads and stores
    // ==========================================================================

    pub(super) fn emit_load(&mut self, resolved: &Resolved, name: &str, span: Span) -> Result<()> {
        match resolved {
            Resolved::Local(id) => {
                let slot = self.slot_of(*id)?;
                if self.binding(*id).is_captured() {
                    self.emitter.emit_u16(OpCode::GetCell, slot);
                } else {
                    self.emitter.emit_get_local(slot);
                }
            }
            Resolved::Upvalue(index) => {
                let index = self.upvalue_index(*index)?;
                self.emitter.emit_byte(OpCode::GetUpvalue, index);
            }
            Resolved::Global(slot) => self.emitter.emit_get_global(Self::global_slot(*slot)?),
            Resolved::Procedure(procedure) => self.emitter.emit_push_function(procedure)?,
            Resolved::Constant(value) => self.emitter.emit_literal(value)?,
            Resolved::Builtin(_) => {
                return Err(CompileError::Unresolved {
                    name: name.to_string(),
                    span,
                });
            }
        }
        Ok(())
    }

    /// Pop the top of the stack into the location `resolved` names.
    pub(super) fn emit_store(&mut self, resolved: &Resolved, span: Span) -> Result<()> {
        match resolved {
            Resolved::Local(id) => self.emit_store_local(*id),
            Resolved::Upvalue(index) => {
                let index = self.upvalue_index(*index)?;
                self.emitter.emit_byte(OpCode::SetUpvalue, index);
                Ok(())
            }
            Resolved::Global(slot) => {
                self.emitter.emit_set_global(Self::global_slot(*slot)?);
                Ok(())
            }
            _ => Err(CompileError::InvalidTarget { span }),
        }
    }

    pub(super) fn emit_store_local(&mut self, id: BindingId) -> Result<()> {
        let slot = self.slot_of(id)?;
        if self.binding(id).is_captured() {
            self.emitter.emit_u16(OpCode::SetCell, slot);
        } else {
            self.emitter.emit_set_local(slot);
        }
        Ok(())
    }

    pub(super) fn emit_define_global(&mut self, slot: u32) -> Result<()> {
        self.emitter.emit_define_global(Self::global_slot(slot)?);
        Ok(())
    }

    fn upvalue_index(&self, index: u16) -> Result<u8> {
        u8::try_from(index).map_err(|_| CompileError::TooManyUpvalues {
            function: self.resolution.function(self.function).procedure.clone(),
            limit: u8::MAX as usize,
        })
    }

    // ==========================================================================
    // Labels
    // ==========================================================================

    pub(super) fn place_label(&mut self, name: &str) -> Result<()> {
        let offset = self.emitter.current_offset();
        self.labels.insert(name.to_string(), offset);
        if let Some(gotos) = self.pending_gotos.remove(name) {
            for label in gotos {
                self.emitter.patch_jump(label)?;
            }
        }
        Ok(())
    }

    pub(super) fn emit_goto(&mut self, name: &str) -> Result<()> {
        match self.labels.get(name) {
            Some(&target) => self.emitter.emit_loop(target),
            None => {
                let label = self.emitter.emit_jump(OpCode::Jump);
                self.pending_gotos
                    .entry(name.to_string())
                    .or_default()
                    .push(label);
                Ok(())
            }
        }
    }
}
