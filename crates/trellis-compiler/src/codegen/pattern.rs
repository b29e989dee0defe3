//! Match statements and pattern tests.
//!
//! The scrutinee is stored once in a hidden local. Each arm tests its
//! pattern against that local, collecting the jumps taken on failure;
//! those are patched to the next arm. When no arm matches the statement
//! raises the no-match error.

use trellis_ast::{BindingId, MatchStmt, Pattern, Resolved};
use trellis_core::CompileError;

use crate::bytecode::OpCode;
use crate::emit::JumpLabel;

use super::{FunctionCompiler, Result};

/// Where the value under test lives.
#[derive(Debug, Clone, Copy)]
enum Source {
    Slot(BindingId),
    Element(BindingId, usize),
}

impl<'ast> FunctionCompiler<'ast, '_, '_> {
    pub(super) fn compile_match(&mut self, s: &'ast MatchStmt) -> Result<()> {
        let scratch = s.scratch.ok_or_else(|| CompileError::Unresolved {
            name: "<match>".to_string(),
            span: s.span,
        })?;
        self.compile_expr(&s.scrutinee)?;
        self.emit_store_local(scratch)?;

        let mut ends = Vec::with_capacity(s.arms.len());
        for arm in &s.arms {
            self.emitter.set_line(arm.span.line);
            let mut fails = Vec::new();
            self.compile_pattern(&arm.pattern, Source::Slot(scratch), &mut fails)?;
            if let Some(guard) = &arm.guard {
                self.compile_expr(guard)?;
                fails.push(self.emitter.emit_jump(OpCode::JumpIfFalse));
            }
            self.compile_block(&arm.body)?;
            ends.push(self.emitter.emit_jump(OpCode::Jump));
            for fail in fails {
                self.emitter.patch_jump(fail)?;
            }
        }
        self.emitter.set_line(s.span.line);
        self.emitter.emit(OpCode::NoMatch);
        for end in ends {
            self.emitter.patch_jump(end)?;
        }
        Ok(())
    }

    fn load_source(&mut self, source: Source) -> Result<()> {
        match source {
            Source::Slot(id) => self.load_binding(id),
            Source::Element(id, index) => {
                self.load_binding(id)?;
                self.emitter.emit_int(index as i64)?;
                self.emitter.emit(OpCode::Index);
                Ok(())
            }
        }
    }

    fn load_binding(&mut self, id: BindingId) -> Result<()> {
        let binding = self.binding(id);
        self.emit_load(&Resolved::Local(id), &binding.name, binding.span)
    }

    fn compile_pattern(
        &mut self,
        pattern: &'ast Pattern,
        source: Source,
        fails: &mut Vec<JumpLabel>,
    ) -> Result<()> {
        match pattern {
            Pattern::Wildcard(_) => Ok(()),
            Pattern::Literal(literal, _) => {
                self.load_source(source)?;
                self.emitter.emit_literal(literal)?;
                self.emitter.emit(OpCode::Equal);
                fails.push(self.emitter.emit_jump(OpCode::JumpIfFalse));
                Ok(())
            }
            Pattern::Binding { name, resolved } => {
                let Some(Resolved::Local(id)) = resolved else {
                    return Err(CompileError::Unresolved {
                        name: name.name.clone(),
                        span: name.span,
                    });
                };
                self.ensure_cell(*id)?;
                self.load_source(source)?;
                self.emit_store_local(*id)
            }
            Pattern::Array {
                elements,
                span,
                scratch,
            } => {
                let scratch = scratch.ok_or_else(|| CompileError::Unresolved {
                    name: "<array pattern>".to_string(),
                    span: *span,
                })?;
                let length = u16::try_from(elements.len())
                    .map_err(|_| CompileError::InvalidTarget { span: *span })?;
                self.load_source(source)?;
                self.emitter.emit_u16(OpCode::MatchArray, length);
                fails.push(self.emitter.emit_jump(OpCode::JumpIfFalse));
                self.load_source(source)?;
                self.emit_store_local(scratch)?;
                for (index, element) in elements.iter().enumerate() {
                    self.compile_pattern(element, Source::Element(scratch, index), fails)?;
                }
                Ok(())
            }
        }
    }
}
