//! Expression compilation.

use trellis_ast::{AssignExpr, BinaryOp, CallExpr, Expr, LogicalOp, Resolved, UnaryOp};
use trellis_core::{CompileError, Span};

use crate::bytecode::OpCode;

use super::{FunctionCompiler, Result};

impl<'ast> FunctionCompiler<'ast, '_, '_> {
    pub(super) fn compile_expr(&mut self, expr: &'ast Expr) -> Result<()> {
        match expr {
            Expr::Literal(literal, _) => self.emitter.emit_literal(literal),
            Expr::Name(name) => {
                let resolved = resolved_or_err(&name.resolved, &name.ident.name, name.ident.span)?;
                self.emit_load(resolved, &name.ident.name, name.ident.span)
            }
            Expr::Qualified(q) => {
                let resolved = resolved_or_err(&q.resolved, &q.member.name, q.span)?;
                self.emit_load(resolved, &q.member.name, q.span)
            }
            Expr::Assign(assign) => self.compile_assign(assign, true),
            Expr::Unary(unary) => {
                self.compile_expr(&unary.operand)?;
                self.emitter.emit(match unary.op {
                    UnaryOp::Neg => OpCode::Neg,
                    UnaryOp::Not => OpCode::Not,
                });
                Ok(())
            }
            Expr::Binary(binary) => {
                self.compile_expr(&binary.left)?;
                self.compile_expr(&binary.right)?;
                self.emitter.emit(binary_opcode(binary.op));
                Ok(())
            }
            Expr::Logical(logical) => {
                // Short-circuit: the left value is the result when it decides.
                self.compile_expr(&logical.left)?;
                self.emitter.emit(OpCode::Dup);
                let op = match logical.op {
                    LogicalOp::And => OpCode::JumpIfFalse,
                    LogicalOp::Or => OpCode::JumpIfTrue,
                };
                let end = self.emitter.emit_jump(op);
                self.emitter.emit(OpCode::Pop);
                self.compile_expr(&logical.right)?;
                self.emitter.patch_jump(end)
            }
            Expr::Call(call) => self.compile_call(call),
            Expr::Array(elements, span) => {
                for element in elements {
                    self.compile_expr(element)?;
                }
                let count = u16::try_from(elements.len()).map_err(|_| {
                    CompileError::TooManyArguments {
                        span: *span,
                        limit: u16::MAX as usize,
                    }
                })?;
                self.emitter.emit_u16(OpCode::MakeArray, count);
                Ok(())
            }
            Expr::Index(index) => {
                self.compile_expr(&index.target)?;
                self.compile_expr(&index.index)?;
                self.emitter.emit(OpCode::Index);
                Ok(())
            }
            Expr::Lambda(decl) => self.emit_closure(decl),
        }
    }

    /// Compile an assignment, leaving the assigned value on the stack when
    /// `want_value` is set.
    pub(super) fn compile_assign(&mut self, assign: &'ast AssignExpr, want_value: bool) -> Result<()> {
        match &assign.target {
            Expr::Name(name) => {
                let resolved = resolved_or_err(&name.resolved, &name.ident.name, name.ident.span)?;
                self.compile_expr(&assign.value)?;
                if want_value {
                    self.emitter.emit(OpCode::Dup);
                }
                self.emit_store(resolved, assign.span)
            }
            Expr::Qualified(q) => {
                let resolved = resolved_or_err(&q.resolved, &q.member.name, q.span)?;
                self.compile_expr(&assign.value)?;
                if want_value {
                    self.emitter.emit(OpCode::Dup);
                }
                self.emit_store(resolved, assign.span)
            }
            Expr::Index(index) => {
                // Arrays are values: the updated array is written back to
                // the variable the base expression names.
                let (base, name, span) = match &index.target {
                    Expr::Name(n) => (&n.resolved, &n.ident.name, n.ident.span),
                    Expr::Qualified(q) => (&q.resolved, &q.member.name, q.span),
                    _ => return Err(CompileError::InvalidTarget { span: assign.span }),
                };
                let base = resolved_or_err(base, name, span)?;
                self.emit_load(base, name, span)?;
                self.compile_expr(&index.index)?;
                self.compile_expr(&assign.value)?;
                self.emitter.emit(OpCode::SetIndex);
                self.emit_store(base, assign.span)?;
                if !want_value {
                    self.emitter.emit(OpCode::Pop);
                }
                Ok(())
            }
            _ => Err(CompileError::InvalidTarget { span: assign.span }),
        }
    }

    fn compile_call(&mut self, call: &'ast CallExpr) -> Result<()> {
        let argc = u8::try_from(call.args.len()).map_err(|_| CompileError::TooManyArguments {
            span: call.span,
            limit: u8::MAX as usize,
        })?;
        let direct = match &call.callee {
            Expr::Name(n) => n.resolved.as_ref(),
            Expr::Qualified(q) => q.resolved.as_ref(),
            _ => None,
        };
        self.emitter.set_line(call.span.line);
        match direct {
            Some(Resolved::Procedure(name)) => {
                self.compile_args(call)?;
                self.emitter.emit_call(name, argc)
            }
            Some(Resolved::Builtin(name)) => {
                self.compile_args(call)?;
                self.emitter.emit_call_builtin(name, argc)
            }
            _ => {
                self.compile_expr(&call.callee)?;
                self.compile_args(call)?;
                self.emitter.emit_byte(OpCode::CallValue, argc);
                Ok(())
            }
        }
    }

    fn compile_args(&mut self, call: &'ast CallExpr) -> Result<()> {
        for arg in &call.args {
            self.compile_expr(arg)?;
        }
        Ok(())
    }
}

fn resolved_or_err<'a>(resolved: &'a Option<Resolved>, name: &str, span: Span) -> Result<&'a Resolved> {
    resolved.as_ref().ok_or_else(|| CompileError::Unresolved {
        name: name.to_string(),
        span,
    })
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::IntDiv => OpCode::IntDiv,
        BinaryOp::Mod => OpCode::Mod,
        BinaryOp::Eq => OpCode::Equal,
        BinaryOp::Ne => OpCode::NotEqual,
        BinaryOp::Lt => OpCode::Less,
        BinaryOp::Le => OpCode::LessEqual,
        BinaryOp::Gt => OpCode::Greater,
        BinaryOp::Ge => OpCode::GreaterEqual,
    }
}
