//! Statement compilation.
//!
//! Loop layouts:
//!
//! ```text
//! while:        start: [cond] JumpIfFalse exit  [body]  Loop start  exit:
//! do/repeat:    start: [body] cont: [cond] JumpIfFalse|JumpIfTrue exit  Loop start  exit:
//! for (c):      [init] start: [cond] JumpIfFalse exit  [body] cont: [step] Pop  Loop start  exit:
//! counted for:  [start] -> var  [end] -> hidden
//!               top: var hidden LessEqual|GreaterEqual JumpIfFalse exit
//!               [body] cont: var 1 Add|Sub -> var  Loop top  exit:
//! ```

use trellis_ast::{
    Block, DoWhileStmt, Expr, ForRangeStmt, ForStmt, IfStmt, Literal, Resolved, Stmt, TryStmt,
    TypeExpr, VarDecl, WhileStmt,
};
use trellis_core::CompileError;

use crate::bytecode::OpCode;

use super::{FunctionCompiler, Result};

impl<'ast> FunctionCompiler<'ast, '_, '_> {
    pub(super) fn compile_stmt(&mut self, stmt: &'ast Stmt) -> Result<()> {
        self.emitter.set_line(stmt.span().line);
        match stmt {
            Stmt::Var(decl) => self.compile_var(decl),
            Stmt::Function(decl) => {
                match &decl.resolved {
                    Some(Resolved::Local(id)) => {
                        if !self.is_queued(decl) {
                            self.emit_closure(decl)?;
                            self.emit_store_local(*id)?;
                        }
                    }
                    _ => self.queue_procedure(decl),
                }
                Ok(())
            }
            Stmt::TypeAlias(_) => Ok(()),
            Stmt::Expr(expr) => self.compile_expr_stmt(expr),
            Stmt::Block(block) => self.compile_block(block),
            Stmt::If(s) => self.compile_if(s),
            Stmt::While(s) => self.compile_while(s),
            Stmt::DoWhile(s) => self.compile_do_while(s),
            Stmt::For(s) => self.compile_for(s),
            Stmt::ForRange(s) => self.compile_for_range(s),
            Stmt::Break(_) => self.emitter.emit_break(),
            Stmt::Continue(_) => self.emitter.emit_continue(),
            Stmt::Return(s) => {
                match &s.value {
                    Some(value) => self.compile_expr(value)?,
                    None => self.emitter.emit(OpCode::PushNil),
                }
                self.emitter.emit(OpCode::Return);
                Ok(())
            }
            Stmt::Try(s) => self.compile_try(s),
            Stmt::Throw(s) => {
                self.compile_expr(&s.value)?;
                self.emitter.emit(OpCode::Throw);
                Ok(())
            }
            Stmt::Match(s) => self.compile_match(s),
            Stmt::Label(ident) => self.place_label(&ident.name),
            Stmt::Goto(ident) => self.emit_goto(&ident.name),
        }
    }

    fn is_queued(&self, decl: &'ast trellis_ast::FunctionDecl) -> bool {
        self.nested.iter().any(|d| std::ptr::eq(*d, decl))
    }

    pub(super) fn compile_block(&mut self, block: &'ast Block) -> Result<()> {
        self.prepare_block(&block.stmts)?;
        for stmt in &block.stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_expr_stmt(&mut self, expr: &'ast Expr) -> Result<()> {
        match expr {
            Expr::Assign(assign) => self.compile_assign(assign, false),
            _ => {
                self.compile_expr(expr)?;
                self.emitter.emit(OpCode::Pop);
                Ok(())
            }
        }
    }

    fn compile_var(&mut self, decl: &'ast VarDecl) -> Result<()> {
        let Some(resolved) = &decl.resolved else {
            return Err(CompileError::Unresolved {
                name: decl.name.name.clone(),
                span: decl.span,
            });
        };
        match resolved {
            // Folded constants have no storage.
            Resolved::Constant(_) => Ok(()),
            Resolved::Local(id) => {
                self.ensure_cell(*id)?;
                self.compile_initializer(decl)?;
                self.emit_store_local(*id)
            }
            Resolved::Global(slot) => {
                self.compile_initializer(decl)?;
                self.emit_define_global(*slot)
            }
            _ => Err(CompileError::InvalidTarget { span: decl.span }),
        }
    }

    fn compile_initializer(&mut self, decl: &'ast VarDecl) -> Result<()> {
        match &decl.init {
            Some(init) => self.compile_expr(init),
            None => self.emitter.emit_literal(&default_value(decl.ty.as_ref())),
        }
    }

    fn compile_if(&mut self, s: &'ast IfStmt) -> Result<()> {
        self.compile_expr(&s.cond)?;
        let else_jump = self.emitter.emit_jump(OpCode::JumpIfFalse);
        self.compile_block(&s.then_branch)?;
        match &s.else_branch {
            Some(else_branch) => {
                let end_jump = self.emitter.emit_jump(OpCode::Jump);
                self.emitter.patch_jump(else_jump)?;
                self.compile_stmt(else_branch)?;
                self.emitter.patch_jump(end_jump)
            }
            None => self.emitter.patch_jump(else_jump),
        }
    }

    fn compile_while(&mut self, s: &'ast WhileStmt) -> Result<()> {
        let start = self.emitter.current_offset();
        self.compile_expr(&s.cond)?;
        let exit = self.emitter.emit_jump(OpCode::JumpIfFalse);
        self.emitter.enter_loop(Some(start));
        self.compile_block(&s.body)?;
        self.emitter.emit_loop(start)?;
        self.emitter.patch_jump(exit)?;
        self.emitter.exit_loop()
    }

    fn compile_do_while(&mut self, s: &'ast DoWhileStmt) -> Result<()> {
        let start = self.emitter.current_offset();
        self.emitter.enter_loop(None);
        self.compile_block(&s.body)?;
        let cont = self.emitter.current_offset();
        self.emitter.set_continue_target(cont)?;
        self.emitter.set_line(s.cond.span().line);
        self.compile_expr(&s.cond)?;
        let exit_op = if s.until {
            OpCode::JumpIfTrue
        } else {
            OpCode::JumpIfFalse
        };
        let exit = self.emitter.emit_jump(exit_op);
        self.emitter.emit_loop(start)?;
        self.emitter.patch_jump(exit)?;
        self.emitter.exit_loop()
    }

    fn compile_for(&mut self, s: &'ast ForStmt) -> Result<()> {
        if let Some(init) = &s.init {
            self.compile_stmt(init)?;
        }
        let start = self.emitter.current_offset();
        let exit = match &s.cond {
            Some(cond) => {
                self.compile_expr(cond)?;
                Some(self.emitter.emit_jump(OpCode::JumpIfFalse))
            }
            None => None,
        };
        self.emitter.enter_loop(None);
        self.compile_block(&s.body)?;
        let cont = self.emitter.current_offset();
        self.emitter.set_continue_target(cont)?;
        if let Some(step) = &s.step {
            self.compile_expr_stmt(step)?;
        }
        self.emitter.emit_loop(start)?;
        if let Some(exit) = exit {
            self.emitter.patch_jump(exit)?;
        }
        self.emitter.exit_loop()
    }

    fn compile_for_range(&mut self, s: &'ast ForRangeStmt) -> Result<()> {
        let (Some(var), Some(scratch)) = (&s.resolved, s.scratch) else {
            return Err(CompileError::Unresolved {
                name: s.var.name.clone(),
                span: s.span,
            });
        };
        if let Resolved::Local(id) = var {
            self.ensure_cell(*id)?;
        }
        self.compile_expr(&s.start)?;
        self.emit_store(var, s.span)?;
        self.compile_expr(&s.end)?;
        self.emit_store_local(scratch)?;

        let top = self.emitter.current_offset();
        self.emit_load(var, &s.var.name, s.span)?;
        self.emit_load(&Resolved::Local(scratch), "<for-end>", s.span)?;
        self.emitter.emit(if s.descending {
            OpCode::GreaterEqual
        } else {
            OpCode::LessEqual
        });
        let exit = self.emitter.emit_jump(OpCode::JumpIfFalse);

        self.emitter.enter_loop(None);
        self.compile_block(&s.body)?;
        let cont = self.emitter.current_offset();
        self.emitter.set_continue_target(cont)?;
        self.emit_load(var, &s.var.name, s.span)?;
        self.emitter.emit(OpCode::PushOne);
        self.emitter.emit(if s.descending { OpCode::Sub } else { OpCode::Add });
        self.emit_store(var, s.span)?;
        self.emitter.emit_loop(top)?;
        self.emitter.patch_jump(exit)?;
        self.emitter.exit_loop()
    }

    /// ```text
    /// TryBegin handler  [body]  TryEnd  Jump end
    /// handler: (exception on stack) -> var | Pop  [handler body]
    /// end:
    /// ```
    fn compile_try(&mut self, s: &'ast TryStmt) -> Result<()> {
        let handler = self.emitter.begin_try();
        self.compile_block(&s.body)?;
        self.emitter.end_try();
        let end = self.emitter.emit_jump(OpCode::Jump);
        self.emitter.patch_jump(handler)?;

        match &s.handler {
            Some(clause) => {
                match &clause.resolved {
                    Some(Resolved::Local(id)) => {
                        self.ensure_cell(*id)?;
                        self.emit_store_local(*id)?;
                    }
                    _ => self.emitter.emit(OpCode::Pop),
                }
                self.compile_block(&clause.body)?;
            }
            None => self.emitter.emit(OpCode::Pop),
        }
        self.emitter.patch_jump(end)
    }
}

/// Initial value of a variable declared without an initializer.
fn default_value(ty: Option<&TypeExpr>) -> Literal {
    let Some(TypeExpr::Named { name, .. }) = ty else {
        return Literal::Nil;
    };
    match name.name.to_ascii_lowercase().as_str() {
        "int" | "integer" | "long" | "byte" => Literal::Int(0),
        "real" | "float" | "double" => Literal::Real(0.0),
        "string" | "str" | "char" => Literal::Str(String::new()),
        "bool" | "boolean" => Literal::Bool(false),
        _ => Literal::Nil,
    }
}
