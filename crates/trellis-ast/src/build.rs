//! Terse AST constructors.
//!
//! Front-ends and tests use these instead of spelling out every struct
//! literal. All nodes get [`Span::default`]; build nodes directly when
//! positions matter.

use trellis_core::Span;

use crate::ast::*;

pub fn ident(name: &str) -> Ident {
    Ident::new(name, Span::default())
}

// ============================================================================
// Expressions
// ============================================================================

pub fn name(n: &str) -> Expr {
    Expr::Name(NameRef {
        ident: ident(n),
        resolved: None,
    })
}

pub fn name_ref(n: &str) -> NameRef {
    NameRef {
        ident: ident(n),
        resolved: None,
    }
}

pub fn int(v: i64) -> Expr {
    Expr::Literal(Literal::Int(v), Span::default())
}

pub fn real(v: f64) -> Expr {
    Expr::Literal(Literal::Real(v), Span::default())
}

pub fn string(v: &str) -> Expr {
    Expr::Literal(Literal::Str(v.to_string()), Span::default())
}

pub fn boolean(v: bool) -> Expr {
    Expr::Literal(Literal::Bool(v), Span::default())
}

pub fn nil() -> Expr {
    Expr::Literal(Literal::Nil, Span::default())
}

pub fn qualified(module: &str, member: &str) -> Expr {
    Expr::Qualified(QualifiedName {
        module: ident(module),
        member: ident(member),
        span: Span::default(),
        resolved: None,
    })
}

/// `target = value` where target is a plain name.
pub fn assign(target: &str, value: Expr) -> Expr {
    assign_to(name(target), value)
}

pub fn assign_to(target: Expr, value: Expr) -> Expr {
    Expr::Assign(Box::new(AssignExpr {
        target,
        value,
        span: Span::default(),
    }))
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary(Box::new(BinaryExpr {
        op,
        left,
        right,
        span: Span::default(),
    }))
}

pub fn add(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Add, left, right)
}

pub fn sub(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Sub, left, right)
}

pub fn mul(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Mul, left, right)
}

pub fn lt(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Lt, left, right)
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Eq, left, right)
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary(Box::new(UnaryExpr {
        op,
        operand,
        span: Span::default(),
    }))
}

pub fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr::Logical(Box::new(LogicalExpr {
        op,
        left,
        right,
        span: Span::default(),
    }))
}

/// Call of a plain name.
pub fn call(callee: &str, args: Vec<Expr>) -> Expr {
    call_expr(name(callee), args)
}

pub fn call_expr(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call(Box::new(CallExpr {
        callee,
        args,
        span: Span::default(),
    }))
}

pub fn array(elements: Vec<Expr>) -> Expr {
    Expr::Array(elements, Span::default())
}

pub fn index(target: Expr, idx: Expr) -> Expr {
    Expr::Index(Box::new(IndexExpr {
        target,
        index: idx,
        span: Span::default(),
    }))
}

pub fn lambda(params: &[&str], body: Vec<Stmt>) -> Expr {
    Expr::Lambda(Box::new(func_decl("lambda", params, body)))
}

// ============================================================================
// Statements
// ============================================================================

pub fn var(n: &str, init: Expr) -> Stmt {
    Stmt::Var(VarDecl {
        name: ident(n),
        is_const: false,
        ty: None,
        init: Some(init),
        span: Span::default(),
        resolved: None,
    })
}

pub fn var_uninit(n: &str) -> Stmt {
    Stmt::Var(VarDecl {
        name: ident(n),
        is_const: false,
        ty: None,
        init: None,
        span: Span::default(),
        resolved: None,
    })
}

pub fn typed_var(n: &str, ty: TypeExpr, init: Option<Expr>) -> Stmt {
    Stmt::Var(VarDecl {
        name: ident(n),
        is_const: false,
        ty: Some(ty),
        init,
        span: Span::default(),
        resolved: None,
    })
}

pub fn constant(n: &str, init: Expr) -> Stmt {
    Stmt::Var(VarDecl {
        name: ident(n),
        is_const: true,
        ty: None,
        init: Some(init),
        span: Span::default(),
        resolved: None,
    })
}

pub fn expr(e: Expr) -> Stmt {
    Stmt::Expr(e)
}

pub fn block(stmts: Vec<Stmt>) -> Block {
    Block {
        stmts,
        span: Span::default(),
    }
}

pub fn block_stmt(stmts: Vec<Stmt>) -> Stmt {
    Stmt::Block(block(stmts))
}

pub fn if_(cond: Expr, then_branch: Vec<Stmt>, else_branch: Option<Vec<Stmt>>) -> Stmt {
    Stmt::If(IfStmt {
        cond,
        then_branch: block(then_branch),
        else_branch: else_branch.map(|stmts| Box::new(block_stmt(stmts))),
        span: Span::default(),
    })
}

pub fn while_(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While(WhileStmt {
        cond,
        body: block(body),
        span: Span::default(),
    })
}

pub fn do_while(body: Vec<Stmt>, cond: Expr) -> Stmt {
    Stmt::DoWhile(DoWhileStmt {
        body: block(body),
        cond,
        until: false,
        span: Span::default(),
    })
}

pub fn repeat_until(body: Vec<Stmt>, cond: Expr) -> Stmt {
    Stmt::DoWhile(DoWhileStmt {
        body: block(body),
        cond,
        until: true,
        span: Span::default(),
    })
}

pub fn for_c(init: Option<Stmt>, cond: Option<Expr>, step: Option<Expr>, body: Vec<Stmt>) -> Stmt {
    Stmt::For(ForStmt {
        init: init.map(Box::new),
        cond,
        step,
        body: block(body),
        span: Span::default(),
    })
}

pub fn for_range(v: &str, declares: bool, start: Expr, end: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::ForRange(ForRangeStmt {
        var: ident(v),
        declares,
        start,
        end,
        descending: false,
        body: block(body),
        span: Span::default(),
        resolved: None,
        scratch: None,
    })
}

pub fn for_downto(v: &str, declares: bool, start: Expr, end: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::ForRange(ForRangeStmt {
        var: ident(v),
        declares,
        start,
        end,
        descending: true,
        body: block(body),
        span: Span::default(),
        resolved: None,
        scratch: None,
    })
}

pub fn ret(value: Expr) -> Stmt {
    Stmt::Return(ReturnStmt {
        value: Some(value),
        span: Span::default(),
    })
}

pub fn ret_void() -> Stmt {
    Stmt::Return(ReturnStmt {
        value: None,
        span: Span::default(),
    })
}

pub fn brk() -> Stmt {
    Stmt::Break(Span::default())
}

pub fn cont() -> Stmt {
    Stmt::Continue(Span::default())
}

pub fn try_catch(body: Vec<Stmt>, var: Option<&str>, handler: Vec<Stmt>) -> Stmt {
    Stmt::Try(TryStmt {
        body: block(body),
        handler: Some(CatchClause {
            var: var.map(ident),
            body: block(handler),
            resolved: None,
        }),
        span: Span::default(),
    })
}

pub fn throw(value: Expr) -> Stmt {
    Stmt::Throw(ThrowStmt {
        value,
        span: Span::default(),
    })
}

pub fn match_(scrutinee: Expr, arms: Vec<MatchArm>) -> Stmt {
    Stmt::Match(MatchStmt {
        scrutinee,
        arms,
        span: Span::default(),
        scratch: None,
    })
}

pub fn arm(pattern: Pattern, guard: Option<Expr>, body: Vec<Stmt>) -> MatchArm {
    MatchArm {
        pattern,
        guard,
        body: block(body),
        span: Span::default(),
    }
}

pub fn label(n: &str) -> Stmt {
    Stmt::Label(ident(n))
}

pub fn goto(n: &str) -> Stmt {
    Stmt::Goto(ident(n))
}

// ============================================================================
// Patterns
// ============================================================================

pub fn pwild() -> Pattern {
    Pattern::Wildcard(Span::default())
}

pub fn plit(lit: Literal) -> Pattern {
    Pattern::Literal(lit, Span::default())
}

pub fn pbind(n: &str) -> Pattern {
    Pattern::Binding {
        name: ident(n),
        resolved: None,
    }
}

pub fn parray(elements: Vec<Pattern>) -> Pattern {
    Pattern::Array {
        elements,
        span: Span::default(),
        scratch: None,
    }
}

// ============================================================================
// Functions and types
// ============================================================================

pub fn func_decl(n: &str, params: &[&str], body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl {
        name: ident(n),
        generics: Vec::new(),
        params: params
            .iter()
            .map(|p| Param {
                name: ident(p),
                ty: None,
                resolved: None,
            })
            .collect(),
        ret: None,
        body: block(body),
        span: Span::default(),
        resolved: None,
        function: None,
    }
}

pub fn function(n: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::Function(func_decl(n, params, body))
}

/// Function with generic parameters and typed parameters.
pub fn generic_function(
    n: &str,
    generics: &[&str],
    params: Vec<(&str, TypeExpr)>,
    ret: Option<TypeExpr>,
    body: Vec<Stmt>,
) -> Stmt {
    Stmt::Function(FunctionDecl {
        name: ident(n),
        generics: generics.iter().map(|g| ident(g)).collect(),
        params: params
            .into_iter()
            .map(|(p, ty)| Param {
                name: ident(p),
                ty: Some(ty),
                resolved: None,
            })
            .collect(),
        ret,
        body: block(body),
        span: Span::default(),
        resolved: None,
        function: None,
    })
}

pub fn ty(n: &str) -> TypeExpr {
    TypeExpr::Named {
        name: ident(n),
        args: Vec::new(),
    }
}

pub fn ty_args(n: &str, args: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::Named {
        name: ident(n),
        args,
    }
}

pub fn type_alias(n: &str, generics: &[&str], target: TypeExpr) -> Stmt {
    Stmt::TypeAlias(TypeAliasDecl {
        name: ident(n),
        generics: generics.iter().map(|g| ident(g)).collect(),
        target,
        span: Span::default(),
    })
}

// ============================================================================
// Modules and programs
// ============================================================================

pub fn module(n: &str, imports: Vec<Import>, items: Vec<ModuleItem>) -> ModuleDecl {
    ModuleDecl {
        name: ident(n),
        imports,
        items,
    }
}

pub fn export(stmt: Stmt) -> ModuleItem {
    ModuleItem {
        exported: true,
        stmt,
    }
}

pub fn private(stmt: Stmt) -> ModuleItem {
    ModuleItem {
        exported: false,
        stmt,
    }
}

pub fn import(m: &str) -> Import {
    Import {
        module: ident(m),
        alias: None,
    }
}

pub fn import_as(m: &str, alias: &str) -> Import {
    Import {
        module: ident(m),
        alias: Some(ident(alias)),
    }
}

impl Program {
    pub fn new(body: Vec<Stmt>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    pub fn with_module(mut self, module: ModuleDecl) -> Self {
        self.modules.push(module);
        self
    }

    pub fn with_import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    /// Call `entry` after the top-level statements.
    pub fn with_entry(mut self, entry: &str) -> Self {
        self.entry = Some(name_ref(entry));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_leave_decorations_empty() {
        let stmt = var("x", add(int(1), name("y")));
        let Stmt::Var(decl) = stmt else {
            panic!("expected var");
        };
        assert!(decl.resolved.is_none());
        let Some(Expr::Binary(bin)) = decl.init else {
            panic!("expected binary init");
        };
        assert!(matches!(&bin.right, Expr::Name(n) if n.resolved.is_none()));
    }

    #[test]
    fn program_builder_collects_parts() {
        let program = Program::new(vec![expr(call("main", vec![]))])
            .with_module(module("m", vec![], vec![export(var("a", int(1)))]))
            .with_import(import_as("m", "mm"))
            .with_entry("main");
        assert_eq!(program.modules.len(), 1);
        assert_eq!(program.imports[0].alias.as_ref().map(|a| a.name.as_str()), Some("mm"));
        assert!(program.entry.is_some());
    }
}
