//! AST node definitions.

use trellis_core::Span;

// ============================================================================
// Decorations
// ============================================================================

/// Identifier of a binding in the resolver's binding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u32);

/// Identifier of a function in the resolver's function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

/// How a reference or declaration site reaches its storage.
///
/// Written by the resolver. `Local` names the binding rather than a slot
/// because whether it lives in a raw slot or a cell is only known once
/// every closure in the enclosing function has been resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// A binding owned by the current function's frame.
    Local(BindingId),
    /// A captured binding of an enclosing function, by upvalue index.
    Upvalue(u16),
    /// A global (module-level) variable slot.
    Global(u32),
    /// A top-level function in the procedure table.
    Procedure(String),
    /// A registered builtin, by canonical (lower-case) name.
    Builtin(String),
    /// A folded compile-time constant.
    Constant(Literal),
}

// ============================================================================
// Literals and identifiers
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// A use of a name.
#[derive(Debug, Clone, PartialEq)]
pub struct NameRef {
    pub ident: Ident,
    pub resolved: Option<Resolved>,
}

// ============================================================================
// Program structure
// ============================================================================

/// One compilation unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Modules available to this unit, in any order.
    pub modules: Vec<ModuleDecl>,
    /// Imports of the main program.
    pub imports: Vec<Import>,
    /// Top-level statements of the main program.
    pub body: Vec<Stmt>,
    /// Function called after the top-level statements, if the front-end
    /// has one (a C-like `main`).
    pub entry: Option<NameRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDecl {
    pub name: Ident,
    pub imports: Vec<Import>,
    pub items: Vec<ModuleItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleItem {
    pub exported: bool,
    pub stmt: Stmt,
}

/// `import module` or `import module as alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: Ident,
    pub alias: Option<Ident>,
}

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named { name: Ident, args: Vec<TypeExpr> },
    Array(Box<TypeExpr>),
    Function {
        params: Vec<TypeExpr>,
        ret: Option<Box<TypeExpr>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name: Ident,
    pub generics: Vec<Ident>,
    pub target: TypeExpr,
    pub span: Span,
}

// ============================================================================
// Declarations
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: Ident,
    pub is_const: bool,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
    pub span: Span,
    pub resolved: Option<Resolved>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub resolved: Option<Resolved>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub generics: Vec<Ident>,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
    /// Where the function value lives: `Procedure` for top-level
    /// functions, `Local` for nested ones.
    pub resolved: Option<Resolved>,
    pub function: Option<FunctionId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var(VarDecl),
    Function(FunctionDecl),
    TypeAlias(TypeAliasDecl),
    Expr(Expr),
    Block(Block),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),
    ForRange(ForRangeStmt),
    Break(Span),
    Continue(Span),
    Return(ReturnStmt),
    Try(TryStmt),
    Throw(ThrowStmt),
    Match(MatchStmt),
    Label(Ident),
    Goto(Ident),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Var(d) => d.span,
            Stmt::Function(f) => f.span,
            Stmt::TypeAlias(t) => t.span,
            Stmt::Expr(e) => e.span(),
            Stmt::Block(b) => b.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::DoWhile(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::ForRange(s) => s.span,
            Stmt::Break(span) | Stmt::Continue(span) => *span,
            Stmt::Return(s) => s.span,
            Stmt::Try(s) => s.span,
            Stmt::Throw(s) => s.span,
            Stmt::Match(s) => s.span,
            Stmt::Label(i) | Stmt::Goto(i) => i.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_branch: Block,
    pub else_branch: Option<Box<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Block,
    pub span: Span,
}

/// `do body while cond`, or `repeat body until cond` when `until` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStmt {
    pub body: Block,
    pub cond: Expr,
    pub until: bool,
    pub span: Span,
}

/// C-style `for (init; cond; step) body`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub step: Option<Expr>,
    pub body: Block,
    pub span: Span,
}

/// Counted loop `for v := start to/downto end do body`.
///
/// When `declares` is set the header introduces `var`; otherwise `var`
/// names an existing binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ForRangeStmt {
    pub var: Ident,
    pub declares: bool,
    pub start: Expr,
    pub end: Expr,
    pub descending: bool,
    pub body: Block,
    pub span: Span,
    pub resolved: Option<Resolved>,
    /// Hidden local holding the evaluated end bound.
    pub scratch: Option<BindingId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Block,
    pub handler: Option<CatchClause>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub var: Option<Ident>,
    pub body: Block,
    pub resolved: Option<Resolved>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrowStmt {
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchStmt {
    pub scrutinee: Expr,
    pub arms: Vec<MatchArm>,
    pub span: Span,
    /// Hidden local holding the scrutinee while arms are tested.
    pub scratch: Option<BindingId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Wildcard(Span),
    Literal(Literal, Span),
    Binding {
        name: Ident,
        resolved: Option<Resolved>,
    },
    Array {
        elements: Vec<Pattern>,
        span: Span,
        /// Hidden local holding the matched array.
        scratch: Option<BindingId>,
    },
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal, Span),
    Name(NameRef),
    Qualified(QualifiedName),
    Assign(Box<AssignExpr>),
    Unary(Box<UnaryExpr>),
    Binary(Box<BinaryExpr>),
    Logical(Box<LogicalExpr>),
    Call(Box<CallExpr>),
    Array(Vec<Expr>, Span),
    Index(Box<IndexExpr>),
    Lambda(Box<FunctionDecl>),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span) | Expr::Array(_, span) => *span,
            Expr::Name(n) => n.ident.span,
            Expr::Qualified(q) => q.span,
            Expr::Assign(a) => a.span,
            Expr::Unary(u) => u.span,
            Expr::Binary(b) => b.span,
            Expr::Logical(l) => l.span,
            Expr::Call(c) => c.span,
            Expr::Index(i) => i.span,
            Expr::Lambda(f) => f.span,
        }
    }
}

/// `module.member`, where `module` is a module name or an import alias.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedName {
    pub module: Ident,
    pub member: Ident,
    pub span: Span,
    pub resolved: Option<Resolved>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignExpr {
    pub target: Expr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalExpr {
    pub op: LogicalOp,
    pub left: Expr,
    pub right: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Expr,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub target: Expr,
    pub index: Expr,
    pub span: Span,
}
