//! Unified error types for the trellis toolchain.
//!
//! Every phase has its own error type so callers can handle failures at
//! the granularity they need, and everything converts into
//! [`TrellisError`] for uniform reporting.
//!
//! ## Error Hierarchy
//!
//! ```text
//! TrellisError (top-level wrapper)
//! ├── ResolveError  - scope and binding violations, reported before any code runs
//! ├── CompileError  - internal compiler invariants (unreachable from valid input)
//! ├── CacheError    - bytecode cache IO and format failures
//! └── RuntimeError  - VM execution failures and uncaught exceptions
//! ```

use thiserror::Error;

use crate::Span;

// ============================================================================
// Resolution Errors
// ============================================================================

/// A scope violation found by the resolver.
///
/// Resolution stops at the first violation; nothing from the unit executes.
/// [`ResolveError::category`] gives a stable machine-readable class and
/// [`ResolveError::identifier`] the offending name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("at {span}: undefined variable '{name}': not in scope")]
    UndefinedIdentifier { name: String, span: Span },

    #[error("at {span}: '{name}' is not in scope before its declaration")]
    UseBeforeDeclaration { name: String, span: Span },

    #[error("at {span}: duplicate declaration of '{name}' in the same scope")]
    DuplicateDeclaration { name: String, span: Span },

    #[error("at {span}: cannot assign to const '{name}'")]
    ConstReassignment { name: String, span: Span },

    #[error("at {span}: cannot assign to {kind} '{name}'")]
    InvalidAssignment {
        name: String,
        kind: &'static str,
        span: Span,
    },

    #[error("at {span}: '{name}' is ambiguous: exported by modules {modules}")]
    AmbiguousImport {
        name: String,
        modules: String,
        span: Span,
    },

    #[error("at {span}: unknown module '{name}'")]
    UnknownModule { name: String, span: Span },

    #[error("at {span}: module '{name}' imports itself through a cycle")]
    ImportCycle { name: String, span: Span },

    #[error("at {span}: '{member}' is not exported by module '{module}'")]
    NotExported {
        module: String,
        member: String,
        span: Span,
    },

    #[error("at {span}: generic parameter '{name}' is not visible outside its declaration")]
    GenericParameterLeak { name: String, span: Span },

    #[error(
        "at {span}: closure '{name}' captures '{captured}' whose lifetime ends before the closure can be called"
    )]
    ClosureLifetime {
        name: String,
        captured: String,
        span: Span,
    },

    #[error("at {span}: Undefined type '{name}'")]
    UndefinedType { name: String, span: Span },

    #[error("at {span}: type alias '{name}' redefinition in the same scope")]
    TypeAliasRedefinition { name: String, span: Span },

    #[error("at {span}: type alias '{name}' would shadow a built-in type")]
    BuiltinTypeShadow { name: String, span: Span },

    #[error("at {span}: type '{name}' expects {expected} type arguments, found {found}")]
    GenericArity {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("at {span}: initializer of const '{name}' must be compile-time evaluable")]
    NonConstantInitializer { name: String, span: Span },

    #[error("at {span}: goto target '{name}' is not defined in this routine")]
    UndefinedLabel { name: String, span: Span },

    #[error("at {span}: label '{name}' is declared more than once")]
    DuplicateLabel { name: String, span: Span },

    #[error("at {span}: goto '{name}' crosses a try block boundary")]
    GotoAcrossTry { name: String, span: Span },

    #[error("at {span}: '{keyword}' outside of a loop")]
    OutsideLoop { keyword: &'static str, span: Span },

    #[error("at {span}: 'return' outside of a function")]
    ReturnOutsideFunction { span: Span },

    #[error("at {span}: duplicate pattern variable '{name}'")]
    DuplicatePatternBinding { name: String, span: Span },

    #[error("at {span}: builtin '{name}' expects {expected} arguments, found {found}")]
    BuiltinArity {
        name: String,
        expected: String,
        found: usize,
        span: Span,
    },
}

impl ResolveError {
    /// Stable category string for the violation.
    pub fn category(&self) -> &'static str {
        match self {
            ResolveError::UndefinedIdentifier { .. } | ResolveError::UnknownModule { .. } => {
                "undefined-identifier"
            }
            ResolveError::ImportCycle { .. } => "import-cycle",
            ResolveError::UseBeforeDeclaration { .. } => "disallowed-hoist",
            ResolveError::DuplicateDeclaration { .. }
            | ResolveError::DuplicatePatternBinding { .. } => "duplicate-declaration",
            ResolveError::ConstReassignment { .. } => "const-reassignment",
            ResolveError::InvalidAssignment { .. } => "invalid-assignment",
            ResolveError::AmbiguousImport { .. } => "ambiguous-import",
            ResolveError::NotExported { .. } => "not-exported",
            ResolveError::GenericParameterLeak { .. } => "generic-parameter-leak",
            ResolveError::ClosureLifetime { .. } => "closure-lifetime",
            ResolveError::UndefinedType { .. } => "undefined-type",
            ResolveError::TypeAliasRedefinition { .. }
            | ResolveError::BuiltinTypeShadow { .. }
            | ResolveError::GenericArity { .. } => "type-alias",
            ResolveError::NonConstantInitializer { .. } => "constant",
            ResolveError::UndefinedLabel { .. }
            | ResolveError::DuplicateLabel { .. }
            | ResolveError::GotoAcrossTry { .. } => "label",
            ResolveError::OutsideLoop { .. } | ResolveError::ReturnOutsideFunction { .. } => {
                "control-flow"
            }
            ResolveError::BuiltinArity { .. } => "builtin",
        }
    }

    /// The offending identifier.
    pub fn identifier(&self) -> &str {
        match self {
            ResolveError::UndefinedIdentifier { name, .. }
            | ResolveError::UseBeforeDeclaration { name, .. }
            | ResolveError::DuplicateDeclaration { name, .. }
            | ResolveError::ConstReassignment { name, .. }
            | ResolveError::InvalidAssignment { name, .. }
            | ResolveError::AmbiguousImport { name, .. }
            | ResolveError::UnknownModule { name, .. }
            | ResolveError::ImportCycle { name, .. }
            | ResolveError::GenericParameterLeak { name, .. }
            | ResolveError::ClosureLifetime { name, .. }
            | ResolveError::UndefinedType { name, .. }
            | ResolveError::TypeAliasRedefinition { name, .. }
            | ResolveError::BuiltinTypeShadow { name, .. }
            | ResolveError::GenericArity { name, .. }
            | ResolveError::NonConstantInitializer { name, .. }
            | ResolveError::UndefinedLabel { name, .. }
            | ResolveError::DuplicateLabel { name, .. }
            | ResolveError::GotoAcrossTry { name, .. }
            | ResolveError::DuplicatePatternBinding { name, .. }
            | ResolveError::BuiltinArity { name, .. } => name,
            ResolveError::NotExported { member, .. } => member,
            ResolveError::OutsideLoop { keyword, .. } => keyword,
            ResolveError::ReturnOutsideFunction { .. } => "return",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ResolveError::UndefinedIdentifier { span, .. }
            | ResolveError::UseBeforeDeclaration { span, .. }
            | ResolveError::DuplicateDeclaration { span, .. }
            | ResolveError::ConstReassignment { span, .. }
            | ResolveError::InvalidAssignment { span, .. }
            | ResolveError::AmbiguousImport { span, .. }
            | ResolveError::UnknownModule { span, .. }
            | ResolveError::ImportCycle { span, .. }
            | ResolveError::NotExported { span, .. }
            | ResolveError::GenericParameterLeak { span, .. }
            | ResolveError::ClosureLifetime { span, .. }
            | ResolveError::UndefinedType { span, .. }
            | ResolveError::TypeAliasRedefinition { span, .. }
            | ResolveError::BuiltinTypeShadow { span, .. }
            | ResolveError::GenericArity { span, .. }
            | ResolveError::NonConstantInitializer { span, .. }
            | ResolveError::UndefinedLabel { span, .. }
            | ResolveError::DuplicateLabel { span, .. }
            | ResolveError::GotoAcrossTry { span, .. }
            | ResolveError::OutsideLoop { span, .. }
            | ResolveError::ReturnOutsideFunction { span }
            | ResolveError::DuplicatePatternBinding { span, .. }
            | ResolveError::BuiltinArity { span, .. } => *span,
        }
    }
}

// ============================================================================
// Compilation Errors
// ============================================================================

/// Internal compiler invariant violations.
///
/// None of these should be reachable from an AST the resolver accepted,
/// apart from the size limits of the instruction encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("jump distance {distance} exceeds the 16-bit operand range")]
    JumpTooFar { distance: usize },

    #[error("constant pool overflow: more than {limit} constants")]
    TooManyConstants { limit: usize },

    #[error("function '{function}' needs more than {limit} local slots")]
    TooManyLocals { function: String, limit: usize },

    #[error("function '{function}' captures more than {limit} upvalues")]
    TooManyUpvalues { function: String, limit: usize },

    #[error("call at {span} passes more than {limit} arguments")]
    TooManyArguments { span: Span, limit: usize },

    #[error("global slot {slot} exceeds the 16-bit operand range")]
    TooManyGlobals { slot: usize },

    #[error("at {span}: '{name}' reached the compiler without a resolved binding")]
    Unresolved { name: String, span: Span },

    #[error("at {span}: invalid assignment target")]
    InvalidTarget { span: Span },

    #[error("'{keyword}' emitted outside of a loop")]
    NotInLoop { keyword: &'static str },
}

// ============================================================================
// Cache Errors
// ============================================================================

/// Bytecode cache and bytecode file failures.
///
/// Format problems are reported here but the cache treats them as misses.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic number {found:#010x}")]
    BadMagic { found: u32 },

    #[error("bytecode version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("bytecode truncated while reading {what}")]
    Truncated { what: &'static str },

    #[error("invalid constant tag {tag}")]
    InvalidTag { tag: u8 },

    #[error("malformed bytecode: {0}")]
    Malformed(String),
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// Failures raised while executing bytecode.
///
/// Everything except [`RuntimeError::InvalidBytecode`] and
/// [`RuntimeError::Uncaught`] becomes a catchable exception inside the VM.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("type error in {op}: {detail}")]
    TypeMismatch { op: &'static str, detail: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {op}")]
    Overflow { op: &'static str },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("'{name}' expects {expected} arguments, found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("undefined global variable (slot {slot})")]
    UndefinedGlobal { slot: usize },

    #[error("unknown procedure '{name}'")]
    UnknownProcedure { name: String },

    #[error("unknown builtin '{name}'")]
    UnknownBuiltin { name: String },

    #[error("value of type {type_name} is not callable")]
    NotCallable { type_name: &'static str },

    #[error("call stack overflow at depth {depth}")]
    StackOverflow { depth: usize },

    #[error("no match arm accepted the value")]
    NoMatch,

    #[error("{name}: {message}")]
    Builtin { name: String, message: String },

    #[error("worker error: {0}")]
    Worker(String),

    #[error("mutex {id} {problem}")]
    Mutex { id: i64, problem: &'static str },

    #[error("invalid bytecode at offset {offset}: {detail}")]
    InvalidBytecode { offset: usize, detail: String },

    #[error("uncaught exception at line {line}: {message}")]
    Uncaught { message: String, line: u32 },
}

impl RuntimeError {
    pub fn builtin(name: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError::Builtin {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn type_mismatch(op: &'static str, detail: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch {
            op,
            detail: detail.into(),
        }
    }

    /// Whether an in-program handler may catch this error.
    pub fn is_catchable(&self) -> bool {
        !matches!(
            self,
            RuntimeError::InvalidBytecode { .. } | RuntimeError::Uncaught { .. }
        )
    }
}

// ============================================================================
// Unified Error
// ============================================================================

/// Top-level error covering every phase.
#[derive(Debug, Error)]
pub enum TrellisError {
    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("compilation error: {0}")]
    Compile(#[from] CompileError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

pub type Result<T> = std::result::Result<T, TrellisError>;
