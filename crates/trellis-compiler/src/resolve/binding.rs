//! Bindings and function records produced by resolution.
//!
//! Scopes are discarded once resolution finishes; these tables are what
//! the code generator consumes.

use bitflags::bitflags;
use trellis_ast::{BindingId, FunctionId, Literal};
use trellis_core::Span;

use super::escape::ClosureSource;

// ============================================================================
// Bindings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Variable,
    Constant,
    Parameter,
    Function,
    TypeAlias,
    Module,
    PatternVariable,
}

impl BindingKind {
    /// Noun used in assignment diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            BindingKind::Variable => "variable",
            BindingKind::Constant => "const",
            BindingKind::Parameter => "parameter",
            BindingKind::Function => "function",
            BindingKind::TypeAlias => "type",
            BindingKind::Module => "module",
            BindingKind::PatternVariable => "pattern variable",
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BindingFlags: u8 {
        const MUTABLE = 1 << 0;
        /// Some closure captures this binding; it lives in a cell.
        const CAPTURED = 1 << 1;
        const EXPORTED = 1 << 2;
        /// Compiler-introduced slot with no source name.
        const HIDDEN = 1 << 3;
    }
}

/// Where a binding's value lives at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    /// A slot in the owning function's frame.
    Local(u32),
    /// A global slot of the main program.
    Global(u32),
    /// A global slot owned by a module.
    ModuleMember {
        module: String,
        slot: u32,
        exported: bool,
    },
    /// A top-level function in the procedure table.
    Procedure(FunctionId),
    /// A folded constant; uses become constant loads.
    Inline,
}

impl Storage {
    pub fn global_slot(&self) -> Option<u32> {
        match self {
            Storage::Global(slot) | Storage::ModuleMember { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    pub flags: BindingFlags,
    pub storage: Storage,
    /// Lexical depth of the declaring scope (module scope is 0).
    pub depth: u32,
    pub owner: FunctionId,
    /// Declaration order within the unit.
    pub order: u32,
    pub span: Span,
    /// Folded value of a compile-time constant.
    pub value: Option<Literal>,
    /// Closures that may have been stored in this binding.
    pub closures: Vec<ClosureSource>,
    /// The function a `Function` binding declares.
    pub function: Option<FunctionId>,
}

impl Binding {
    pub fn is_captured(&self) -> bool {
        self.flags.contains(BindingFlags::CAPTURED)
    }

    pub fn is_mutable(&self) -> bool {
        self.flags.contains(BindingFlags::MUTABLE)
    }

    pub fn is_exported(&self) -> bool {
        self.flags.contains(BindingFlags::EXPORTED)
    }

    pub fn local_slot(&self) -> Option<u32> {
        match self.storage {
            Storage::Local(slot) => Some(slot),
            _ => None,
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Where a closure finds a captured cell when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    /// A local of the immediately enclosing function.
    Local(BindingId),
    /// An upvalue of the immediately enclosing function.
    Upvalue(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    /// The binding ultimately captured.
    pub binding: BindingId,
    pub source: CaptureSource,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Source-level name.
    pub name: String,
    /// Unique name in the procedure table.
    pub procedure: String,
    pub arity: usize,
    /// Frame slots needed, parameters included.
    pub local_count: u32,
    /// Upvalues, in index order.
    pub captures: Vec<Capture>,
    pub parent: Option<FunctionId>,
    /// Depth of the scope the function is declared in.
    pub depth: u32,
    pub binding: Option<BindingId>,
}

impl FunctionInfo {
    pub fn is_closure(&self) -> bool {
        !self.captures.is_empty()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Everything the code generator needs besides the decorated AST.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub bindings: Vec<Binding>,
    pub functions: Vec<FunctionInfo>,
    /// Indices into `Program::modules`, dependencies first.
    pub module_order: Vec<usize>,
    pub global_count: u32,
}

impl Resolution {
    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0 as usize]
    }

    pub fn function(&self, id: FunctionId) -> &FunctionInfo {
        &self.functions[id.0 as usize]
    }

    /// The main program's record.
    pub fn main(&self) -> &FunctionInfo {
        &self.functions[0]
    }

    /// First binding with the given source name, in declaration order.
    pub fn find_binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }
}
