//! Resolution-time scopes.
//!
//! A `Scope` maps names to bindings in two namespaces (values and types)
//! and remembers which names its block will declare later, so that a use
//! before a declaration is reported as such rather than as an unknown
//! name. A `FunctionCtx` carries what belongs to one routine: its slot
//! allocator, labels, loop nesting and open protected regions.

use rustc_hash::{FxHashMap, FxHashSet};
use trellis_ast::{BindingId, FunctionId, Ident};

// ============================================================================
// Scopes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Block,
    Function,
    Module,
    PatternArm,
    ExceptionHandler,
}

/// An entry in a scope's type namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeEntry {
    Alias { generics: usize },
    Generic,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub depth: u32,
    pub values: FxHashMap<String, BindingId>,
    pub types: FxHashMap<String, TypeEntry>,
    /// Variables this block declares further down.
    pub pending: FxHashSet<String>,
    /// Index of the owning routine in the function stack.
    pub function: usize,
    /// Next free slot when the scope was entered.
    pub slot_base: u32,
    /// Module index, for module scopes.
    pub module: Option<usize>,
}

impl Scope {
    pub fn new(kind: ScopeKind, depth: u32, function: usize, slot_base: u32) -> Self {
        Self {
            kind,
            depth,
            values: FxHashMap::default(),
            types: FxHashMap::default(),
            pending: FxHashSet::default(),
            function,
            slot_base,
            module: None,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<BindingId> {
        self.values.get(name).copied()
    }
}

// ============================================================================
// Routines
// ============================================================================

#[derive(Debug, Clone)]
pub struct LabelSite {
    pub ident: Ident,
    /// Protected regions open at the site, outermost first.
    pub try_path: Vec<u32>,
}

#[derive(Debug)]
pub struct FunctionCtx {
    pub id: FunctionId,
    pub next_slot: u32,
    pub max_slots: u32,
    pub loop_depth: u32,
    pub try_path: Vec<u32>,
    next_try: u32,
    pub labels: FxHashMap<String, LabelSite>,
    pub gotos: Vec<LabelSite>,
}

impl FunctionCtx {
    pub fn new(id: FunctionId, first_slot: u32) -> Self {
        Self {
            id,
            next_slot: first_slot,
            max_slots: first_slot,
            loop_depth: 0,
            try_path: Vec::new(),
            next_try: 0,
            labels: FxHashMap::default(),
            gotos: Vec::new(),
        }
    }

    pub fn allocate_slot(&mut self) -> u32 {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.max_slots = self.max_slots.max(self.next_slot);
        slot
    }

    /// Release slots of a finished scope for reuse by its siblings.
    pub fn release_to(&mut self, base: u32) {
        self.next_slot = base;
    }

    pub fn enter_try(&mut self) {
        self.next_try += 1;
        self.try_path.push(self.next_try);
    }

    pub fn exit_try(&mut self) {
        self.try_path.pop();
    }

    pub fn is_main(&self) -> bool {
        self.id.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_scopes_reuse_slots() {
        let mut ctx = FunctionCtx::new(FunctionId(1), 2);
        let base = ctx.next_slot;
        assert_eq!(ctx.allocate_slot(), 2);
        assert_eq!(ctx.allocate_slot(), 3);
        ctx.release_to(base);
        assert_eq!(ctx.allocate_slot(), 2);
        assert_eq!(ctx.max_slots, 4);
    }

    #[test]
    fn try_regions_get_distinct_ids() {
        let mut ctx = FunctionCtx::new(FunctionId(0), 0);
        ctx.enter_try();
        let first = ctx.try_path.clone();
        ctx.exit_try();
        ctx.enter_try();
        assert_ne!(first, ctx.try_path);
    }
}
