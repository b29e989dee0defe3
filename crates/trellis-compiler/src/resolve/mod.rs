//! Scope resolution.
//!
//! The resolver walks a [`Program`] once, top-down, maintaining a stack of
//! lexical scopes and a stack of routines. Every name use is decorated with
//! a [`Resolved`] access path and every declaration gets a [`Binding`].
//! Captures are threaded through intermediate routines as they are found,
//! so each function's upvalue list is complete when its body ends.
//!
//! The first violation aborts resolution; nothing is compiled from a unit
//! that fails here.
//!
//! ## Lookup order
//!
//! 1. The scope chain, innermost first.
//! 2. Members exported by bare imports (two or more matches is ambiguous).
//! 3. Registered builtins, in callee position only, ignoring case.

mod binding;
mod escape;
mod fold;
mod modules;
mod policy;
mod scope;
mod types;

pub use binding::{
    Binding, BindingFlags, BindingKind, Capture, CaptureSource, FunctionInfo, Resolution, Storage,
};
pub use escape::ClosureSource;
pub use fold::fold;
pub use policy::FrontendPolicy;
pub use scope::ScopeKind;
pub use types::{CORE_TYPES, is_core_type};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;
use trellis_ast::{
    BindingId, Block, CatchClause, Expr, ForRangeStmt, FunctionDecl, FunctionId, Ident, Import,
    Literal, MatchStmt, ModuleDecl, NameRef, Pattern, Program, QualifiedName, Resolved, Stmt,
    TryStmt, VarDecl,
};
use trellis_core::{ResolveError, Span};
use trellis_registry::BuiltinRegistry;

use crate::bytecode::MAIN_PROCEDURE;
use escape::{EscapeCheck, check_escapes};
use modules::{ModuleInfo, initialisation_order};
use scope::{FunctionCtx, LabelSite, Scope};

type Result<T> = std::result::Result<T, ResolveError>;

/// Closures a value may hold.
type Sources = Vec<ClosureSource>;

const MAIN_FUNCTION: FunctionId = FunctionId(0);

/// Resolve a program, decorating it in place.
pub fn resolve(
    program: &mut Program,
    registry: &BuiltinRegistry,
    policy: FrontendPolicy,
) -> Result<Resolution> {
    Resolver::new(registry, policy).resolve(program)
}

pub struct Resolver<'a> {
    registry: &'a BuiltinRegistry,
    policy: FrontendPolicy,
    scopes: Vec<Scope>,
    /// Routines being resolved, outermost (the main program) first.
    routines: Vec<FunctionCtx>,
    bindings: Vec<Binding>,
    functions: Vec<FunctionInfo>,
    modules: Vec<ModuleInfo>,
    module_index: FxHashMap<String, usize>,
    /// Imports of the module (or main program) being resolved.
    imports: Vec<Import>,
    current_module: Option<usize>,
    /// Whether module items being declared are exported.
    exporting: bool,
    procedure_names: FxHashSet<String>,
    next_global: u32,
    generic_frames: Vec<Vec<String>>,
    seen_generics: FxHashSet<String>,
    escapes: Vec<EscapeCheck>,
    /// What each function's `return` statements may yield.
    returns: FxHashMap<FunctionId, Sources>,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a BuiltinRegistry, policy: FrontendPolicy) -> Self {
        Self {
            registry,
            policy,
            scopes: Vec::new(),
            routines: Vec::new(),
            bindings: Vec::new(),
            functions: Vec::new(),
            modules: Vec::new(),
            module_index: FxHashMap::default(),
            imports: Vec::new(),
            current_module: None,
            exporting: false,
            procedure_names: FxHashSet::default(),
            next_global: 0,
            generic_frames: Vec::new(),
            seen_generics: FxHashSet::default(),
            escapes: Vec::new(),
            returns: FxHashMap::default(),
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve(mut self, program: &mut Program) -> Result<Resolution> {
        let module_order = initialisation_order(&program.modules, &program.imports)?;

        self.functions.push(FunctionInfo {
            name: MAIN_PROCEDURE.to_string(),
            procedure: MAIN_PROCEDURE.to_string(),
            arity: 0,
            local_count: 0,
            captures: Vec::new(),
            parent: None,
            depth: 0,
            binding: None,
        });
        self.procedure_names.insert(MAIN_PROCEDURE.to_string());
        self.routines.push(FunctionCtx::new(MAIN_FUNCTION, 0));

        for (index, module) in program.modules.iter().enumerate() {
            self.module_index.insert(module.name.name.clone(), index);
            self.modules.push(ModuleInfo {
                name: module.name.name.clone(),
                members: FxHashMap::default(),
            });
        }
        for &index in &module_order {
            self.resolve_module(index, &mut program.modules[index])?;
        }

        self.current_module = None;
        self.imports = program.imports.clone();
        self.push_scope(ScopeKind::Module);
        self.resolve_stmts(&mut program.body)?;
        if let Some(entry) = &mut program.entry {
            self.resolve_entry(entry)?;
        }
        self.pop_scope();

        let main = self.pop_routine()?;
        self.functions[0].local_count = main.max_slots;

        check_escapes(&self.escapes, &self.returns, &self.functions, &self.bindings)?;

        Ok(Resolution {
            bindings: self.bindings,
            functions: self.functions,
            module_order,
            global_count: self.next_global,
        })
    }

    // ==========================================================================
    // Scopes
    // ==========================================================================

    fn push_scope(&mut self, kind: ScopeKind) {
        let depth = match kind {
            ScopeKind::Module => 0,
            _ => self.scopes.last().map_or(0, |s| s.depth + 1),
        };
        let function = self.routines.len() - 1;
        let slot_base = self.routines[function].next_slot;
        let mut scope = Scope::new(kind, depth, function, slot_base);
        if kind == ScopeKind::Module {
            scope.module = self.current_module;
        }
        trace!(?kind, depth, "push scope");
        self.scopes.push(scope);
    }

    fn pop_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            trace!(kind = ?scope.kind, depth = scope.depth, "pop scope");
            if let Some(routine) = self.routines.get_mut(scope.function) {
                routine.release_to(scope.slot_base);
            }
        }
    }

    fn current_scope(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    fn current_scope_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn module_scope_mut(&mut self) -> Option<&mut Scope> {
        self.scopes
            .iter_mut()
            .rev()
            .find(|s| s.kind == ScopeKind::Module)
    }

    fn routine(&self) -> &FunctionCtx {
        &self.routines[self.routines.len() - 1]
    }

    fn routine_mut(&mut self) -> &mut FunctionCtx {
        let last = self.routines.len() - 1;
        &mut self.routines[last]
    }

    /// Finish the innermost routine, checking its labels.
    fn pop_routine(&mut self) -> Result<FunctionCtx> {
        let Some(routine) = self.routines.pop() else {
            return Err(ResolveError::ReturnOutsideFunction {
                span: Span::default(),
            });
        };
        for goto in &routine.gotos {
            let name = &goto.ident.name;
            let Some(label) = routine.labels.get(name) else {
                return Err(ResolveError::UndefinedLabel {
                    name: name.clone(),
                    span: goto.ident.span,
                });
            };
            if label.try_path != goto.try_path {
                return Err(ResolveError::GotoAcrossTry {
                    name: name.clone(),
                    span: goto.ident.span,
                });
            }
        }
        Ok(routine)
    }

    // ==========================================================================
    // Declarations
    // ==========================================================================

    fn check_redeclaration(&self, ident: &Ident) -> Result<()> {
        if self.current_scope().values.contains_key(&ident.name)
            && !self.policy.allow_same_scope_redeclaration
        {
            return Err(ResolveError::DuplicateDeclaration {
                name: ident.name.clone(),
                span: ident.span,
            });
        }
        Ok(())
    }

    /// Storage for a new variable in the current scope.
    fn variable_storage(&mut self) -> Storage {
        if self.current_scope().kind == ScopeKind::Module {
            let slot = self.next_global;
            self.next_global += 1;
            match self.current_module {
                Some(module) => Storage::ModuleMember {
                    module: self.modules[module].name.clone(),
                    slot,
                    exported: self.exporting,
                },
                None => Storage::Global(slot),
            }
        } else {
            Storage::Local(self.routine_mut().allocate_slot())
        }
    }

    fn new_binding(
        &mut self,
        ident: &Ident,
        kind: BindingKind,
        mut flags: BindingFlags,
        storage: Storage,
    ) -> BindingId {
        if self.exporting && self.current_scope().kind == ScopeKind::Module {
            flags |= BindingFlags::EXPORTED;
        }
        let id = BindingId(self.bindings.len() as u32);
        self.bindings.push(Binding {
            name: ident.name.clone(),
            kind,
            flags,
            storage,
            depth: self.current_scope().depth,
            owner: self.routine().id,
            order: id.0,
            span: ident.span,
            value: None,
            closures: Vec::new(),
            function: None,
        });
        id
    }

    fn insert(&mut self, name: &str, id: BindingId) {
        let scope = self.current_scope_mut();
        scope.pending.remove(name);
        scope.values.insert(name.to_string(), id);
    }

    /// Declare a named value in the current scope.
    fn declare(&mut self, ident: &Ident, kind: BindingKind, mutable: bool) -> Result<BindingId> {
        self.check_redeclaration(ident)?;
        let storage = self.variable_storage();
        let flags = if mutable {
            BindingFlags::MUTABLE
        } else {
            BindingFlags::empty()
        };
        let id = self.new_binding(ident, kind, flags, storage);
        self.insert(&ident.name, id);
        Ok(id)
    }

    /// A compiler-introduced local with no visible name.
    fn hidden_local(&mut self, purpose: &str, span: Span) -> BindingId {
        let slot = self.routine_mut().allocate_slot();
        let ident = Ident::new(format!("<{purpose}>"), span);
        self.new_binding(
            &ident,
            BindingKind::Variable,
            BindingFlags::MUTABLE | BindingFlags::HIDDEN,
            Storage::Local(slot),
        )
    }

    /// Unique procedure-table name for a function declared here.
    fn procedure_name(&mut self, name: &str) -> String {
        let parent = self.routine().id;
        let base = if parent == MAIN_FUNCTION {
            match self.current_module {
                Some(module) => format!("{}.{}", self.modules[module].name, name),
                None => name.to_string(),
            }
        } else {
            format!("{}.{}", self.functions[parent.0 as usize].procedure, name)
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while self.procedure_names.contains(&candidate) {
            candidate = format!("{base}#{n}");
            n += 1;
        }
        self.procedure_names.insert(candidate.clone());
        candidate
    }

    fn new_function(&mut self, name: &str, arity: usize, binding: Option<BindingId>) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        let procedure = self.procedure_name(name);
        self.functions.push(FunctionInfo {
            name: name.to_string(),
            procedure,
            arity,
            local_count: 0,
            captures: Vec::new(),
            parent: Some(self.routine().id),
            depth: self.current_scope().depth,
            binding,
        });
        id
    }

    /// Declare a function binding ahead of its body (hoisting).
    fn declare_function(&mut self, decl: &mut FunctionDecl) -> Result<()> {
        self.check_redeclaration(&decl.name)?;
        let top_level = self.current_scope().kind == ScopeKind::Module;
        let id = FunctionId(self.functions.len() as u32);
        let storage = if top_level {
            Storage::Procedure(id)
        } else {
            Storage::Local(self.routine_mut().allocate_slot())
        };
        let binding = self.new_binding(
            &decl.name,
            BindingKind::Function,
            BindingFlags::empty(),
            storage,
        );
        self.bindings[binding.0 as usize].function = Some(id);
        self.insert(&decl.name.name, binding);

        let function = self.new_function(&decl.name.name, decl.params.len(), Some(binding));
        decl.function = Some(function);
        decl.resolved = Some(if top_level {
            Resolved::Procedure(self.functions[function.0 as usize].procedure.clone())
        } else {
            Resolved::Local(binding)
        });
        Ok(())
    }

    /// Hoist functions and note pending variables of one statement list.
    fn hoist(&mut self, stmts: &mut [Stmt]) -> Result<()> {
        for stmt in stmts.iter_mut() {
            match stmt {
                Stmt::Function(decl) => self.declare_function(decl)?,
                Stmt::Var(var) => {
                    self.current_scope_mut().pending.insert(var.name.name.clone());
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    fn lookup_value(&self, ident: &Ident) -> Result<Option<BindingId>> {
        if let Some(id) = self.scopes.iter().rev().find_map(|s| s.lookup(&ident.name)) {
            return Ok(Some(id));
        }
        self.lookup_imported(ident)
    }

    /// Find a name among the exports of bare imports.
    fn lookup_imported(&self, ident: &Ident) -> Result<Option<BindingId>> {
        let mut found: Vec<(usize, BindingId)> = Vec::new();
        for import in self.imports.iter().filter(|i| i.alias.is_none()) {
            let Some(&module) = self.module_index.get(&import.module.name) else {
                continue;
            };
            if found.iter().any(|(m, _)| *m == module) {
                continue;
            }
            if let Some(&id) = self.modules[module].members.get(&ident.name) {
                if self.bindings[id.0 as usize].is_exported() {
                    found.push((module, id));
                }
            }
        }
        match found.as_slice() {
            [] => Ok(None),
            [(_, id)] => Ok(Some(*id)),
            _ => Err(ResolveError::AmbiguousImport {
                name: ident.name.clone(),
                modules: found
                    .iter()
                    .map(|(m, _)| format!("'{}'", self.modules[*m].name))
                    .collect::<Vec<_>>()
                    .join(", "),
                span: ident.span,
            }),
        }
    }

    /// The error for a name nothing declares.
    fn missing(&self, ident: &Ident) -> ResolveError {
        if self.scopes.iter().any(|s| s.pending.contains(&ident.name)) {
            ResolveError::UseBeforeDeclaration {
                name: ident.name.clone(),
                span: ident.span,
            }
        } else {
            ResolveError::UndefinedIdentifier {
                name: ident.name.clone(),
                span: ident.span,
            }
        }
    }

    /// Access path to a binding from the current routine.
    fn access(&mut self, id: BindingId) -> Resolved {
        let binding = &self.bindings[id.0 as usize];
        match &binding.storage {
            Storage::Global(slot) | Storage::ModuleMember { slot, .. } => Resolved::Global(*slot),
            Storage::Procedure(function) => {
                Resolved::Procedure(self.functions[function.0 as usize].procedure.clone())
            }
            Storage::Inline => Resolved::Constant(binding.value.clone().unwrap_or(Literal::Nil)),
            Storage::Local(_) => {
                let owner = binding.owner;
                let current = self.routines.len() - 1;
                if self.routines[current].id == owner {
                    Resolved::Local(id)
                } else {
                    Resolved::Upvalue(self.capture(current, id))
                }
            }
        }
    }

    /// Thread a capture of `id` through the routine at `routine` and every
    /// routine between it and the binding's owner.
    fn capture(&mut self, routine: usize, id: BindingId) -> u16 {
        let function = self.routines[routine].id.0 as usize;
        if let Some(index) = self.functions[function]
            .captures
            .iter()
            .position(|c| c.binding == id)
        {
            return index as u16;
        }
        let parent = routine - 1;
        let source = if self.routines[parent].id == self.bindings[id.0 as usize].owner {
            self.bindings[id.0 as usize].flags |= BindingFlags::CAPTURED;
            CaptureSource::Local(id)
        } else {
            CaptureSource::Upvalue(self.capture(parent, id))
        };
        let captures = &mut self.functions[function].captures;
        captures.push(Capture { binding: id, source });
        (captures.len() - 1) as u16
    }

    fn sources_of(&self, id: BindingId) -> Sources {
        let binding = &self.bindings[id.0 as usize];
        match (binding.kind, binding.function) {
            (BindingKind::Function, Some(function)) => vec![ClosureSource::Function(function)],
            _ => binding.closures.clone(),
        }
    }

    /// Record closures flowing into a binding.
    fn flow_into(&mut self, id: BindingId, sources: Sources, span: Span) {
        if sources.is_empty() {
            return;
        }
        let binding = &mut self.bindings[id.0 as usize];
        let destination = binding.depth;
        for source in &sources {
            if !binding.closures.contains(source) {
                binding.closures.push(source.clone());
            }
        }
        self.escapes.push(EscapeCheck {
            sources,
            destination,
            span,
        });
    }

    /// Record closures passed to a call. The callee may keep them past the
    /// caller's activation, so they must not capture any local.
    fn flow_into_call(&mut self, sources: Sources, span: Span) {
        if sources.is_empty() {
            return;
        }
        self.escapes.push(EscapeCheck {
            sources,
            destination: 0,
            span,
        });
    }

    // ==========================================================================
    // Modules
    // ==========================================================================

    fn resolve_module(&mut self, index: usize, module: &mut ModuleDecl) -> Result<()> {
        self.current_module = Some(index);
        self.imports = module.imports.clone();
        self.push_scope(ScopeKind::Module);

        for item in module.items.iter_mut() {
            self.exporting = item.exported;
            self.hoist(std::slice::from_mut(&mut item.stmt))?;
        }
        for item in module.items.iter_mut() {
            self.exporting = item.exported;
            self.resolve_stmt(&mut item.stmt)?;
        }
        self.exporting = false;

        let members = self.current_scope().values.clone();
        self.modules[index].members = members;
        self.pop_scope();
        Ok(())
    }

    /// The module a qualifier names: an alias, a bare import, or the
    /// module being resolved.
    fn module_for_qualifier(&self, qualifier: &Ident) -> Result<usize> {
        let name = &qualifier.name;
        let imported = self
            .imports
            .iter()
            .find(|i| match &i.alias {
                Some(alias) => &alias.name == name,
                None => &i.module.name == name,
            })
            .and_then(|i| self.module_index.get(&i.module.name).copied());
        if let Some(index) = imported {
            return Ok(index);
        }
        match self.current_module {
            Some(current) if &self.modules[current].name == name => Ok(current),
            _ => Err(ResolveError::UnknownModule {
                name: name.clone(),
                span: qualifier.span,
            }),
        }
    }

    fn resolve_qualified_binding(&self, q: &QualifiedName) -> Result<BindingId> {
        let module = self.module_for_qualifier(&q.module)?;
        let member = &q.member.name;
        let own = self.current_module == Some(module);
        let found = if own {
            self.scopes
                .iter()
                .find(|s| s.kind == ScopeKind::Module)
                .and_then(|s| s.lookup(member))
        } else {
            self.modules[module].members.get(member).copied()
        };
        let Some(id) = found else {
            return Err(ResolveError::UndefinedIdentifier {
                name: format!("{}.{}", q.module.name, member),
                span: q.span,
            });
        };
        if !own && !self.bindings[id.0 as usize].is_exported() {
            return Err(ResolveError::NotExported {
                module: self.modules[module].name.clone(),
                member: member.clone(),
                span: q.member.span,
            });
        }
        Ok(id)
    }

    fn resolve_entry(&mut self, entry: &mut NameRef) -> Result<()> {
        let id = self
            .lookup_value(&entry.ident)?
            .ok_or_else(|| self.missing(&entry.ident))?;
        entry.resolved = Some(self.access(id));
        Ok(())
    }

    // ==========================================================================
    // Statements
    // ==========================================================================

    fn resolve_stmts(&mut self, stmts: &mut [Stmt]) -> Result<()> {
        self.hoist(stmts)?;
        for stmt in stmts.iter_mut() {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    // A failed resolution is discarded whole, so scopes are not unwound on
    // the error path.

    fn resolve_block(&mut self, block: &mut Block, kind: ScopeKind) -> Result<()> {
        self.push_scope(kind);
        self.resolve_stmts(&mut block.stmts)?;
        self.pop_scope();
        Ok(())
    }

    fn resolve_loop_body(&mut self, body: &mut Block) -> Result<()> {
        self.routine_mut().loop_depth += 1;
        self.resolve_block(body, ScopeKind::Block)?;
        self.routine_mut().loop_depth -= 1;
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        match stmt {
            Stmt::Var(decl) => self.resolve_var(decl),
            Stmt::Function(decl) => {
                if decl.function.is_none() {
                    self.declare_function(decl)?;
                }
                self.resolve_function(decl)
            }
            Stmt::TypeAlias(decl) => self.declare_type_alias(decl),
            Stmt::Expr(expr) => self.resolve_expr(expr).map(drop),
            Stmt::Block(block) => self.resolve_block(block, ScopeKind::Block),
            Stmt::If(s) => {
                self.resolve_expr(&mut s.cond)?;
                self.resolve_block(&mut s.then_branch, ScopeKind::Block)?;
                if let Some(else_branch) = &mut s.else_branch {
                    self.resolve_stmt(else_branch)?;
                }
                Ok(())
            }
            Stmt::While(s) => {
                self.resolve_expr(&mut s.cond)?;
                self.resolve_loop_body(&mut s.body)
            }
            Stmt::DoWhile(s) => {
                self.resolve_loop_body(&mut s.body)?;
                self.resolve_expr(&mut s.cond).map(drop)
            }
            Stmt::For(s) => {
                self.push_scope(ScopeKind::Block);
                if let Some(init) = &mut s.init {
                    self.resolve_stmt(init)?;
                }
                if let Some(cond) = &mut s.cond {
                    self.resolve_expr(cond)?;
                }
                if let Some(step) = &mut s.step {
                    self.resolve_expr(step)?;
                }
                self.resolve_loop_body(&mut s.body)?;
                self.pop_scope();
                Ok(())
            }
            Stmt::ForRange(s) => self.resolve_for_range(s),
            Stmt::Break(span) => self.check_in_loop("break", *span),
            Stmt::Continue(span) => self.check_in_loop("continue", *span),
            Stmt::Return(s) => {
                if self.routine().is_main() {
                    return Err(ResolveError::ReturnOutsideFunction { span: s.span });
                }
                if let Some(value) = &mut s.value {
                    let sources = self.resolve_expr(value)?;
                    if !sources.is_empty() {
                        let function = self.routine().id;
                        let destination = self.functions[function.0 as usize].depth;
                        let returned = self.returns.entry(function).or_default();
                        for source in &sources {
                            if !returned.contains(source) {
                                returned.push(source.clone());
                            }
                        }
                        self.escapes.push(EscapeCheck {
                            sources,
                            destination,
                            span: s.span,
                        });
                    }
                }
                Ok(())
            }
            Stmt::Try(s) => self.resolve_try(s),
            Stmt::Throw(s) => self.resolve_expr(&mut s.value).map(drop),
            Stmt::Match(s) => self.resolve_match(s),
            Stmt::Label(ident) => {
                let try_path = self.routine().try_path.clone();
                let routine = self.routine_mut();
                if routine.labels.contains_key(&ident.name) {
                    return Err(ResolveError::DuplicateLabel {
                        name: ident.name.clone(),
                        span: ident.span,
                    });
                }
                routine.labels.insert(
                    ident.name.clone(),
                    LabelSite {
                        ident: ident.clone(),
                        try_path,
                    },
                );
                Ok(())
            }
            Stmt::Goto(ident) => {
                let try_path = self.routine().try_path.clone();
                self.routine_mut().gotos.push(LabelSite {
                    ident: ident.clone(),
                    try_path,
                });
                Ok(())
            }
        }
    }

    fn check_in_loop(&self, keyword: &'static str, span: Span) -> Result<()> {
        if self.routine().loop_depth == 0 {
            return Err(ResolveError::OutsideLoop { keyword, span });
        }
        Ok(())
    }

    fn resolve_var(&mut self, decl: &mut VarDecl) -> Result<()> {
        if let Some(ty) = &decl.ty {
            self.resolve_type(ty)?;
        }
        let sources = match &mut decl.init {
            Some(init) => self.resolve_expr(init)?,
            None => Vec::new(),
        };

        if !decl.is_const {
            let id = self.declare(&decl.name, BindingKind::Variable, true)?;
            self.flow_into(id, sources, decl.span);
            decl.resolved = Some(self.access(id));
            return Ok(());
        }

        match decl.init.as_ref().and_then(fold) {
            Some(value) => {
                self.check_redeclaration(&decl.name)?;
                let id = self.new_binding(
                    &decl.name,
                    BindingKind::Constant,
                    BindingFlags::empty(),
                    Storage::Inline,
                );
                self.bindings[id.0 as usize].value = Some(value.clone());
                self.insert(&decl.name.name, id);
                if self.policy.local_consts_leak && self.current_scope().kind != ScopeKind::Module
                {
                    if let Some(module) = self.module_scope_mut() {
                        module.values.entry(decl.name.name.clone()).or_insert(id);
                    }
                }
                decl.resolved = Some(Resolved::Constant(value));
            }
            None if self.policy.const_requires_constant_initializer => {
                return Err(ResolveError::NonConstantInitializer {
                    name: decl.name.name.clone(),
                    span: decl.span,
                });
            }
            None => {
                let id = self.declare(&decl.name, BindingKind::Constant, false)?;
                self.flow_into(id, sources, decl.span);
                decl.resolved = Some(self.access(id));
            }
        }
        Ok(())
    }

    fn resolve_function(&mut self, decl: &mut FunctionDecl) -> Result<()> {
        let Some(function) = decl.function else {
            return Err(ResolveError::UndefinedIdentifier {
                name: decl.name.name.clone(),
                span: decl.name.span,
            });
        };
        self.push_generics(&decl.generics);
        self.resolve_function_body(function, decl)?;
        self.pop_generics();
        Ok(())
    }

    fn resolve_function_body(&mut self, function: FunctionId, decl: &mut FunctionDecl) -> Result<()> {
        for param in &decl.params {
            if let Some(ty) = &param.ty {
                self.resolve_type(ty)?;
            }
        }
        if let Some(ret) = &decl.ret {
            self.resolve_type(ret)?;
        }

        self.routines.push(FunctionCtx::new(function, 0));
        self.push_scope(ScopeKind::Function);
        for param in decl.params.iter_mut() {
            let id = self.declare(&param.name, BindingKind::Parameter, true)?;
            param.resolved = Some(Resolved::Local(id));
        }
        self.resolve_stmts(&mut decl.body.stmts)?;
        self.pop_scope();
        let routine = self.pop_routine()?;
        self.functions[function.0 as usize].local_count = routine.max_slots;
        Ok(())
    }

    fn resolve_for_range(&mut self, s: &mut ForRangeStmt) -> Result<()> {
        self.resolve_expr(&mut s.start)?;
        self.resolve_expr(&mut s.end)?;

        let persists = s.declares && self.policy.loop_variable_persists;
        if persists {
            let id = self.declare(&s.var, BindingKind::Variable, true)?;
            s.resolved = Some(self.access(id));
        }
        self.push_scope(ScopeKind::Block);
        if s.declares && !persists {
            let id = self.declare(&s.var, BindingKind::Variable, true)?;
            s.resolved = Some(self.access(id));
        } else if !s.declares {
            let id = self.assignable(&s.var)?;
            s.resolved = Some(self.access(id));
        }
        s.scratch = Some(self.hidden_local("for-end", s.span));
        self.resolve_loop_body(&mut s.body)?;
        self.pop_scope();
        Ok(())
    }

    fn resolve_try(&mut self, s: &mut TryStmt) -> Result<()> {
        self.routine_mut().enter_try();
        self.resolve_block(&mut s.body, ScopeKind::Block)?;
        self.routine_mut().exit_try();
        if let Some(handler) = &mut s.handler {
            self.resolve_handler(handler)?;
        }
        Ok(())
    }

    fn resolve_handler(&mut self, handler: &mut CatchClause) -> Result<()> {
        self.push_scope(ScopeKind::ExceptionHandler);
        if let Some(var) = &handler.var {
            let id = self.declare(var, BindingKind::Variable, true)?;
            handler.resolved = Some(Resolved::Local(id));
        }
        self.resolve_stmts(&mut handler.body.stmts)?;
        self.pop_scope();
        Ok(())
    }

    fn resolve_match(&mut self, s: &mut MatchStmt) -> Result<()> {
        self.resolve_expr(&mut s.scrutinee)?;
        self.push_scope(ScopeKind::Block);
        s.scratch = Some(self.hidden_local("match", s.span));
        for arm in s.arms.iter_mut() {
            self.push_scope(ScopeKind::PatternArm);
            let mut names = FxHashSet::default();
            self.resolve_pattern(&mut arm.pattern, &mut names)?;
            if let Some(guard) = &mut arm.guard {
                self.resolve_expr(guard)?;
            }
            self.resolve_stmts(&mut arm.body.stmts)?;
            self.pop_scope();
        }
        self.pop_scope();
        Ok(())
    }

    fn resolve_pattern(&mut self, pattern: &mut Pattern, names: &mut FxHashSet<String>) -> Result<()> {
        match pattern {
            Pattern::Wildcard(_) | Pattern::Literal(..) => Ok(()),
            Pattern::Binding { name, resolved } => {
                if !names.insert(name.name.clone()) {
                    return Err(ResolveError::DuplicatePatternBinding {
                        name: name.name.clone(),
                        span: name.span,
                    });
                }
                let id = self.declare(name, BindingKind::PatternVariable, true)?;
                *resolved = Some(Resolved::Local(id));
                Ok(())
            }
            Pattern::Array {
                elements,
                span,
                scratch,
            } => {
                *scratch = Some(self.hidden_local("array-pattern", *span));
                for element in elements.iter_mut() {
                    self.resolve_pattern(element, names)?;
                }
                Ok(())
            }
        }
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    /// Resolve an expression, returning the closures its value may hold.
    fn resolve_expr(&mut self, expr: &mut Expr) -> Result<Sources> {
        match expr {
            Expr::Literal(..) => Ok(Vec::new()),
            Expr::Name(name) => self.resolve_name(name, None),
            Expr::Qualified(q) => {
                let id = self.resolve_qualified_binding(q)?;
                q.resolved = Some(self.access(id));
                Ok(self.sources_of(id))
            }
            Expr::Assign(assign) => {
                let sources = self.resolve_expr(&mut assign.value)?;
                self.resolve_target(&mut assign.target, sources.clone(), assign.span)?;
                Ok(sources)
            }
            Expr::Unary(u) => self.resolve_expr(&mut u.operand).map(|_| Vec::new()),
            Expr::Binary(b) => {
                self.resolve_expr(&mut b.left)?;
                self.resolve_expr(&mut b.right)?;
                Ok(Vec::new())
            }
            Expr::Logical(l) => {
                let mut sources = self.resolve_expr(&mut l.left)?;
                sources.extend(self.resolve_expr(&mut l.right)?);
                Ok(sources)
            }
            Expr::Call(call) => {
                let argc = call.args.len();
                let callees = match &mut call.callee {
                    Expr::Name(name) => self.resolve_name(name, Some(argc))?,
                    callee => self.resolve_expr(callee)?,
                };
                for arg in call.args.iter_mut() {
                    let span = arg.span();
                    let sources = self.resolve_expr(arg)?;
                    self.flow_into_call(sources, span);
                }
                Ok(callees.into_iter().map(ClosureSource::call_result).collect())
            }
            Expr::Array(elements, _) => {
                let mut sources = Vec::new();
                for element in elements.iter_mut() {
                    sources.extend(self.resolve_expr(element)?);
                }
                Ok(sources)
            }
            Expr::Index(ix) => {
                let sources = self.resolve_expr(&mut ix.target)?;
                self.resolve_expr(&mut ix.index)?;
                Ok(sources)
            }
            Expr::Lambda(decl) => {
                let function = self.new_function(&decl.name.name, decl.params.len(), None);
                decl.function = Some(function);
                self.resolve_function(decl)?;
                Ok(vec![ClosureSource::Function(function)])
            }
        }
    }

    /// Resolve a name use. `callee_argc` is set in callee position, where
    /// builtins are visible.
    fn resolve_name(&mut self, name: &mut NameRef, callee_argc: Option<usize>) -> Result<Sources> {
        if let Some(id) = self.lookup_value(&name.ident)? {
            name.resolved = Some(self.access(id));
            return Ok(self.sources_of(id));
        }
        if let Some(argc) = callee_argc {
            if let Some(entry) = self.registry.lookup(&name.ident.name) {
                if !entry.arity.accepts(argc) {
                    return Err(ResolveError::BuiltinArity {
                        name: entry.name.clone(),
                        expected: entry.arity.to_string(),
                        found: argc,
                        span: name.ident.span,
                    });
                }
                name.resolved = Some(Resolved::Builtin(entry.name.to_ascii_lowercase()));
                return Ok(Vec::new());
            }
        }
        Err(self.missing(&name.ident))
    }

    /// Check that `ident` names a mutable binding and return it.
    fn assignable(&self, ident: &Ident) -> Result<BindingId> {
        let Some(id) = self.lookup_value(ident)? else {
            return Err(self.missing_target(ident));
        };
        self.check_mutable(id, ident)?;
        Ok(id)
    }

    fn check_mutable(&self, id: BindingId, ident: &Ident) -> Result<()> {
        let binding = &self.bindings[id.0 as usize];
        match binding.kind {
            BindingKind::Constant => Err(ResolveError::ConstReassignment {
                name: ident.name.clone(),
                span: ident.span,
            }),
            BindingKind::Variable | BindingKind::Parameter | BindingKind::PatternVariable
                if binding.is_mutable() =>
            {
                Ok(())
            }
            kind => Err(ResolveError::InvalidAssignment {
                name: ident.name.clone(),
                kind: kind.describe(),
                span: ident.span,
            }),
        }
    }

    /// The error for assigning to a name with no value binding.
    fn missing_target(&self, ident: &Ident) -> ResolveError {
        let is_type = self
            .scopes
            .iter()
            .any(|s| s.types.contains_key(&ident.name))
            || is_core_type(&ident.name);
        let is_module = self.module_index.contains_key(&ident.name)
            || self
                .imports
                .iter()
                .any(|i| i.alias.as_ref().is_some_and(|a| a.name == ident.name));
        let kind = if is_type {
            "type"
        } else if is_module {
            "module"
        } else {
            return self.missing(ident);
        };
        ResolveError::InvalidAssignment {
            name: ident.name.clone(),
            kind,
            span: ident.span,
        }
    }

    fn resolve_target(&mut self, target: &mut Expr, sources: Sources, span: Span) -> Result<()> {
        match target {
            Expr::Name(name) => {
                let id = self.assignable(&name.ident)?;
                name.resolved = Some(self.access(id));
                self.flow_into(id, sources, span);
                Ok(())
            }
            Expr::Qualified(q) => {
                let id = self.resolve_qualified_binding(q)?;
                self.check_mutable(id, &q.member)?;
                q.resolved = Some(self.access(id));
                self.flow_into(id, sources, span);
                Ok(())
            }
            Expr::Index(ix) => {
                self.resolve_expr(&mut ix.index)?;
                match &mut ix.target {
                    Expr::Name(_) | Expr::Qualified(_) => {
                        self.resolve_target(&mut ix.target, sources, span)
                    }
                    other => Err(ResolveError::InvalidAssignment {
                        name: "nested index".to_string(),
                        kind: "expression",
                        span: other.span(),
                    }),
                }
            }
            other => Err(ResolveError::InvalidAssignment {
                name: "expression".to_string(),
                kind: "expression",
                span: other.span(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_ast::build::*;

    fn registry() -> BuiltinRegistry {
        use trellis_core::Value;
        use trellis_registry::{Arity, BuiltinKind};
        let mut builder = BuiltinRegistry::builder();
        builder
            .register(
                "system",
                "io",
                "writeln",
                Arity::AtLeast(0),
                BuiltinKind::Procedure,
                |_, _| Ok(Value::Nil),
            )
            .unwrap();
        builder.build()
    }

    fn run(program: &mut Program, policy: FrontendPolicy) -> Result<Resolution> {
        resolve(program, &registry(), policy)
    }

    fn ok(mut program: Program) -> (Program, Resolution) {
        let resolution = run(&mut program, FrontendPolicy::c_like()).unwrap();
        (program, resolution)
    }

    fn err(mut program: Program) -> ResolveError {
        run(&mut program, FrontendPolicy::c_like()).unwrap_err()
    }

    #[test]
    fn top_level_variables_are_globals() {
        let (_, res) = ok(Program::new(vec![var("x", int(1)), var("y", int(2))]));
        assert_eq!(res.global_count, 2);
        assert_eq!(res.find_binding("y").unwrap().storage, Storage::Global(1));
    }

    #[test]
    fn block_locals_are_invisible_after_exit() {
        let e = err(Program::new(vec![
            block_stmt(vec![var("inner", int(1))]),
            expr(call("writeln", vec![name("inner")])),
        ]));
        assert_eq!(e.category(), "undefined-identifier");
        assert_eq!(e.identifier(), "inner");
    }

    #[test]
    fn sibling_blocks_share_slots() {
        let (_, res) = ok(Program::new(vec![
            block_stmt(vec![var("a", int(1))]),
            block_stmt(vec![var("b", int(2))]),
        ]));
        assert_eq!(res.find_binding("a").unwrap().storage, Storage::Local(0));
        assert_eq!(res.find_binding("b").unwrap().storage, Storage::Local(0));
        assert_eq!(res.main().local_count, 1);
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let e = err(Program::new(vec![var("x", int(1)), var("x", int(2))]));
        assert_eq!(e.category(), "duplicate-declaration");
    }

    #[test]
    fn redeclaration_policy_keeps_last() {
        let mut program = Program::new(vec![var("x", int(1)), var("x", int(2))]);
        let policy = FrontendPolicy {
            allow_same_scope_redeclaration: true,
            ..FrontendPolicy::c_like()
        };
        assert!(run(&mut program, policy).is_ok());
    }

    #[test]
    fn functions_are_hoisted_variables_are_not() {
        let (_, res) = ok(Program::new(vec![
            expr(call("later", vec![])),
            function("later", &[], vec![ret(int(1))]),
        ]));
        assert!(res.find_function("later").is_some());

        let e = err(Program::new(vec![
            expr(call("writeln", vec![name("late")])),
            var("late", int(1)),
        ]));
        assert_eq!(e.category(), "disallowed-hoist");
    }

    #[test]
    fn const_rejects_assignment_at_any_depth() {
        let e = err(Program::new(vec![
            constant("limit", int(3)),
            function("f", &[], vec![block_stmt(vec![expr(assign("limit", int(4)))])]),
        ]));
        assert_eq!(e.category(), "const-reassignment");
        assert_eq!(e.identifier(), "limit");
    }

    #[test]
    fn folded_constants_resolve_to_values() {
        let (program, _) = ok(Program::new(vec![
            constant("a", int(2)),
            constant("b", mul(name("a"), int(3))),
            expr(call("writeln", vec![name("b")])),
        ]));
        let Stmt::Expr(Expr::Call(call)) = &program.body[2] else {
            panic!("expected call");
        };
        let Expr::Name(arg) = &call.args[0] else {
            panic!("expected name");
        };
        assert_eq!(arg.resolved, Some(Resolved::Constant(Literal::Int(6))));
    }

    #[test]
    fn non_constant_initializer_under_strict_policy() {
        let mut program = Program::new(vec![
            function("f", &[], vec![ret(int(1))]),
            constant("c", call("f", vec![])),
        ]);
        let e = run(&mut program, FrontendPolicy::pascal()).unwrap_err();
        assert!(e.to_string().contains("must be compile-time evaluable"));
        assert_eq!(e.category(), "constant");
    }

    #[test]
    fn nested_capture_threads_through_intermediate_function() {
        let (_, res) = ok(Program::new(vec![function(
            "outer",
            &[],
            vec![
                var("x", int(1)),
                function(
                    "middle",
                    &[],
                    vec![
                        function("inner", &[], vec![ret(name("x"))]),
                        ret(call("inner", vec![])),
                    ],
                ),
                ret(call("middle", vec![])),
            ],
        )]));
        let middle = res.find_function("middle").unwrap();
        let inner = res.find_function("inner").unwrap();
        assert_eq!(middle.captures.len(), 1);
        assert_eq!(inner.captures.len(), 1);
        assert_eq!(inner.captures[0].source, CaptureSource::Upvalue(0));
        assert!(res.find_binding("x").unwrap().is_captured());
        assert_eq!(middle.procedure, "outer.middle");
    }

    #[test]
    fn returning_closure_over_local_is_lifetime_error() {
        let e = err(Program::new(vec![function(
            "makeAdder",
            &["seed"],
            vec![
                var("base", name("seed")),
                function("inner", &["d"], vec![ret(add(name("base"), name("d")))]),
                ret(name("inner")),
            ],
        )]));
        assert_eq!(e.category(), "closure-lifetime");
        assert!(e.to_string().contains("lifetime"));
    }

    #[test]
    fn storing_loop_closure_in_global_is_lifetime_error() {
        let e = err(Program::new(vec![
            var_uninit("saved"),
            for_c(
                Some(var("i", int(0))),
                Some(lt(name("i"), int(2))),
                Some(assign("i", add(name("i"), int(1)))),
                vec![
                    function("capture", &[], vec![ret(name("i"))]),
                    expr(assign("saved", name("capture"))),
                ],
            ),
        ]));
        assert_eq!(e.category(), "closure-lifetime");
    }

    #[test]
    fn non_escaping_closure_is_accepted() {
        let (_, res) = ok(Program::new(vec![function(
            "main",
            &[],
            vec![
                var("counter", int(0)),
                function(
                    "inc",
                    &[],
                    vec![
                        expr(assign("counter", add(name("counter"), int(1)))),
                        ret(name("counter")),
                    ],
                ),
                expr(call("writeln", vec![call("inc", vec![])])),
            ],
        )]));
        assert!(res.find_binding("counter").unwrap().is_captured());
    }

    #[test]
    fn closure_over_globals_may_escape() {
        let (_, _) = ok(Program::new(vec![
            var("total", int(0)),
            function(
                "make",
                &[],
                vec![ret(lambda(&[], vec![ret(name("total"))]))],
            ),
        ]));
    }

    fn counter_body(tail: Vec<Stmt>) -> Vec<Stmt> {
        let mut body = vec![
            var("x", int(1)),
            function(
                "inner",
                &[],
                vec![
                    expr(assign("x", add(name("x"), int(1)))),
                    ret(name("x")),
                ],
            ),
        ];
        body.extend(tail);
        body
    }

    #[test]
    fn closure_passed_to_routine_is_lifetime_error() {
        let e = err(Program::new(vec![
            var_uninit("saved"),
            function("keep", &["f"], vec![expr(assign("saved", name("f")))]),
            function(
                "outer",
                &[],
                counter_body(vec![expr(call("keep", vec![name("inner")]))]),
            ),
        ]));
        assert_eq!(e.category(), "closure-lifetime");
        assert_eq!(e.identifier(), "inner");
    }

    #[test]
    fn closure_passed_to_builtin_is_lifetime_error() {
        let e = err(Program::new(vec![function(
            "outer",
            &[],
            counter_body(vec![expr(call("writeln", vec![name("inner")]))]),
        )]));
        assert_eq!(e.category(), "closure-lifetime");
    }

    #[test]
    fn returning_a_call_result_follows_the_callee() {
        let e = err(Program::new(vec![function(
            "outer",
            &[],
            counter_body(vec![
                function("getter", &[], vec![ret(name("inner"))]),
                ret(call("getter", vec![])),
            ]),
        )]));
        assert_eq!(e.category(), "closure-lifetime");

        // Calling the closure inside its frame is fine, and so is using
        // the helper's result locally.
        ok(Program::new(vec![function(
            "outer",
            &[],
            counter_body(vec![
                function("getter", &[], vec![ret(name("inner"))]),
                var("f", call("getter", vec![])),
                ret(call("f", vec![])),
            ]),
        )]));
    }

    #[test]
    fn recursive_call_results_resolve() {
        ok(Program::new(vec![function(
            "down",
            &["n"],
            vec![ret(call("down", vec![sub(name("n"), int(1))]))],
        )]));
    }

    #[test]
    fn builtin_lookup_ignores_case_and_checks_arity() {
        let (program, _) = ok(Program::new(vec![expr(call("WriteLn", vec![int(1)]))]));
        let Stmt::Expr(Expr::Call(call)) = &program.body[0] else {
            panic!("expected call");
        };
        let Expr::Name(callee) = &call.callee else {
            panic!("expected name");
        };
        assert_eq!(callee.resolved, Some(Resolved::Builtin("writeln".into())));
    }

    #[test]
    fn builtins_are_not_values() {
        let e = err(Program::new(vec![var("w", name("writeln"))]));
        assert_eq!(e.category(), "undefined-identifier");
    }

    #[test]
    fn locals_beat_imports() {
        let (program, _) = ok(Program::new(vec![
            var("shared", int(0)),
            expr(call("writeln", vec![name("shared")])),
        ])
        .with_module(module("m", vec![], vec![export(var("shared", int(1)))]))
        .with_import(import("m")));
        let Stmt::Expr(Expr::Call(call)) = &program.body[1] else {
            panic!("expected call");
        };
        let Expr::Name(arg) = &call.args[0] else {
            panic!("expected name");
        };
        // `m.shared` takes slot 0, the program's own `shared` slot 1.
        assert_eq!(arg.resolved, Some(Resolved::Global(1)));
    }

    #[test]
    fn ambiguous_bare_imports() {
        let e = err(Program::new(vec![expr(call("writeln", vec![name("value")]))])
            .with_module(module("a", vec![], vec![export(var("value", int(1)))]))
            .with_module(module("b", vec![], vec![export(var("value", int(2)))]))
            .with_import(import("a"))
            .with_import(import("b")));
        assert_eq!(e.category(), "ambiguous-import");
        assert_eq!(e.identifier(), "value");
    }

    #[test]
    fn aliased_imports_require_qualification() {
        let program = Program::new(vec![expr(call("writeln", vec![name("value")]))])
            .with_module(module("a", vec![], vec![export(var("value", int(1)))]))
            .with_import(import_as("a", "x"));
        assert_eq!(err(program).category(), "undefined-identifier");

        let program = Program::new(vec![expr(call("writeln", vec![qualified("x", "value")]))])
            .with_module(module("a", vec![], vec![export(var("value", int(1)))]))
            .with_import(import_as("a", "x"));
        ok(program);
    }

    #[test]
    fn private_members_are_not_exported() {
        let e = err(Program::new(vec![expr(call("writeln", vec![qualified("m", "secret")]))])
            .with_module(module("m", vec![], vec![private(var("secret", int(1)))]))
            .with_import(import("m")));
        assert_eq!(e.category(), "not-exported");
        assert_eq!(e.identifier(), "secret");
    }

    #[test]
    fn module_functions_get_qualified_procedure_names() {
        let (_, res) = ok(Program::new(vec![expr(call("get", vec![]))])
            .with_module(module(
                "m",
                vec![],
                vec![
                    private(var("hidden", int(3))),
                    export(function("get", &[], vec![ret(name("hidden"))])),
                ],
            ))
            .with_import(import("m")));
        assert_eq!(res.find_function("get").unwrap().procedure, "m.get");
    }

    #[test]
    fn pattern_variables_are_scoped_to_the_arm() {
        let e = err(Program::new(vec![
            match_(int(1), vec![arm(pbind("v"), None, vec![])]),
            expr(call("writeln", vec![name("v")])),
        ]));
        assert_eq!(e.category(), "undefined-identifier");

        let e = err(Program::new(vec![match_(
            array(vec![int(1), int(2)]),
            vec![arm(parray(vec![pbind("v"), pbind("v")]), None, vec![])],
        )]));
        assert_eq!(e.category(), "duplicate-declaration");
    }

    #[test]
    fn exception_variable_is_scoped_to_handler() {
        let e = err(Program::new(vec![
            try_catch(vec![throw(string("x"))], Some("e"), vec![]),
            expr(call("writeln", vec![name("e")])),
        ]));
        assert_eq!(e.identifier(), "e");
    }

    #[test]
    fn loop_variable_persistence_follows_policy() {
        let body = || {
            vec![
                for_range("i", true, int(1), int(3), vec![]),
                expr(call("writeln", vec![name("i")])),
            ]
        };
        let mut pascal = Program::new(body());
        assert!(run(&mut pascal, FrontendPolicy::pascal()).is_ok());
        let mut clike = Program::new(body());
        assert!(run(&mut clike, FrontendPolicy::c_like()).is_err());
    }

    #[test]
    fn type_alias_rules() {
        let e = err(Program::new(vec![type_alias("integer", &[], ty("string"))]));
        assert_eq!(e.category(), "type-alias");

        let e = err(Program::new(vec![
            type_alias("Id", &[], ty("int")),
            type_alias("Id", &[], ty("string")),
        ]));
        assert!(e.to_string().contains("redefinition"));

        let e = err(Program::new(vec![typed_var("p", ty("Point"), None)]));
        assert!(e.to_string().contains("Undefined type 'Point'"));

        let e = err(Program::new(vec![
            type_alias("Box", &["T"], ty_args("array", vec![ty("T")])),
            typed_var("b", ty_args("Box", vec![ty("int"), ty("int")]), None),
        ]));
        assert_eq!(e.category(), "type-alias");
    }

    #[test]
    fn generic_parameters_stay_in_their_declaration() {
        let e = err(Program::new(vec![
            type_alias("Box", &["T"], ty_args("array", vec![ty("T")])),
            typed_var("leak", ty("T"), None),
        ]));
        assert_eq!(e.category(), "generic-parameter-leak");
    }

    #[test]
    fn local_types_leak_under_pascal_policy() {
        let body = || {
            vec![
                function("setup", &[], vec![type_alias("Count", &[], ty("integer"))]),
                typed_var("n", ty("Count"), Some(int(0))),
            ]
        };
        let mut pascal = Program::new(body());
        assert!(run(&mut pascal, FrontendPolicy::pascal()).is_ok());
        let mut clike = Program::new(body());
        let e = run(&mut clike, FrontendPolicy::c_like()).unwrap_err();
        assert_eq!(e.category(), "undefined-type");
    }

    #[test]
    fn labels_and_gotos() {
        let e = err(Program::new(vec![function("f", &[], vec![goto("nowhere")])]));
        assert!(e.to_string().contains("goto target 'nowhere' is not defined"));

        let e = err(Program::new(vec![function("f", &[], vec![label("a"), label("a")])]));
        assert!(e.to_string().contains("declared more than once"));

        let e = err(Program::new(vec![function(
            "f",
            &[],
            vec![try_catch(vec![goto("out")], None, vec![]), label("out")],
        )]));
        assert_eq!(e.category(), "label");

        ok(Program::new(vec![function("f", &[], vec![goto("end"), label("end")])]));
    }

    #[test]
    fn control_flow_placement() {
        assert_eq!(err(Program::new(vec![brk()])).category(), "control-flow");
        assert_eq!(err(Program::new(vec![ret(int(1))])).category(), "control-flow");
        let e = err(Program::new(vec![while_(
            boolean(true),
            vec![function("f", &[], vec![cont()])],
        )]));
        assert_eq!(e.identifier(), "continue");
    }

    #[test]
    fn invalid_assignment_targets() {
        let e = err(Program::new(vec![
            function("f", &[], vec![]),
            expr(assign("f", int(1))),
        ]));
        assert_eq!(e.category(), "invalid-assignment");

        let e = err(Program::new(vec![expr(assign_to(int(1), int(2)))]));
        assert_eq!(e.category(), "invalid-assignment");
    }

    #[test]
    fn entry_point_resolves_to_procedure() {
        let (program, _) = ok(Program::new(vec![function("main", &[], vec![])]).with_entry("main"));
        assert_eq!(
            program.entry.unwrap().resolved,
            Some(Resolved::Procedure("main".into()))
        );
    }
}
