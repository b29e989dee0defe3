//! Type namespace: aliases, generic parameters and core types.
//!
//! Types never reach the bytecode. The resolver only checks that every
//! type name is defined where it is used, that generic parameters stay
//! inside their declaration, and that aliases are instantiated with the
//! right number of arguments.

use trellis_ast::{Ident, TypeAliasDecl, TypeExpr};
use trellis_core::ResolveError;

use super::Resolver;
use super::scope::{ScopeKind, TypeEntry};

/// Built-in type names shared by every front-end, compared ignoring case.
pub const CORE_TYPES: &[&str] = &[
    "int", "integer", "long", "real", "float", "double", "string", "str", "char", "byte",
    "bool", "boolean", "void", "any", "nil", "array", "list", "function",
];

pub fn is_core_type(name: &str) -> bool {
    CORE_TYPES.iter().any(|core| core.eq_ignore_ascii_case(name))
}

impl Resolver<'_> {
    pub(super) fn resolve_type(&mut self, ty: &TypeExpr) -> Result<(), ResolveError> {
        match ty {
            TypeExpr::Named { name, args } => {
                for arg in args {
                    self.resolve_type(arg)?;
                }
                self.check_type_name(name, args.len())
            }
            TypeExpr::Array(element) => self.resolve_type(element),
            TypeExpr::Function { params, ret } => {
                for param in params {
                    self.resolve_type(param)?;
                }
                if let Some(ret) = ret {
                    self.resolve_type(ret)?;
                }
                Ok(())
            }
        }
    }

    fn check_type_name(&self, name: &Ident, arg_count: usize) -> Result<(), ResolveError> {
        let expected = match self.lookup_type(&name.name) {
            Some(TypeEntry::Alias { generics }) => generics,
            Some(TypeEntry::Generic) => 0,
            None if is_core_type(&name.name) => return Ok(()),
            None if self.seen_generics.contains(&name.name) => {
                return Err(ResolveError::GenericParameterLeak {
                    name: name.name.clone(),
                    span: name.span,
                });
            }
            None => {
                return Err(ResolveError::UndefinedType {
                    name: name.name.clone(),
                    span: name.span,
                });
            }
        };
        if expected != arg_count {
            return Err(ResolveError::GenericArity {
                name: name.name.clone(),
                expected,
                found: arg_count,
                span: name.span,
            });
        }
        Ok(())
    }

    fn lookup_type(&self, name: &str) -> Option<TypeEntry> {
        if self
            .generic_frames
            .iter()
            .rev()
            .any(|frame| frame.iter().any(|g| g == name))
        {
            return Some(TypeEntry::Generic);
        }
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.types.get(name).copied())
    }

    /// Enter the generic parameters of a declaration.
    pub(super) fn push_generics(&mut self, generics: &[Ident]) {
        let names: Vec<String> = generics.iter().map(|g| g.name.clone()).collect();
        self.seen_generics.extend(names.iter().cloned());
        self.generic_frames.push(names);
    }

    pub(super) fn pop_generics(&mut self) {
        self.generic_frames.pop();
    }

    pub(super) fn declare_type_alias(&mut self, decl: &TypeAliasDecl) -> Result<(), ResolveError> {
        let name = &decl.name;
        if is_core_type(&name.name) {
            return Err(ResolveError::BuiltinTypeShadow {
                name: name.name.clone(),
                span: name.span,
            });
        }
        if self.current_scope().types.contains_key(&name.name) {
            return Err(ResolveError::TypeAliasRedefinition {
                name: name.name.clone(),
                span: name.span,
            });
        }

        self.push_generics(&decl.generics);
        let target = self.resolve_type(&decl.target);
        self.pop_generics();
        target?;

        let entry = TypeEntry::Alias {
            generics: decl.generics.len(),
        };
        let scope = self.current_scope_mut();
        let local = scope.kind != ScopeKind::Module;
        scope.types.insert(name.name.clone(), entry);
        if local && self.policy.local_types_leak {
            if let Some(module) = self.module_scope_mut() {
                module.types.entry(name.name.clone()).or_insert(entry);
            }
        }
        Ok(())
    }
}
