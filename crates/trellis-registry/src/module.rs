//! Builtin modules: the unit a category of builtins is installed from.

use std::fmt;

use crate::host::NativeFn;

/// Whether a builtin produces a value.
///
/// Procedures still push `nil` so call sites are uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Function,
    Procedure,
}

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(u8),
    AtLeast(u8),
    Range(u8, u8),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n as usize,
            Arity::AtLeast(n) => count >= n as usize,
            Arity::Range(lo, hi) => count >= lo as usize && count <= hi as usize,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(lo, hi) => write!(f, "{lo} to {hi}"),
        }
    }
}

/// One builtin definition inside a [`Module`].
#[derive(Clone)]
pub struct FunctionDef {
    pub name: String,
    pub group: Option<String>,
    pub arity: Arity,
    pub kind: BuiltinKind,
    pub func: NativeFn,
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("arity", &self.arity)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A category of builtins ready to be installed into a registry.
#[derive(Debug, Clone)]
pub struct Module {
    pub category: String,
    pub groups: Vec<String>,
    pub functions: Vec<FunctionDef>,
}

impl Module {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            groups: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Declare a group so it is listed even before any function joins it.
    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.groups.push(name.into());
        self
    }

    /// Add a value-returning builtin to the default group.
    pub fn function(self, name: &str, arity: Arity, func: NativeFn) -> Self {
        self.add(name, None, arity, BuiltinKind::Function, func)
    }

    /// Add a builtin that returns nothing.
    pub fn procedure(self, name: &str, arity: Arity, func: NativeFn) -> Self {
        self.add(name, None, arity, BuiltinKind::Procedure, func)
    }

    /// Add a value-returning builtin to a named group.
    pub fn function_in(self, group: &str, name: &str, arity: Arity, func: NativeFn) -> Self {
        self.add(name, Some(group), arity, BuiltinKind::Function, func)
    }

    /// Add a builtin that returns nothing to a named group.
    pub fn procedure_in(self, group: &str, name: &str, arity: Arity, func: NativeFn) -> Self {
        self.add(name, Some(group), arity, BuiltinKind::Procedure, func)
    }

    fn add(
        mut self,
        name: &str,
        group: Option<&str>,
        arity: Arity,
        kind: BuiltinKind,
        func: NativeFn,
    ) -> Self {
        self.functions.push(FunctionDef {
            name: name.to_string(),
            group: group.map(str::to_string),
            arity,
            kind,
            func,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_accepts() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(1));
        assert!(Arity::AtLeast(1).accepts(5));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert!(Arity::Range(1, 2).accepts(2));
        assert!(!Arity::Range(1, 2).accepts(3));
    }

    #[test]
    fn arity_display() {
        assert_eq!(Arity::Exact(1).to_string(), "1");
        assert_eq!(Arity::AtLeast(2).to_string(), "at least 2");
        assert_eq!(Arity::Range(0, 3).to_string(), "0 to 3");
    }
}
