//! The immutable builtin registry and its builder.

use std::fmt::{self, Write};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::host::NativeFn;
use crate::module::{Arity, BuiltinKind, Module};

/// Group used for functions registered without an explicit group.
pub const DEFAULT_GROUP: &str = "default";

/// Dense index of a builtin in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuiltinId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("duplicate builtin '{name}' (already registered in category '{category}')")]
    DuplicateFunction { name: String, category: String },

    #[error("invalid builtin name '{0}'")]
    InvalidName(String),
}

/// A registered builtin.
#[derive(Clone)]
pub struct BuiltinEntry {
    pub id: BuiltinId,
    /// Name as registered (original case).
    pub name: String,
    pub category: String,
    pub group: String,
    pub arity: Arity,
    pub kind: BuiltinKind,
    pub func: NativeFn,
}

impl fmt::Debug for BuiltinEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("group", &self.group)
            .field("arity", &self.arity)
            .finish()
    }
}

/// A category and its groups, in registration order.
#[derive(Debug, Clone)]
pub struct CategoryInfo {
    pub name: String,
    pub groups: Vec<GroupInfo>,
}

#[derive(Debug, Clone)]
pub struct GroupInfo {
    pub name: String,
    pub functions: Vec<BuiltinId>,
}

// ============================================================================
// BuiltinRegistry
// ============================================================================

/// Immutable table of builtins.
///
/// Lookups are case-insensitive. Enumeration order is registration order,
/// which makes the inventory dump stable across runs and threads.
#[derive(Debug, Default)]
pub struct BuiltinRegistry {
    categories: Vec<CategoryInfo>,
    entries: Vec<BuiltinEntry>,
    by_name: FxHashMap<String, BuiltinId>,
}

impl BuiltinRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a builtin by name, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<&BuiltinEntry> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|id| &self.entries[id.0 as usize])
    }

    pub fn get(&self, id: BuiltinId) -> Option<&BuiltinEntry> {
        self.entries.get(id.0 as usize)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = &CategoryInfo> {
        self.categories.iter()
    }

    pub fn category(&self, name: &str) -> Option<&CategoryInfo> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Every builtin of a category, across its groups.
    pub fn functions_in(&self, category: &str) -> Vec<&BuiltinEntry> {
        self.category(category)
            .map(|cat| {
                cat.groups
                    .iter()
                    .flat_map(|g| g.functions.iter())
                    .map(|id| &self.entries[id.0 as usize])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn entries(&self) -> impl Iterator<Item = &BuiltinEntry> {
        self.entries.iter()
    }

    /// Write the inventory as `category`, `group` and `function` lines.
    pub fn write_inventory(&self, out: &mut impl Write) -> fmt::Result {
        for category in &self.categories {
            writeln!(out, "category {}", category.name)?;
            for group in &category.groups {
                writeln!(out, "group {} {}", category.name, group.name)?;
                for id in &group.functions {
                    let entry = &self.entries[id.0 as usize];
                    writeln!(
                        out,
                        "function {} {} {}",
                        category.name, group.name, entry.name
                    )?;
                }
            }
        }
        Ok(())
    }

    pub fn inventory(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_inventory(&mut out);
        out
    }
}

// ============================================================================
// RegistryBuilder
// ============================================================================

/// Mutable staging area; [`RegistryBuilder::build`] freezes it.
#[derive(Debug, Default, Clone)]
pub struct RegistryBuilder {
    categories: Vec<CategoryInfo>,
    entries: Vec<BuiltinEntry>,
    by_name: FxHashMap<String, BuiltinId>,
}

impl RegistryBuilder {
    /// Start from the contents of an existing registry.
    pub fn from_registry(registry: &BuiltinRegistry) -> Self {
        Self {
            categories: registry.categories.clone(),
            entries: registry.entries.clone(),
            by_name: registry.by_name.clone(),
        }
    }

    /// Register every function of a module under its category.
    pub fn install(&mut self, module: Module) -> Result<&mut Self, RegistrationError> {
        let category = self.category_index(&module.category);
        for group in &module.groups {
            self.group_index(category, group);
        }
        for def in module.functions {
            let group = def.group.as_deref().unwrap_or(DEFAULT_GROUP);
            self.register(
                &module.category,
                group,
                &def.name,
                def.arity,
                def.kind,
                def.func,
            )?;
        }
        Ok(self)
    }

    /// Register one builtin.
    pub fn register(
        &mut self,
        category: &str,
        group: &str,
        name: &str,
        arity: Arity,
        kind: BuiltinKind,
        func: NativeFn,
    ) -> Result<BuiltinId, RegistrationError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(RegistrationError::InvalidName(name.to_string()));
        }
        let key = name.to_ascii_lowercase();
        if let Some(existing) = self.by_name.get(&key) {
            return Err(RegistrationError::DuplicateFunction {
                name: name.to_string(),
                category: self.entries[existing.0 as usize].category.clone(),
            });
        }

        let cat_idx = self.category_index(category);
        let group_idx = self.group_index(cat_idx, group);
        let id = BuiltinId(self.entries.len() as u32);

        self.entries.push(BuiltinEntry {
            id,
            name: name.to_string(),
            category: self.categories[cat_idx].name.clone(),
            group: self.categories[cat_idx].groups[group_idx].name.clone(),
            arity,
            kind,
            func,
        });
        self.categories[cat_idx].groups[group_idx].functions.push(id);
        self.by_name.insert(key, id);
        Ok(id)
    }

    pub fn build(self) -> BuiltinRegistry {
        BuiltinRegistry {
            categories: self.categories,
            entries: self.entries,
            by_name: self.by_name,
        }
    }

    fn category_index(&mut self, name: &str) -> usize {
        if let Some(idx) = self
            .categories
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
        {
            return idx;
        }
        self.categories.push(CategoryInfo {
            name: name.to_string(),
            groups: Vec::new(),
        });
        self.categories.len() - 1
    }

    fn group_index(&mut self, category: usize, name: &str) -> usize {
        let groups = &mut self.categories[category].groups;
        if let Some(idx) = groups.iter().position(|g| g.name.eq_ignore_ascii_case(name)) {
            return idx;
        }
        groups.push(GroupInfo {
            name: name.to_string(),
            functions: Vec::new(),
        });
        groups.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BuiltinHost;
    use trellis_core::{RuntimeError, Value};

    fn noop(_: &mut dyn BuiltinHost, _: &[Value]) -> Result<Value, RuntimeError> {
        Ok(Value::Nil)
    }

    fn sample() -> BuiltinRegistry {
        let mut builder = BuiltinRegistry::builder();
        builder
            .install(
                Module::new("math")
                    .function("Sqrt", Arity::Exact(1), noop)
                    .function_in("trig", "sin", Arity::Exact(1), noop),
            )
            .unwrap();
        builder
            .install(Module::new("system").procedure("writeln", Arity::AtLeast(0), noop))
            .unwrap();
        builder.build()
    }

    #[test]
    fn lookup_ignores_case() {
        let registry = sample();
        assert_eq!(registry.lookup("sqrt").unwrap().name, "Sqrt");
        assert!(registry.lookup("SQRT").is_some());
        assert!(registry.lookup("cbrt").is_none());
    }

    #[test]
    fn entries_know_their_category_and_group() {
        let registry = sample();
        let sin = registry.lookup("sin").unwrap();
        assert_eq!(sin.category, "math");
        assert_eq!(sin.group, "trig");
        assert_eq!(registry.lookup("sqrt").unwrap().group, DEFAULT_GROUP);
    }

    #[test]
    fn duplicate_names_are_rejected_across_categories() {
        let mut builder = BuiltinRegistry::builder();
        builder
            .install(Module::new("a").function("f", Arity::Exact(0), noop))
            .unwrap();
        let err = builder
            .install(Module::new("b").function("F", Arity::Exact(0), noop))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateFunction { ref category, .. } if category == "a"));
    }

    #[test]
    fn inventory_is_in_registration_order() {
        let registry = sample();
        assert_eq!(
            registry.inventory(),
            "category math\n\
             group math default\n\
             function math default Sqrt\n\
             group math trig\n\
             function math trig sin\n\
             category system\n\
             group system default\n\
             function system default writeln\n"
        );
    }

    #[test]
    fn declared_groups_are_listed_when_empty() {
        let mut builder = BuiltinRegistry::builder();
        builder.install(Module::new("sql").group("sqlite")).unwrap();
        let registry = builder.build();
        assert_eq!(registry.inventory(), "category sql\ngroup sql sqlite\n");
        assert!(registry.functions_in("sql").is_empty());
    }

    #[test]
    fn functions_in_category() {
        let registry = sample();
        let names: Vec<_> = registry
            .functions_in("MATH")
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, ["Sqrt", "sin"]);
    }

    #[test]
    fn whitespace_names_are_invalid() {
        let mut builder = BuiltinRegistry::builder();
        let err = builder
            .register("x", DEFAULT_GROUP, "bad name", Arity::Exact(0), BuiltinKind::Function, noop)
            .unwrap_err();
        assert_eq!(err, RegistrationError::InvalidName("bad name".into()));
    }
}
