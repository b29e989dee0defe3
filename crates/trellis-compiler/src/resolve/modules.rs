//! Module table and initialisation order.

use rustc_hash::FxHashMap;
use trellis_ast::{BindingId, Import, ModuleDecl};
use trellis_core::ResolveError;

/// Members of one module, filled in as the module is resolved.
#[derive(Debug, Default)]
pub struct ModuleInfo {
    pub name: String,
    /// Every top-level binding, exported or not.
    pub members: FxHashMap<String, BindingId>,
}

/// Order modules so every module follows the modules it imports.
///
/// Returns indices into `modules`. Unknown imports and cycles are errors.
pub fn initialisation_order(
    modules: &[ModuleDecl],
    main_imports: &[Import],
) -> Result<Vec<usize>, ResolveError> {
    let by_name: FxHashMap<&str, usize> = modules
        .iter()
        .enumerate()
        .map(|(i, m)| (m.name.name.as_str(), i))
        .collect();

    let mut state = vec![Visit::Unvisited; modules.len()];
    let mut order = Vec::with_capacity(modules.len());

    for import in main_imports {
        let index = lookup(&by_name, import)?;
        visit(index, modules, &by_name, &mut state, &mut order)?;
    }
    // Modules nobody imports still initialise, after the imported ones.
    for index in 0..modules.len() {
        visit(index, modules, &by_name, &mut state, &mut order)?;
    }
    Ok(order)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress,
    Done,
}

fn lookup(by_name: &FxHashMap<&str, usize>, import: &Import) -> Result<usize, ResolveError> {
    by_name
        .get(import.module.name.as_str())
        .copied()
        .ok_or_else(|| ResolveError::UnknownModule {
            name: import.module.name.clone(),
            span: import.module.span,
        })
}

fn visit(
    index: usize,
    modules: &[ModuleDecl],
    by_name: &FxHashMap<&str, usize>,
    state: &mut [Visit],
    order: &mut Vec<usize>,
) -> Result<(), ResolveError> {
    match state[index] {
        Visit::Done => return Ok(()),
        Visit::InProgress => {
            let name = &modules[index].name;
            return Err(ResolveError::ImportCycle {
                name: name.name.clone(),
                span: name.span,
            });
        }
        Visit::Unvisited => {}
    }
    state[index] = Visit::InProgress;
    for import in &modules[index].imports {
        let dep = lookup(by_name, import)?;
        visit(dep, modules, by_name, state, order)?;
    }
    state[index] = Visit::Done;
    order.push(index);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_ast::build::*;

    #[test]
    fn dependencies_come_first() {
        let modules = vec![
            module("app", vec![import("util")], vec![]),
            module("util", vec![import("base")], vec![]),
            module("base", vec![], vec![]),
        ];
        let order = initialisation_order(&modules, &[import("app")]).unwrap();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn cycles_are_rejected() {
        let modules = vec![
            module("a", vec![import("b")], vec![]),
            module("b", vec![import("a")], vec![]),
        ];
        let err = initialisation_order(&modules, &[]).unwrap_err();
        assert_eq!(err.category(), "import-cycle");
    }

    #[test]
    fn unknown_import_is_reported() {
        let err = initialisation_order(&[], &[import("missing")]).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownModule { .. }));
        assert_eq!(err.identifier(), "missing");
    }
}
