//! Closure escape analysis.
//!
//! A closure value flowing into a location that lives longer than one of
//! its captured bindings would let the closure run after that binding's
//! scope is gone. Flows are recorded while resolving and checked once the
//! whole unit is resolved, when every function's capture list and return
//! flows are final.
//!
//! Call arguments escape to depth 0: the callee may store them anywhere,
//! including in a global or a worker that outlives the caller.

use rustc_hash::{FxHashMap, FxHashSet};
use trellis_ast::FunctionId;
use trellis_core::{ResolveError, Span};

use super::binding::{Binding, FunctionInfo};

/// Where a function value in an expression comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClosureSource {
    /// The function itself, by name or as a lambda.
    Function(FunctionId),
    /// Whatever calling one of the inner source's functions returns.
    CallResult(Box<ClosureSource>),
}

impl ClosureSource {
    pub fn call_result(callee: ClosureSource) -> Self {
        ClosureSource::CallResult(Box::new(callee))
    }
}

/// Closures flowing into a destination at a given lexical depth.
#[derive(Debug, Clone)]
pub struct EscapeCheck {
    pub sources: Vec<ClosureSource>,
    /// Depth of the destination; captures declared deeper do not outlive it.
    pub destination: u32,
    pub span: Span,
}

/// Check every recorded flow, reporting the first closure that outlives
/// a captured binding. `returns` holds what each function's `return`
/// statements may yield.
pub fn check_escapes(
    checks: &[EscapeCheck],
    returns: &FxHashMap<FunctionId, Vec<ClosureSource>>,
    functions: &[FunctionInfo],
    bindings: &[Binding],
) -> Result<(), ResolveError> {
    for check in checks {
        let mut reached = FxHashSet::default();
        for source in &check.sources {
            expand(source, returns, &mut FxHashSet::default(), &mut reached);
        }
        let mut reached: Vec<_> = reached.into_iter().collect();
        reached.sort();
        for function in reached {
            let info = &functions[function.0 as usize];
            for capture in &info.captures {
                let binding = &bindings[capture.binding.0 as usize];
                if binding.depth > check.destination {
                    return Err(ResolveError::ClosureLifetime {
                        name: info.name.clone(),
                        captured: binding.name.clone(),
                        span: check.span,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Collect the functions a source may evaluate to. `calling` guards
/// against recursive functions returning their own call results.
fn expand(
    source: &ClosureSource,
    returns: &FxHashMap<FunctionId, Vec<ClosureSource>>,
    calling: &mut FxHashSet<FunctionId>,
    out: &mut FxHashSet<FunctionId>,
) {
    match source {
        ClosureSource::Function(function) => {
            out.insert(*function);
        }
        ClosureSource::CallResult(callee) => {
            let mut callees = FxHashSet::default();
            expand(callee, returns, calling, &mut callees);
            for function in callees {
                if !calling.insert(function) {
                    continue;
                }
                for returned in returns.get(&function).into_iter().flatten() {
                    expand(returned, returns, calling, out);
                }
                calling.remove(&function);
            }
        }
    }
}
