//! trellis: a shared scope resolver, bytecode compiler, bytecode cache and
//! stack VM for several language front-ends.
//!
//! Front-ends hand over a [`trellis_ast::Program`]; the pipeline is
//!
//! ```text
//! resolve -> compile -> (cache) -> execute
//! ```
//!
//! and every phase is reached through a [`Context`].

mod config;
mod context;

pub use config::Config;
pub use context::{Context, ContextError};

pub use trellis_ast as ast;
pub use trellis_cache::{BytecodeCache, CacheConfig, CacheMode, SourceIdentity};
pub use trellis_compiler::{CompiledUnit, FrontendPolicy};
pub use trellis_core::{
    CacheError, CompileError, ResolveError, Result, RuntimeError, TrellisError, Value,
};
pub use trellis_registry::{BuiltinRegistry, Module};
pub use trellis_vm::{Output, Runtime, VmConfig};
