//! Core types shared by every trellis crate.
//!
//! - [`Span`] source positions carried by AST nodes and diagnostics
//! - the phase error hierarchy rooted at [`TrellisError`]
//! - [`Value`], the dynamically typed runtime value, plus the closure and
//!   worker handles the VM and native functions exchange

pub mod error;
pub mod span;
pub mod value;

pub use error::{CacheError, CompileError, ResolveError, Result, RuntimeError, TrellisError};
pub use span::Span;
pub use value::{Closure, SharedCell, Value, WorkerHandle, WorkerStatus};
