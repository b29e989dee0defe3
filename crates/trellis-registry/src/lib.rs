//! Builtin registry for the trellis VM.
//!
//! Builtins are organised as categories → groups → functions. A registry
//! is assembled once from a fixed list of [`Module`]s and is immutable
//! afterwards, so the resolver, compiler and every VM worker can share it
//! behind an `Arc` without locking.
//!
//! ```ignore
//! use trellis_registry::BuiltinRegistry;
//!
//! let mut builder = BuiltinRegistry::builder();
//! builder.install(trellis_modules::math::module())?;
//! let registry = builder.build();
//! assert!(registry.lookup("SQRT").is_some());
//! ```

mod host;
mod module;
mod registry;
mod shared;

pub use host::{BuiltinHost, NativeFn};
pub use module::{Arity, BuiltinKind, FunctionDef, Module};
pub use registry::{
    BuiltinEntry, BuiltinId, BuiltinRegistry, CategoryInfo, GroupInfo, RegistrationError,
    RegistryBuilder, DEFAULT_GROUP,
};
pub use shared::SharedRegistry;
