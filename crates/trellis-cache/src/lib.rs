//! Bytecode cache for compiled trellis units.
//!
//! - [`codec`] reads and writes the binary layout, for cache entries and
//!   standalone bytecode files alike
//! - [`SourceIdentity`] keys entries by an xxh64 hash of the source path
//! - [`BytecodeCache`] checks freshness against the source and its
//!   dependencies and keeps decoded units in memory
//!
//! Format problems are never fatal: they surface as misses, except for a
//! newer bytecode version under `strict_version`.

pub mod codec;
mod identity;
mod store;

pub use identity::SourceIdentity;
pub use store::{BytecodeCache, CacheConfig, CacheMode, default_cache_dir};

pub type Result<T> = std::result::Result<T, trellis_core::CacheError>;
