//! Language-neutral abstract syntax tree.
//!
//! Every front-end lowers its own syntax into these nodes. The resolver
//! walks the tree mutably and fills the `resolved` decoration slots; the
//! compiler then reads only the decorated tree.
//!
//! ## Architecture
//!
//! - [`ast`] node definitions (program, modules, statements, expressions,
//!   patterns, type expressions)
//! - [`Resolved`] the per-reference decoration written by the resolver
//! - [`build`] terse constructors used by front-ends and tests

pub mod ast;
pub mod build;

pub use ast::*;
