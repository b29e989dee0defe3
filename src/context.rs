//! The object threaded through every phase.
//!
//! A `Context` owns the configuration, the shared builtin registry and the
//! bytecode cache. There are no process-wide singletons: two contexts in one
//! process share nothing.
//!
//! # Example
//!
//! ```ignore
//! use trellis::{Config, Context};
//!
//! let ctx = Context::with_default_modules(Config::from_env())?;
//! let unit = ctx.compile(&mut program)?;
//! ctx.run(Arc::new(unit))?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use trellis_ast::Program;
use trellis_cache::{BytecodeCache, SourceIdentity, codec};
use trellis_compiler::{CompiledUnit, compile_program};
use trellis_core::{CacheError, RuntimeError, TrellisError, Value};
use trellis_registry::{BuiltinRegistry, Module, RegistrationError, SharedRegistry};
use trellis_vm::{Output, Runtime};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("builtin registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Trellis(#[from] TrellisError),
}

impl From<CacheError> for ContextError {
    fn from(err: CacheError) -> Self {
        ContextError::Trellis(err.into())
    }
}

impl From<RuntimeError> for ContextError {
    fn from(err: RuntimeError) -> Self {
        ContextError::Trellis(err.into())
    }
}

pub struct Context {
    config: Config,
    registry: SharedRegistry,
    cache: BytecodeCache,
}

impl Context {
    /// A context with no builtins installed.
    pub fn new(config: Config) -> Self {
        let cache = BytecodeCache::new(config.cache.clone());
        Self {
            config,
            registry: SharedRegistry::new(BuiltinRegistry::builder().build()),
            cache,
        }
    }

    /// A context with the system, math, strings and thread categories.
    pub fn with_default_modules(config: Config) -> Result<Self, ContextError> {
        let cache = BytecodeCache::new(config.cache.clone());
        Ok(Self {
            config,
            registry: SharedRegistry::new(trellis_modules::default_registry()?),
            cache,
        })
    }

    /// Install another category.
    ///
    /// Units compiled before the call keep the registry they were compiled
    /// against; later compilations see the new builtins.
    pub fn install(&self, module: Module) -> Result<(), ContextError> {
        self.registry.extend(|builder| builder.install(module).map(|_| ()))?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The currently published registry.
    pub fn registry(&self) -> Arc<BuiltinRegistry> {
        self.registry.snapshot()
    }

    pub fn cache(&self) -> &BytecodeCache {
        &self.cache
    }

    /// Resolve and compile a program with the configured front-end policy.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&self, program: &mut Program) -> Result<CompiledUnit, ContextError> {
        let registry = self.registry();
        Ok(compile_program(program, &registry, self.config.frontend)?)
    }

    /// Compile through the bytecode cache.
    ///
    /// `build` produces the program for `source` and only runs on a miss.
    /// A failed store is logged and otherwise ignored.
    pub fn compile_cached<F>(
        &self,
        source: &Path,
        dependencies: &[PathBuf],
        build: F,
    ) -> Result<Arc<CompiledUnit>, ContextError>
    where
        F: FnOnce() -> Program,
    {
        let identity = SourceIdentity::for_path(source);
        if let Some(unit) = self.cache.lookup(&identity, dependencies)? {
            return Ok(unit);
        }
        let mut program = build();
        let unit = self.compile(&mut program)?;
        if let Err(err) = self.cache.store(&identity, &unit) {
            warn!(source = %identity, %err, "could not store bytecode");
        }
        Ok(Arc::new(unit))
    }

    /// Read a standalone bytecode file.
    pub fn load_bytecode(&self, path: &Path) -> Result<CompiledUnit, ContextError> {
        let unit = codec::read_file(path)?;
        debug!(path = %path.display(), procedures = unit.procedures.len(), "loaded bytecode");
        Ok(unit)
    }

    /// A runtime for `unit` bound to the current registry.
    pub fn runtime(&self, unit: Arc<CompiledUnit>, output: Output) -> Arc<Runtime> {
        Runtime::new(unit, self.registry(), self.config.vm, output)
    }

    /// Run `unit` to completion, writing program output to stdout.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(&self, unit: Arc<CompiledUnit>) -> Result<Value, ContextError> {
        let runtime = self.runtime(unit, Output::Stdout);
        let result = runtime.run_main();
        runtime.shutdown_pool();
        Ok(result?)
    }
}
