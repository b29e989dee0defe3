//! Test harness for end-to-end trellis programs.
//!
//! Programs are built with `trellis::ast::build`, compiled through a
//! [`Context`] with the default builtins and run against a buffered output.

#![allow(dead_code)]

use std::sync::Arc;

use trellis::{
    Config, Context, ContextError, FrontendPolicy, Output, ResolveError, Runtime, TrellisError,
};
use trellis::ast::Program;

pub struct Harness {
    ctx: Context,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(FrontendPolicy::c_like())
    }

    pub fn with_policy(policy: FrontendPolicy) -> Self {
        let config = Config::default().without_cache().with_frontend(policy);
        Self {
            ctx: Context::with_default_modules(config).expect("default modules install"),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Compile and run, returning the runtime so tests can inspect workers.
    pub fn execute(&self, mut program: Program) -> Result<Arc<Runtime>, ContextError> {
        let unit = self.ctx.compile(&mut program)?;
        let runtime = self.ctx.runtime(Arc::new(unit), Output::buffer());
        runtime.run_main()?;
        Ok(runtime)
    }

    /// Compile and run, returning everything the program wrote.
    pub fn run(&self, program: Program) -> String {
        match self.execute(program) {
            Ok(runtime) => runtime.output().take(),
            Err(err) => panic!("program failed: {err}"),
        }
    }

    /// Expect resolution to fail.
    pub fn resolve_error(&self, mut program: Program) -> ResolveError {
        match self.ctx.compile(&mut program) {
            Err(ContextError::Trellis(TrellisError::Resolve(err))) => err,
            Err(other) => panic!("expected a resolution error, got {other}"),
            Ok(_) => panic!("expected a resolution error, program compiled"),
        }
    }
}
