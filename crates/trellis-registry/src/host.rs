//! The contract between native functions and the VM executing them.

use trellis_core::{RuntimeError, Value, WorkerHandle, WorkerStatus};

/// Signature of every native builtin.
pub type NativeFn = fn(&mut dyn BuiltinHost, &[Value]) -> Result<Value, RuntimeError>;

/// Services the VM offers to builtins.
///
/// Builtins never see VM internals; output and worker management go
/// through this trait so the registry stays independent of the VM crate.
pub trait BuiltinHost {
    /// Append text to the program's output sink.
    fn write_output(&mut self, text: &str);

    /// Run `callee` on a dedicated worker registered under `name`.
    ///
    /// `callee` is a function value or the name of a top-level procedure.
    fn spawn_named(
        &mut self,
        callee: Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<WorkerHandle, RuntimeError>;

    /// Queue `callee` on the bounded worker pool under `name`.
    fn pool_submit(
        &mut self,
        callee: Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<WorkerHandle, RuntimeError>;

    /// Block until the worker finishes and return its terminal status.
    fn wait(&mut self, handle: WorkerHandle) -> Result<WorkerStatus, RuntimeError>;

    fn worker_status(&self, handle: WorkerHandle) -> Option<WorkerStatus>;

    /// Return value of a completed worker.
    fn worker_result(&self, handle: WorkerHandle) -> Option<Value>;

    fn lookup_worker(&self, name: &str) -> Option<WorkerHandle>;

    /// Number of workers created so far.
    fn worker_count(&self) -> usize;

    /// Run the builtin called `builtin` on a dedicated worker.
    fn spawn_builtin(
        &mut self,
        builtin: &str,
        args: Vec<Value>,
    ) -> Result<WorkerHandle, RuntimeError>;

    /// Create a program mutex and return its id. A recursive mutex may be
    /// locked again by its holder.
    fn mutex_create(&mut self, recursive: bool) -> i64;

    /// Block until the calling worker holds mutex `id`.
    fn mutex_lock(&mut self, id: i64) -> Result<(), RuntimeError>;

    fn mutex_unlock(&mut self, id: i64) -> Result<(), RuntimeError>;

    fn mutex_destroy(&mut self, id: i64) -> Result<(), RuntimeError>;
}
