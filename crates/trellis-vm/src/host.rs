//! The services builtins reach through [`BuiltinHost`]: output, workers
//! and program mutexes, all owned by the shared runtime.

use trellis_core::{RuntimeError, Value, WorkerHandle, WorkerStatus};
use trellis_registry::BuiltinHost;

use crate::vm::Vm;

impl BuiltinHost for Vm {
    fn write_output(&mut self, text: &str) {
        self.runtime.output().write(text);
    }

    fn spawn_named(
        &mut self,
        callee: Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<WorkerHandle, RuntimeError> {
        self.runtime.spawn_named(callee, name, args)
    }

    fn pool_submit(
        &mut self,
        callee: Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<WorkerHandle, RuntimeError> {
        self.runtime.pool_submit(callee, name, args)
    }

    fn wait(&mut self, handle: WorkerHandle) -> Result<WorkerStatus, RuntimeError> {
        self.runtime
            .wait(handle)
            .ok_or_else(|| RuntimeError::Worker(format!("unknown worker {handle}")))
    }

    fn worker_status(&self, handle: WorkerHandle) -> Option<WorkerStatus> {
        self.runtime.worker_status(handle)
    }

    fn worker_result(&self, handle: WorkerHandle) -> Option<Value> {
        self.runtime.worker_result(handle)
    }

    fn lookup_worker(&self, name: &str) -> Option<WorkerHandle> {
        self.runtime.lookup_worker(name)
    }

    fn worker_count(&self) -> usize {
        self.runtime.worker_count()
    }

    fn spawn_builtin(
        &mut self,
        builtin: &str,
        args: Vec<Value>,
    ) -> Result<WorkerHandle, RuntimeError> {
        self.runtime.spawn_builtin(builtin, args)
    }

    fn mutex_create(&mut self, recursive: bool) -> i64 {
        self.runtime.mutexes().create(recursive)
    }

    fn mutex_lock(&mut self, id: i64) -> Result<(), RuntimeError> {
        self.runtime.mutexes().lock(id)
    }

    fn mutex_unlock(&mut self, id: i64) -> Result<(), RuntimeError> {
        self.runtime.mutexes().unlock(id)
    }

    fn mutex_destroy(&mut self, id: i64) -> Result<(), RuntimeError> {
        self.runtime.mutexes().destroy(id)
    }
}
