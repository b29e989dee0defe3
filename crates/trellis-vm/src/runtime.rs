//! State shared by every VM executing one compiled unit.
//!
//! A [`Runtime`] owns the unit, the builtin registry snapshot, globals, the
//! program mutexes, the output sink and the worker table. Each thread of
//! execution (the main run and every worker) drives its own [`Vm`] over the
//! same `Arc<Runtime>`.

use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::debug;
use trellis_compiler::bytecode::{CompiledUnit, Constant, ProcedureRecord};
use trellis_core::{Closure, RuntimeError, Value, WorkerHandle, WorkerStatus};
use trellis_registry::{BuiltinId, BuiltinRegistry};

use crate::config::VmConfig;
use crate::locks::MutexTable;
use crate::vm::Vm;
use crate::workers::{WorkerPool, WorkerTable};

type Result<T> = std::result::Result<T, RuntimeError>;

// ============================================================================
// Output
// ============================================================================

/// Where `write`/`writeln` output goes.
#[derive(Debug)]
pub enum Output {
    Stdout,
    /// Collected in memory, for embedding and tests.
    Buffer(Mutex<String>),
}

impl Output {
    /// An empty in-memory sink.
    pub fn buffer() -> Self {
        Output::Buffer(Mutex::new(String::new()))
    }

    /// Append `text`. Stdout is flushed after every write so worker output
    /// interleaves at call granularity.
    pub fn write(&self, text: &str) {
        match self {
            Output::Stdout => {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            Output::Buffer(buffer) => buffer.lock().push_str(text),
        }
    }

    /// Drain the buffered text. Always empty for stdout.
    pub fn take(&self) -> String {
        match self {
            Output::Stdout => String::new(),
            Output::Buffer(buffer) => std::mem::take(&mut *buffer.lock()),
        }
    }
}

// ============================================================================
// Runtime
// ============================================================================

/// Everything the threads running one unit share.
///
/// Always handled as `Arc<Runtime>`: workers hold a clone for as long as
/// they run, so the runtime outlives every thread it started.
#[derive(Debug)]
pub struct Runtime {
    unit: Arc<CompiledUnit>,
    registry: Arc<BuiltinRegistry>,
    config: VmConfig,
    procedures: FxHashMap<String, u32>,
    /// The unit's constant pool as runtime values.
    constants: Vec<Value>,
    globals: RwLock<Vec<Option<Value>>>,
    output: Output,
    workers: WorkerTable,
    pool: OnceLock<WorkerPool>,
    mutexes: MutexTable,
}

/// What a worker executes.
enum WorkerJob {
    Closure(Arc<Closure>, Vec<Value>),
    Builtin(BuiltinId, Vec<Value>),
}

impl Runtime {
    /// Prepare a runtime for `unit`. Constants are converted to values once
    /// here; globals start undefined.
    pub fn new(
        unit: Arc<CompiledUnit>,
        registry: Arc<BuiltinRegistry>,
        config: VmConfig,
        output: Output,
    ) -> Arc<Self> {
        let procedures = unit
            .procedures
            .iter()
            .enumerate()
            .map(|(index, record)| (record.name.clone(), index as u32))
            .collect();
        let constants = unit
            .constants
            .constants()
            .iter()
            .map(constant_value)
            .collect();
        Arc::new(Self {
            unit,
            registry,
            config,
            procedures,
            constants,
            globals: RwLock::new(Vec::new()),
            output,
            workers: WorkerTable::new(),
            pool: OnceLock::new(),
            mutexes: MutexTable::new(),
        })
    }

    /// Execute the main program region to its `Halt`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run_main(self: &Arc<Self>) -> Result<Value> {
        Vm::new(self.clone()).run_main()
    }

    /// Call a top-level procedure by name on a fresh VM.
    pub fn call_procedure(self: &Arc<Self>, name: &str, args: Vec<Value>) -> Result<Value> {
        Vm::new(self.clone()).call_procedure(name, args)
    }

    /// The unit every VM of this runtime executes.
    pub fn unit(&self) -> &CompiledUnit {
        &self.unit
    }

    /// The registry snapshot taken when the runtime was created.
    pub fn registry(&self) -> &Arc<BuiltinRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Mutexes created by `mutex` and `rcmutex`, shared by every worker.
    pub fn mutexes(&self) -> &MutexTable {
        &self.mutexes
    }

    /// Constant pool entry `index` as a runtime value.
    pub fn constant(&self, index: usize) -> Option<&Value> {
        self.constants.get(index)
    }

    /// Index of the procedure with the given unique name.
    pub fn procedure_index(&self, name: &str) -> Option<u32> {
        self.procedures.get(name).copied()
    }

    pub fn procedure(&self, index: u32) -> Option<&ProcedureRecord> {
        self.unit.procedures.get(index as usize)
    }

    // ==========================================================================
    // Globals
    // ==========================================================================

    /// Read a global slot. A slot whose definition has not run yet is an
    /// `UndefinedGlobal` error.
    pub fn global(&self, slot: usize) -> Result<Value> {
        self.globals
            .read()
            .get(slot)
            .cloned()
            .flatten()
            .ok_or(RuntimeError::UndefinedGlobal { slot })
    }

    /// Store into a global slot, defining it if needed.
    pub fn set_global(&self, slot: usize, value: Value) {
        let mut globals = self.globals.write();
        if globals.len() <= slot {
            globals.resize(slot + 1, None);
        }
        globals[slot] = Some(value);
    }

    // ==========================================================================
    // Workers
    // ==========================================================================

    /// Run `callee` on a new OS thread registered under `name`.
    pub fn spawn_named(
        self: &Arc<Self>,
        callee: Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<WorkerHandle> {
        let target = self.worker_target(callee)?;
        let handle = self.start_thread(name, WorkerJob::Closure(target, args))?;
        debug!(worker = %handle, name, "spawned named worker");
        Ok(handle)
    }

    /// Run one builtin on a new OS thread. The worker is registered under
    /// the builtin's name; its result is the builtin's return value.
    pub fn spawn_builtin(
        self: &Arc<Self>,
        builtin: &str,
        args: Vec<Value>,
    ) -> Result<WorkerHandle> {
        let entry = self
            .registry
            .lookup(builtin)
            .ok_or_else(|| RuntimeError::UnknownBuiltin {
                name: builtin.to_string(),
            })?;
        let (id, name) = (entry.id, entry.name.to_ascii_lowercase());
        let handle = self.start_thread(&name, WorkerJob::Builtin(id, args))?;
        debug!(worker = %handle, builtin = %name, "spawned builtin worker");
        Ok(handle)
    }

    fn start_thread(self: &Arc<Self>, name: &str, job: WorkerJob) -> Result<WorkerHandle> {
        let handle = self.workers.register(name);
        let runtime = self.clone();
        let thread_name = if name.is_empty() {
            format!("trellis-worker-{}", handle.0)
        } else {
            name.to_string()
        };
        let spawned = thread::Builder::new()
            .name(thread_name)
            .spawn(move || runtime.run_worker(handle, job));
        if let Err(e) = spawned {
            let err = RuntimeError::Worker(format!("cannot spawn thread: {e}"));
            self.workers.complete(handle, Err(err.clone()));
            return Err(err);
        }
        Ok(handle)
    }

    /// Queue `callee` on the pool, starting the pool on first use.
    pub fn pool_submit(
        self: &Arc<Self>,
        callee: Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<WorkerHandle> {
        let target = self.worker_target(callee)?;
        let pool = match self.pool.get() {
            Some(pool) => pool,
            None => {
                let pool = WorkerPool::new(self.config.pool_size)?;
                // A racing submitter may have installed its pool first.
                let _ = self.pool.set(pool);
                self.pool
                    .get()
                    .ok_or_else(|| RuntimeError::Worker("pool unavailable".into()))?
            }
        };
        let handle = self.workers.register(name);
        let runtime = self.clone();
        let job = WorkerJob::Closure(target, args);
        if let Err(err) = pool.submit(Box::new(move || runtime.run_worker(handle, job))) {
            self.workers.complete(handle, Err(err.clone()));
            return Err(err);
        }
        debug!(worker = %handle, name, "submitted pool worker");
        Ok(handle)
    }

    /// Block until the worker finishes. `None` for an unknown handle.
    pub fn wait(&self, handle: WorkerHandle) -> Option<WorkerStatus> {
        self.workers.wait(handle)
    }

    /// Current status without blocking.
    pub fn worker_status(&self, handle: WorkerHandle) -> Option<WorkerStatus> {
        self.workers.status(handle)
    }

    /// Return value of a completed worker.
    pub fn worker_result(&self, handle: WorkerHandle) -> Option<Value> {
        self.workers.result(handle)
    }

    /// Latest worker registered under `name`.
    pub fn lookup_worker(&self, name: &str) -> Option<WorkerHandle> {
        self.workers.lookup(name)
    }

    /// Workers created so far, finished ones included.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop the pool after its queued jobs finish.
    pub fn shutdown_pool(&self) {
        if let Some(pool) = self.pool.get() {
            pool.shutdown();
        }
    }

    fn worker_target(&self, callee: Value) -> Result<Arc<Closure>> {
        match callee {
            Value::Function(closure) => Ok(closure),
            Value::Str(name) => {
                let index = self
                    .procedure_index(&name)
                    .ok_or_else(|| RuntimeError::UnknownProcedure { name: name.to_string() })?;
                Ok(Arc::new(Closure::new(index, name, Box::new([]))))
            }
            other => Err(RuntimeError::NotCallable {
                type_name: other.type_name(),
            }),
        }
    }

    /// Drive one worker to completion. A panic inside the VM fails the
    /// worker instead of leaving waiters blocked on it.
    fn run_worker(self: Arc<Self>, handle: WorkerHandle, job: WorkerJob) {
        let runtime = self.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
            let mut vm = Vm::new(runtime);
            match job {
                WorkerJob::Closure(target, args) => vm.call_closure(target, args),
                WorkerJob::Builtin(id, args) => vm.call_builtin_by_id(id, &args),
            }
        }))
        .unwrap_or_else(|payload| Err(RuntimeError::Worker(panic_message(payload.as_ref()))));
        self.workers.complete(handle, outcome);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("worker panicked: {detail}")
}

fn constant_value(constant: &Constant) -> Value {
    match constant {
        Constant::Nil => Value::Nil,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int(i) => Value::Int(*i),
        Constant::Real(r) => Value::Real(*r),
        Constant::Str(s) => Value::str(s),
    }
}
