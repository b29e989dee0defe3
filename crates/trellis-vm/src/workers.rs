//! Worker bookkeeping and the fixed-size worker pool.
//!
//! Every worker, whether it runs on a dedicated thread or on the pool, gets
//! a [`WorkerHandle`] and a record in the [`WorkerTable`]. Completion is
//! published under the table lock and signalled on a condvar, so `wait`
//! returning is a happens-before edge with everything the worker did.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};
use trellis_core::{RuntimeError, Value, WorkerHandle, WorkerStatus};

// ============================================================================
// Worker table
// ============================================================================

#[derive(Debug)]
struct WorkerRecord {
    name: String,
    status: WorkerStatus,
    result: Option<Value>,
}

#[derive(Debug, Default)]
struct TableState {
    next: u64,
    records: FxHashMap<WorkerHandle, WorkerRecord>,
    by_name: FxHashMap<String, WorkerHandle>,
}

/// Status, result and name of every worker a runtime started.
#[derive(Debug, Default)]
pub struct WorkerTable {
    state: Mutex<TableState>,
    finished: Condvar,
}

impl WorkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running worker. A non-empty name makes it reachable
    /// through [`lookup`](Self::lookup); a later worker with the same name
    /// takes the name over.
    pub fn register(&self, name: &str) -> WorkerHandle {
        let mut state = self.state.lock();
        state.next += 1;
        let handle = WorkerHandle(state.next);
        state.records.insert(
            handle,
            WorkerRecord {
                name: name.to_string(),
                status: WorkerStatus::Running,
                result: None,
            },
        );
        if !name.is_empty() {
            state.by_name.insert(name.to_string(), handle);
        }
        handle
    }

    /// Publish a worker's outcome and wake every waiter.
    pub fn complete(&self, handle: WorkerHandle, outcome: Result<Value, RuntimeError>) {
        let mut state = self.state.lock();
        if let Some(record) = state.records.get_mut(&handle) {
            match outcome {
                Ok(value) => {
                    debug!(worker = %handle, name = %record.name, "worker completed");
                    record.status = WorkerStatus::Completed;
                    record.result = Some(value);
                }
                Err(err) => {
                    warn!(worker = %handle, name = %record.name, error = %err, "worker failed");
                    record.status = WorkerStatus::Failed(err.to_string());
                }
            }
        }
        drop(state);
        self.finished.notify_all();
    }

    /// Block until the worker is no longer running. `None` for an unknown
    /// handle.
    pub fn wait(&self, handle: WorkerHandle) -> Option<WorkerStatus> {
        let mut state = self.state.lock();
        loop {
            let status = state.records.get(&handle)?.status.clone();
            if status.is_terminal() {
                return Some(status);
            }
            self.finished.wait(&mut state);
        }
    }

    /// Current status without blocking.
    pub fn status(&self, handle: WorkerHandle) -> Option<WorkerStatus> {
        self.state
            .lock()
            .records
            .get(&handle)
            .map(|r| r.status.clone())
    }

    /// Return value of a completed worker; `None` while running or after
    /// a failure.
    pub fn result(&self, handle: WorkerHandle) -> Option<Value> {
        self.state
            .lock()
            .records
            .get(&handle)
            .and_then(|r| r.result.clone())
    }

    pub fn lookup(&self, name: &str) -> Option<WorkerHandle> {
        self.state.lock().by_name.get(name).copied()
    }

    /// Number of workers ever registered.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Pool
// ============================================================================

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed number of threads draining one FIFO queue.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Start `size` threads (at least one) named `trellis-pool-N`.
    pub fn new(size: usize) -> Result<Self, RuntimeError> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut threads = Vec::with_capacity(size.max(1));
        for index in 0..size.max(1) {
            let receiver = receiver.clone();
            let thread = thread::Builder::new()
                .name(format!("trellis-pool-{index}"))
                .spawn(move || drain(&receiver))
                .map_err(|e| RuntimeError::Worker(format!("cannot start pool thread: {e}")))?;
            threads.push(thread);
        }
        debug!(size = threads.len(), "worker pool started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            threads: Mutex::new(threads),
        })
    }

    /// Queue a job. Fails once the pool is shut down.
    pub fn submit(&self, job: Job) -> Result<(), RuntimeError> {
        let sender = self.sender.lock();
        let sender = sender
            .as_ref()
            .ok_or_else(|| RuntimeError::Worker("pool is shut down".into()))?;
        sender
            .send(job)
            .map_err(|_| RuntimeError::Worker("pool threads have exited".into()))
    }

    /// Number of live pool threads.
    pub fn size(&self) -> usize {
        self.threads.lock().len()
    }

    /// Stop accepting jobs, let queued ones finish and join the threads.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        let current = thread::current().id();
        for thread in self.threads.lock().drain(..) {
            // A job may drop the last runtime reference from a pool thread.
            if thread.thread().id() != current {
                let _ = thread.join();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.size()).finish()
    }
}

fn drain(receiver: &Mutex<Receiver<Job>>) {
    loop {
        let job = receiver.lock().recv();
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}
