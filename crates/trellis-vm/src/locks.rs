//! Program-level mutexes.
//!
//! `lock` and `unlock` arrive as separate builtin calls, so a held mutex
//! cannot be a guard living on the Rust stack. Each mutex instead records
//! its owning thread and hold count under a `parking_lot::Mutex`; blocked
//! lockers park on a condvar until the owner releases it. Every VM runs on
//! its own OS thread, so the thread id identifies the holder.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use tracing::trace;
use trellis_core::RuntimeError;

type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Default)]
struct Ownership {
    owner: Option<ThreadId>,
    holds: u32,
}

#[derive(Debug)]
struct ProgramMutex {
    /// Whether the owner may lock again without unlocking first.
    recursive: bool,
    state: Mutex<Ownership>,
    released: Condvar,
}

#[derive(Debug, Default)]
struct TableState {
    next: i64,
    mutexes: FxHashMap<i64, Arc<ProgramMutex>>,
}

/// Every mutex a program created, keyed by the id handed to the program.
#[derive(Debug, Default)]
pub struct MutexTable {
    state: Mutex<TableState>,
}

impl MutexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unlocked mutex and return its id.
    pub fn create(&self, recursive: bool) -> i64 {
        let mut state = self.state.lock();
        state.next += 1;
        let id = state.next;
        state.mutexes.insert(
            id,
            Arc::new(ProgramMutex {
                recursive,
                state: Mutex::new(Ownership::default()),
                released: Condvar::new(),
            }),
        );
        trace!(mutex = id, recursive, "mutex created");
        id
    }

    /// Block until the calling thread holds the mutex.
    ///
    /// Locking a plain mutex the caller already holds is an error rather
    /// than a deadlock.
    pub fn lock(&self, id: i64) -> Result<()> {
        let mutex = self.get(id)?;
        let me = thread::current().id();
        let mut state = mutex.state.lock();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.holds = 1;
                    return Ok(());
                }
                Some(owner) if owner == me => {
                    if !mutex.recursive {
                        return Err(RuntimeError::Mutex {
                            id,
                            problem: "is already held by this worker",
                        });
                    }
                    state.holds += 1;
                    return Ok(());
                }
                Some(_) => mutex.released.wait(&mut state),
            }
        }
    }

    /// Release one hold. The mutex becomes free when the last hold goes.
    pub fn unlock(&self, id: i64) -> Result<()> {
        let mutex = self.get(id)?;
        let mut state = mutex.state.lock();
        if state.owner != Some(thread::current().id()) {
            return Err(RuntimeError::Mutex {
                id,
                problem: "is not held by this worker",
            });
        }
        state.holds -= 1;
        if state.holds == 0 {
            state.owner = None;
            drop(state);
            mutex.released.notify_one();
        }
        Ok(())
    }

    /// Remove an unlocked mutex. Later use of the id is an error.
    pub fn destroy(&self, id: i64) -> Result<()> {
        let mut table = self.state.lock();
        let mutex = table.mutexes.get(&id).ok_or(RuntimeError::Mutex {
            id,
            problem: "does not exist",
        })?;
        if mutex.state.lock().owner.is_some() {
            return Err(RuntimeError::Mutex {
                id,
                problem: "is still locked",
            });
        }
        table.mutexes.remove(&id);
        trace!(mutex = id, "mutex destroyed");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.lock().mutexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, id: i64) -> Result<Arc<ProgramMutex>> {
        self.state
            .lock()
            .mutexes
            .get(&id)
            .cloned()
            .ok_or(RuntimeError::Mutex {
                id,
                problem: "does not exist",
            })
    }
}
