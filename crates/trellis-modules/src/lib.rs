//! Reference builtin categories for the trellis VM.
//!
//! - **math** - numeric functions (`abs`, `sqrt`, `min`, `max`, ...)
//! - **strings** - `length`, `upper`, `lower`, `substr`, `str`, ...
//! - **system** - `write`, `writeln`
//! - **thread** - worker spawning, pooling and waiting
//!
//! Each category is a function returning a [`Module`](trellis_registry::Module):
//!
//! ```ignore
//! let mut builder = BuiltinRegistry::builder();
//! builder.install(trellis_modules::math::module())?;
//! builder.install(trellis_modules::thread::module())?;
//! ```

pub mod math;
pub mod strings;
pub mod system;
pub mod thread;

mod args;

use trellis_registry::{BuiltinRegistry, RegistrationError};

/// A registry holding every reference category.
pub fn default_registry() -> Result<BuiltinRegistry, RegistrationError> {
    let mut builder = BuiltinRegistry::builder();
    builder
        .install(system::module())?
        .install(math::module())?
        .install(strings::module())?
        .install(thread::module())?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_lists_every_category() {
        let registry = default_registry().unwrap();
        let names: Vec<_> = registry.categories().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["system", "math", "strings", "thread"]);
        assert!(registry.lookup("WRITELN").is_some());
        assert!(registry.lookup("thread_spawn_named").is_some());
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use trellis_core::{RuntimeError, Value, WorkerHandle, WorkerStatus};
    use trellis_registry::BuiltinHost;

    /// A host with no output and no workers.
    pub struct NullHost;

    impl BuiltinHost for NullHost {
        fn write_output(&mut self, _: &str) {}

        fn spawn_named(&mut self, _: Value, _: &str, _: Vec<Value>) -> Result<WorkerHandle, RuntimeError> {
            Err(RuntimeError::Worker("no workers".into()))
        }

        fn pool_submit(&mut self, _: Value, _: &str, _: Vec<Value>) -> Result<WorkerHandle, RuntimeError> {
            Err(RuntimeError::Worker("no workers".into()))
        }

        fn wait(&mut self, handle: WorkerHandle) -> Result<WorkerStatus, RuntimeError> {
            Err(RuntimeError::Worker(format!("unknown worker {handle}")))
        }

        fn worker_status(&self, _: WorkerHandle) -> Option<WorkerStatus> {
            None
        }

        fn worker_result(&self, _: WorkerHandle) -> Option<Value> {
            None
        }

        fn lookup_worker(&self, _: &str) -> Option<WorkerHandle> {
            None
        }

        fn worker_count(&self) -> usize {
            0
        }

        fn spawn_builtin(&mut self, _: &str, _: Vec<Value>) -> Result<WorkerHandle, RuntimeError> {
            Err(RuntimeError::Worker("no workers".into()))
        }

        fn mutex_create(&mut self, _: bool) -> i64 {
            1
        }

        fn mutex_lock(&mut self, id: i64) -> Result<(), RuntimeError> {
            Err(RuntimeError::Mutex {
                id,
                problem: "does not exist",
            })
        }

        fn mutex_unlock(&mut self, id: i64) -> Result<(), RuntimeError> {
            self.mutex_lock(id)
        }

        fn mutex_destroy(&mut self, id: i64) -> Result<(), RuntimeError> {
            self.mutex_lock(id)
        }
    }
}
