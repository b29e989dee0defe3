//! Stack virtual machine for trellis bytecode.
//!
//! ## Architecture
//!
//! - [`Runtime`] state shared by every thread running one unit: globals,
//!   program mutexes, the builtin registry, output and workers
//! - [`Vm`] one thread of execution with its own operand and frame stacks
//! - [`workers`] the worker table and the fixed-size pool
//!
//! ```ignore
//! let runtime = Runtime::new(unit, registry, VmConfig::default(), Output::Stdout);
//! let result = runtime.run_main()?;
//! ```

mod config;
mod frame;
mod host;
mod locks;
mod ops;
mod runtime;
mod vm;
pub mod workers;

pub use config::{DEFAULT_MAX_FRAMES, DEFAULT_POOL_SIZE, VmConfig};
pub use locks::MutexTable;
pub use runtime::{Output, Runtime};
pub use vm::{Unwind, Vm, VmState};
