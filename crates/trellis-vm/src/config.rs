//! VM limits.

/// Default call-depth limit.
pub const DEFAULT_MAX_FRAMES: usize = 1024;

/// Default number of pool worker threads.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Limits applied to every VM of one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Frames a single VM may hold before raising a stack overflow.
    pub max_frames: usize,
    /// Threads in the fixed worker pool, started on first submission.
    pub pool_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}
