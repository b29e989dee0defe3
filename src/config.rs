//! Runtime configuration assembled from defaults and the environment.

use std::env;

use trellis_cache::{CacheConfig, CacheMode};
use trellis_compiler::FrontendPolicy;
use trellis_vm::VmConfig;

/// Everything a [`Context`](crate::Context) needs to compile and run.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub cache: CacheConfig,
    pub vm: VmConfig,
    pub frontend: FrontendPolicy,
}

impl Config {
    /// Defaults overridden by the environment:
    ///
    /// - `TRELLIS_CACHE_DIR`: cache directory
    /// - `TRELLIS_NO_CACHE`: disable the bytecode cache
    /// - `TRELLIS_STRICT_VM`: newer cached bytecode is an error
    /// - `TRELLIS_POOL_SIZE`: worker pool threads
    pub fn from_env() -> Self {
        let mut vm = VmConfig::default();
        if let Some(size) = env_usize("TRELLIS_POOL_SIZE").filter(|&n| n > 0) {
            vm.pool_size = size;
        }
        Self {
            cache: CacheConfig::from_env(),
            vm,
            frontend: FrontendPolicy::default(),
        }
    }

    pub fn without_cache(mut self) -> Self {
        self.cache.mode = CacheMode::Disabled;
        self
    }

    pub fn with_frontend(mut self, frontend: FrontendPolicy) -> Self {
        self.frontend = frontend;
        self
    }
}

fn env_usize(name: &str) -> Option<usize> {
    env::var(name).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_cache_disables_only_the_cache() {
        let config = Config::default().without_cache();
        assert_eq!(config.cache.mode, CacheMode::Disabled);
        assert_eq!(config.vm, VmConfig::default());
    }

    #[test]
    fn frontend_can_be_swapped() {
        let config = Config::default().with_frontend(FrontendPolicy::pascal());
        assert!(config.frontend.loop_variable_persists);
    }
}
