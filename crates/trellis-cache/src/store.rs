//! Disk-backed cache with an in-memory layer.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use trellis_compiler::CompiledUnit;
use trellis_core::CacheError;
use tracing::{debug, warn};

use crate::codec;
use crate::identity::SourceIdentity;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Enabled,
    /// Both lookup and store are skipped.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub mode: CacheMode,
    /// Treat entries from a newer bytecode version as errors rather than misses.
    pub strict_version: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            mode: CacheMode::Enabled,
            strict_version: false,
        }
    }
}

impl CacheConfig {
    /// Defaults overridden by `TRELLIS_CACHE_DIR`, `TRELLIS_NO_CACHE` and
    /// `TRELLIS_STRICT_VM`. The flag variables count when set and non-empty.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if env_flag("TRELLIS_NO_CACHE") {
            config.mode = CacheMode::Disabled;
        }
        config.strict_version = env_flag("TRELLIS_STRICT_VM");
        config
    }
}

fn env_flag(name: &str) -> bool {
    env::var_os(name).is_some_and(|v| !v.is_empty())
}

/// `$TRELLIS_CACHE_DIR`, else `$HOME/.trellis_cache`, else the temp dir.
pub fn default_cache_dir() -> PathBuf {
    if let Some(dir) = env::var_os("TRELLIS_CACHE_DIR").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    match env::var_os("HOME").filter(|v| !v.is_empty()) {
        Some(home) => PathBuf::from(home).join(".trellis_cache"),
        None => env::temp_dir().join("trellis_cache"),
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Compiled units keyed by [`SourceIdentity`].
///
/// Entries are published whole: disk writes go through a temp file and a
/// rename, and the memory layer swaps complete `Arc`s.
#[derive(Debug)]
pub struct BytecodeCache {
    config: CacheConfig,
    memory: RwLock<FxHashMap<u64, Arc<CompiledUnit>>>,
}

impl BytecodeCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            memory: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.mode == CacheMode::Enabled
    }

    pub fn entry_path(&self, identity: &SourceIdentity) -> PathBuf {
        self.config.dir.join(identity.file_name())
    }

    /// Fetch a fresh entry.
    ///
    /// An entry is fresh when its file is strictly newer, in whole seconds,
    /// than the source and every dependency. Stale, missing and malformed
    /// entries are misses. With `strict_version`, an entry written by a newer
    /// bytecode version is an error.
    pub fn lookup(
        &self,
        identity: &SourceIdentity,
        dependencies: &[PathBuf],
    ) -> Result<Option<Arc<CompiledUnit>>, CacheError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let path = self.entry_path(identity);
        if !is_fresh(&path, identity.path(), dependencies) {
            debug!(source = %identity, "bytecode cache miss (stale or absent)");
            self.memory.write().remove(&identity.hash());
            return Ok(None);
        }

        if let Some(unit) = self.memory.read().get(&identity.hash()) {
            debug!(source = %identity, "bytecode cache hit (memory)");
            return Ok(Some(unit.clone()));
        }

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(source = %identity, %err, "bytecode cache miss (unreadable)");
                return Ok(None);
            }
        };
        match codec::decode(&bytes) {
            Ok(unit) => {
                debug!(source = %identity, bytes = bytes.len(), "bytecode cache hit (disk)");
                let unit = Arc::new(unit);
                self.memory.write().insert(identity.hash(), unit.clone());
                Ok(Some(unit))
            }
            Err(err @ CacheError::UnsupportedVersion { .. }) => {
                if self.config.strict_version {
                    return Err(err);
                }
                warn!(source = %identity, %err, "ignoring cached bytecode");
                Ok(None)
            }
            Err(err) => {
                debug!(source = %identity, %err, "bytecode cache miss (malformed)");
                Ok(None)
            }
        }
    }

    /// Write an entry and publish it to the memory layer.
    pub fn store(&self, identity: &SourceIdentity, unit: &CompiledUnit) -> Result<(), CacheError> {
        if !self.is_enabled() {
            return Ok(());
        }
        fs::create_dir_all(&self.config.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.config.dir)?;
        {
            let mut writer = io::BufWriter::new(tmp.as_file_mut());
            codec::write_to(unit, &mut writer)?;
            writer.flush()?;
        }
        let path = self.entry_path(identity);
        tmp.persist(&path).map_err(|e| CacheError::Io(e.error))?;
        self.memory
            .write()
            .insert(identity.hash(), Arc::new(unit.clone()));
        debug!(source = %identity, path = %path.display(), "stored bytecode");
        Ok(())
    }

    /// Drop an entry from both layers.
    pub fn invalidate(&self, identity: &SourceIdentity) -> Result<(), CacheError> {
        self.memory.write().remove(&identity.hash());
        match fs::remove_file(self.entry_path(identity)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    pub fn memory_len(&self) -> usize {
        self.memory.read().len()
    }
}

fn mtime_secs(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        modified
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
    )
}

fn is_fresh(entry: &Path, source: &Path, dependencies: &[PathBuf]) -> bool {
    let Some(entry_time) = mtime_secs(entry) else {
        return false;
    };
    std::iter::once(source)
        .chain(dependencies.iter().map(PathBuf::as_path))
        .all(|dep| mtime_secs(dep).is_some_and(|t| entry_time > t))
}

/// Push a file's modification time into the past. Used by tests that need
/// an entry to be strictly newer than its source.
#[cfg(test)]
pub(crate) fn age_file(path: &Path, secs: u64) {
    let when = std::time::SystemTime::now() - std::time::Duration::from_secs(secs);
    fs::File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(when))
        .unwrap();
}
