//! Cache keys for source files.

use std::fmt;
use std::path::{Path, PathBuf};

use xxhash_rust::xxh64::{Xxh64, xxh64};

/// Identifies one source file in the cache.
///
/// The hash is xxh64 over the canonical path bytes. Two paths hashing to the
/// same value share a cache entry; collisions are not detected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceIdentity {
    hash: u64,
    path: PathBuf,
}

impl SourceIdentity {
    /// Identity derived from the resolved path. Falls back to the path as
    /// given when it cannot be canonicalized.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let hash = xxh64(path.as_os_str().as_encoded_bytes(), 0);
        Self { hash, path }
    }

    /// Identity over the path and the source bytes, so an edited file maps to
    /// a different entry.
    pub fn for_content(path: impl AsRef<Path>, source: &[u8]) -> Self {
        let path_id = Self::for_path(path);
        let mut hasher = Xxh64::new(0);
        hasher.update(path_id.path.as_os_str().as_encoded_bytes());
        hasher.update(&[0]);
        hasher.update(source);
        Self {
            hash: hasher.digest(),
            path: path_id.path,
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<hash as 16 hex digits>.tbc`
    pub fn file_name(&self) -> String {
        format!("{:016x}.tbc", self.hash)
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x} ({})", self.hash, self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_same_hash() {
        let a = SourceIdentity::for_path("/no/such/dir/prog.tl");
        let b = SourceIdentity::for_path("/no/such/dir/prog.tl");
        assert_eq!(a, b);
        assert_eq!(a.file_name().len(), 16 + 4);
    }

    #[test]
    fn hash_is_order_sensitive() {
        let a = SourceIdentity::for_path("/x/ab");
        let b = SourceIdentity::for_path("/x/ba");
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn content_identity_tracks_edits() {
        let a = SourceIdentity::for_content("/x/p.tl", b"writeln(1)");
        let b = SourceIdentity::for_content("/x/p.tl", b"writeln(2)");
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.path(), b.path());
    }
}
