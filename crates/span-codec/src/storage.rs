//! Storage naming interface.
//!
//! The codec never opens cached bytes. It only needs to rename a storage unit
//! inside its parent directory and to ask for its size. Keeping those two
//! calls behind [`SpanStorage`] lets the span logic run against
//! [`MemoryStorage`] in tests.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Rename and size primitives over the cache's storage units.
///
/// `rename` must be atomic for concurrent directory readers: either the old
/// name or the new one is visible, never both and never neither.
pub trait SpanStorage: Send + Sync {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn len(&self, path: &Path) -> io::Result<u64>;
    fn exists(&self, path: &Path) -> io::Result<bool>;
}

/// Local filesystem storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl SpanStorage for FsStorage {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }
}

/// In-memory storage: a map of path to size.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<PathBuf, u64>>,
    fail_renames: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a storage unit of `len` bytes.
    pub fn insert(&self, path: impl Into<PathBuf>, len: u64) {
        self.files().insert(path.into(), len);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }

    /// All stored paths in sorted order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files().keys().cloned().collect()
    }

    /// Make every subsequent rename fail with `PermissionDenied`.
    pub fn set_fail_renames(&self, fail: bool) {
        self.fail_renames.store(fail, Ordering::SeqCst);
    }

    fn files(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, u64>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SpanStorage for MemoryStorage {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.fail_renames.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "rename disabled"));
        }

        let mut files = self.files();
        let len = files
            .remove(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, from.display().to_string()))?;
        files.insert(to.to_path_buf(), len);
        Ok(())
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        self.files()
            .get(path)
            .copied()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.contains(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_storage_rename_and_len() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("a");
        let to = temp_dir.path().join("b");
        fs::write(&from, vec![0u8; 42]).unwrap();

        FsStorage.rename(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(FsStorage.len(&to).unwrap(), 42);
        assert!(FsStorage.exists(&to).unwrap());
        assert!(!FsStorage.exists(&from).unwrap());
    }

    #[test]
    fn test_fs_storage_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        assert!(FsStorage.len(&missing).is_err());
        assert!(FsStorage.rename(&missing, &temp_dir.path().join("x")).is_err());
    }

    #[test]
    fn test_memory_storage_rename_moves_entry() {
        let storage = MemoryStorage::new();
        storage.insert("/c/a", 7);

        storage.rename(Path::new("/c/a"), Path::new("/c/b")).unwrap();

        assert!(!storage.contains(Path::new("/c/a")));
        assert_eq!(storage.len(Path::new("/c/b")).unwrap(), 7);
        assert_eq!(storage.paths(), vec![PathBuf::from("/c/b")]);
    }

    #[test]
    fn test_memory_storage_injected_failure() {
        let storage = MemoryStorage::new();
        storage.insert("/c/a", 7);
        storage.set_fail_renames(true);

        let err = storage.rename(Path::new("/c/a"), Path::new("/c/b")).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(storage.contains(Path::new("/c/a")));
    }
}
