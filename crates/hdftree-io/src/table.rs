use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{FileHandle, OpenError, ReadMode};

struct Entry {
    handle: Arc<FileHandle>,
    refs: usize,
}

/// Reference-counted registry of open files, keyed by canonical path.
///
/// `acquire` opens a file or bumps its count; `release` decrements and
/// drops the table's handle when the count reaches zero. All bookkeeping
/// happens under one lock, so concurrent acquire/release pairs on the same
/// path never open a file twice or close it early.
pub struct FileHandleTable {
    mode: ReadMode,
    next_id: AtomicU64,
    entries: Mutex<HashMap<PathBuf, Entry>>,
}

impl FileHandleTable {
    pub fn new(mode: ReadMode) -> Self {
        Self {
            mode,
            next_id: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn read_mode(&self) -> ReadMode {
        self.mode
    }

    /// Open `path`, or share the already open handle, incrementing its count.
    pub fn acquire(&self, path: &Path) -> Result<Arc<FileHandle>, OpenError> {
        let canonical = path
            .canonicalize()
            .map_err(|_| OpenError::NotFound(path.to_path_buf()))?;

        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(&canonical) {
            entry.refs += 1;
            debug!(path = %canonical.display(), refs = entry.refs, "file handle shared");
            return Ok(Arc::clone(&entry.handle));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(FileHandle::open(id, &canonical, self.mode)?);
        debug!(path = %canonical.display(), id, "file handle opened");
        entries.insert(
            canonical,
            Entry {
                handle: Arc::clone(&handle),
                refs: 1,
            },
        );
        Ok(handle)
    }

    /// Decrement the count for `path`; returns `true` when the entry closed.
    ///
    /// Releasing a path that is not open is a no-op returning `false`.
    pub fn release(&self, path: &Path) -> bool {
        let mut entries = self.entries.lock();
        let key = if entries.contains_key(path) {
            path.to_path_buf()
        } else {
            match path.canonicalize() {
                Ok(p) if entries.contains_key(&p) => p,
                _ => return false,
            }
        };

        let closed = match entries.get_mut(&key) {
            Some(entry) => {
                entry.refs -= 1;
                entry.refs == 0
            }
            None => false,
        };
        if closed {
            entries.remove(&key);
            debug!(path = %key.display(), "file handle closed");
        }
        closed
    }

    /// Current count for `path` (0 when not open).
    pub fn ref_count(&self, path: &Path) -> usize {
        let entries = self.entries.lock();
        if let Some(entry) = entries.get(path) {
            return entry.refs;
        }
        path.canonicalize()
            .ok()
            .and_then(|p| entries.get(&p).map(|e| e.refs))
            .unwrap_or(0)
    }

    /// Number of distinct open files.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn open_paths(&self) -> Vec<PathBuf> {
        self.entries.lock().keys().cloned().collect()
    }
}

impl Default for FileHandleTable {
    fn default() -> Self {
        Self::new(ReadMode::default())
    }
}

impl std::fmt::Debug for FileHandleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandleTable")
            .field("mode", &self.mode)
            .field("open", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdftree_fixtures::FileBuilder;

    fn fixture(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        FileBuilder::new().write(&path).unwrap();
        path
    }

    #[test]
    fn acquire_shares_and_release_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path(), "a.h5");
        let table = FileHandleTable::new(ReadMode::Buffered);

        let h1 = table.acquire(&path).unwrap();
        let h2 = table.acquire(&path).unwrap();
        assert!(Arc::ptr_eq(&h1, &h2));
        assert_eq!(table.ref_count(&path), 2);
        assert_eq!(table.len(), 1);

        assert!(!table.release(h1.path()));
        assert!(table.release(&path));
        assert!(table.is_empty());
        assert!(!table.release(&path));
    }

    #[test]
    fn reopen_gets_new_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path(), "a.h5");
        let table = FileHandleTable::default();
        let first = table.acquire(&path).unwrap().id();
        table.release(&path);
        let second = table.acquire(&path).unwrap().id();
        assert_ne!(first, second);
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let table = FileHandleTable::default();
        let err = table.acquire(&dir.path().join("missing.h5")).unwrap_err();
        assert!(matches!(err, OpenError::NotFound(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn invalid_container_not_registered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.h5");
        std::fs::write(&path, b"not an hdf5 file at all").unwrap();
        let table = FileHandleTable::default();
        assert!(matches!(
            table.acquire(&path),
            Err(OpenError::Format { .. })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn concurrent_acquire_release_balances() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path(), "shared.h5");
        let table = Arc::new(FileHandleTable::default());

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                let path = path.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let h = table.acquire(&path).unwrap();
                        table.release(h.path());
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert!(table.is_empty());
    }
}
