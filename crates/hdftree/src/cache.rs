//! LRU cache of opened trees.
//!
//! Entries are keyed by canonical path, modification time and whether
//! attributes were loaded, so a file rewritten on disk is opened afresh.
//! Eviction drops the least recently used tree; the tree itself closes once
//! the last outstanding `Arc` is gone.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::tree::{Tree, TreeLoader};

/// Default number of cached trees.
pub const DEFAULT_TREE_CACHE_ENTRIES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
    pub load_attributes: bool,
}

impl CacheKey {
    /// Key for `path` as it currently exists on disk.
    pub fn for_path(path: &Path, load_attributes: bool) -> Result<CacheKey> {
        let canonical = path
            .canonicalize()
            .map_err(|_| Error::FileNotFound(path.to_path_buf()))?;
        let modified = std::fs::metadata(&canonical)?.modified().ok();
        Ok(CacheKey {
            path: canonical,
            modified,
            load_attributes,
        })
    }
}

struct CacheEntry {
    tree: Arc<Tree>,
    /// Monotonic access counter for LRU.
    last_access: u64,
}

struct CacheInner {
    entries: HashMap<CacheKey, CacheEntry>,
    capacity: usize,
    tick: u64,
    hits: u64,
    misses: u64,
}

/// Fixed-capacity LRU cache of trees, injected where trees are opened.
pub struct TreeCache {
    inner: Mutex<CacheInner>,
}

impl Default for TreeCache {
    fn default() -> Self {
        Self::new(DEFAULT_TREE_CACHE_ENTRIES)
    }
}

impl TreeCache {
    /// A cache holding at most `capacity` trees (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                capacity: capacity.max(1),
                tick: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Tree>> {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        let found = inner.entries.get_mut(key).map(|entry| {
            entry.last_access = tick;
            Arc::clone(&entry.tree)
        });
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    /// Insert or replace `key`, evicting the least recently used entries
    /// beyond capacity.
    pub fn insert(&self, key: CacheKey, tree: Arc<Tree>) {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        inner.entries.remove(&key);
        while inner.entries.len() >= inner.capacity {
            let Some(lru) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            inner.entries.remove(&lru);
            debug!(path = %lru.path.display(), "tree evicted from cache");
        }
        inner.entries.insert(
            key,
            CacheEntry {
                tree,
                last_access: tick,
            },
        );
    }

    /// Cached tree for `path`, or a fresh synchronous open through `loader`.
    pub fn get_or_open(&self, loader: &TreeLoader, path: impl AsRef<Path>) -> Result<Arc<Tree>> {
        let key = CacheKey::for_path(path.as_ref(), loader.options().load_attributes)?;
        if let Some(tree) = self.get(&key) {
            return Ok(tree);
        }
        let tree = Arc::new(loader.open(&key.path)?);
        self.insert(key, Arc::clone(&tree));
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.hits, inner.misses)
    }
}

impl std::fmt::Debug for TreeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TreeCache")
            .field("entries", &inner.entries.len())
            .field("capacity", &inner.capacity)
            .finish()
    }
}
