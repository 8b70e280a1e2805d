//! Materialized trees and the loader that opens them.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use hdftree_io::FileHandleTable;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::array::Array;
use crate::error::{Error, Result};
use crate::gate::{LoadGate, LoadState};
use crate::lazy::LazySource;
use crate::materialize::{LoadWarning, Pending, Walker};
use crate::node::{Node, NodeGraph, NodeId, NodeKind};
use crate::options::LoadOptions;
use crate::slice::SliceSpec;
use crate::types::Attribute;

/// State shared between a [`Tree`] and its background loader.
pub(crate) struct TreeShared {
    pub path: PathBuf,
    pub host: String,
    pub graph: RwLock<NodeGraph>,
    pub gate: LoadGate,
    pub cancel: AtomicBool,
    pub warnings: Mutex<Vec<LoadWarning>>,
    /// Every path acquired from `table`, once per acquisition.
    pub acquired: Mutex<Vec<PathBuf>>,
    pub table: Arc<FileHandleTable>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl TreeShared {
    fn new(path: PathBuf, host: String, table: Arc<FileHandleTable>) -> Self {
        Self {
            path,
            host,
            graph: RwLock::new(NodeGraph::new()),
            gate: LoadGate::new(),
            cancel: AtomicBool::new(false),
            warnings: Mutex::new(Vec::new()),
            acquired: Mutex::new(Vec::new()),
            table,
            worker: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Cancel and join the loader, then release every acquired handle.
    /// Only the first call does anything.
    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.store(true, Ordering::Release);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!(path = %self.path.display(), "loader thread panicked");
            }
        }
        let acquired: Vec<PathBuf> = self.acquired.lock().drain(..).collect();
        for path in &acquired {
            self.table.release(path);
        }
        debug!(path = %self.path.display(), released = acquired.len(), "tree closed");
    }
}

/// A node tree materialized from one root file.
///
/// Dropping the tree closes it.
pub struct Tree {
    shared: Arc<TreeShared>,
    root: NodeId,
}

impl Tree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Canonical path of the root file.
    pub fn file_path(&self) -> &Path {
        &self.shared.path
    }

    pub fn host(&self) -> &str {
        &self.shared.host
    }

    /// Snapshot of the node `id`.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.shared.graph.read().get(id).cloned()
    }

    /// Id of the node at the slash-separated `path`.
    pub fn get(&self, path: &str) -> Option<NodeId> {
        self.shared.graph.read().lookup(self.root, path)
    }

    pub fn node_at(&self, path: &str) -> Option<Node> {
        let graph = self.shared.graph.read();
        graph.lookup(self.root, path).and_then(|id| graph.get(id).cloned())
    }

    pub fn children(&self, id: NodeId) -> Vec<(String, NodeId)> {
        self.shared.graph.read().children(id).to_vec()
    }

    pub fn attributes(&self, id: NodeId) -> Vec<Attribute> {
        self.shared
            .graph
            .read()
            .get(id)
            .map(|n| n.attributes.clone())
            .unwrap_or_default()
    }

    /// Lazy handle of the data node at `path`, if it has one.
    pub fn lazy_source(&self, path: &str) -> Option<Arc<dyn LazySource>> {
        self.node_at(path)?.as_data()?.lazy_source().cloned()
    }

    /// Read a slice of the data node at `path`.
    ///
    /// A path that names nothing in the tree is [`Error::NoSuchNode`]; one
    /// that ends at a placeholder for a broken link is
    /// [`Error::LinkUnresolved`].
    pub fn read_slice(&self, path: &str, spec: &SliceSpec) -> Result<Array> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let node = self
            .node_at(path)
            .ok_or_else(|| Error::NoSuchNode(path.to_string()))?;
        match &node.kind {
            NodeKind::Data(data) => data.read_slice(spec),
            NodeKind::Symbolic(sym) => Err(Error::LinkUnresolved {
                path: path.to_string(),
                reason: sym.reason.clone(),
            }),
            NodeKind::Group { .. } => Err(Error::Unsupported(format!("{path} is a group"))),
        }
    }

    pub fn node_count(&self) -> usize {
        self.shared.graph.read().len()
    }

    pub fn state(&self) -> LoadState {
        self.shared.gate.state()
    }

    /// True once every reachable object has been materialized.
    pub fn is_complete(&self) -> bool {
        self.state() == LoadState::Ready
    }

    pub fn warnings(&self) -> Vec<LoadWarning> {
        self.shared.warnings.lock().clone()
    }

    /// Block until `min_nodes` nodes exist or loading has ended.
    pub fn wait_for(&self, min_nodes: usize) -> Result<usize> {
        self.shared.gate.wait_for(min_nodes)
    }

    /// Block until loading has ended.
    pub fn wait_ready(&self) -> Result<()> {
        self.wait_for(usize::MAX).map(|_| ())
    }

    /// Ask the background loader to stop after the current node.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    pub fn close(&self) {
        self.shared.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("path", &self.shared.path)
            .field("host", &self.shared.host)
            .field("nodes", &self.node_count())
            .field("state", &self.state())
            .finish()
    }
}

/// Opens trees against a shared [`FileHandleTable`].
#[derive(Debug)]
pub struct TreeLoader {
    handles: Arc<FileHandleTable>,
    options: LoadOptions,
}

impl Default for TreeLoader {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

impl TreeLoader {
    pub fn new(options: LoadOptions) -> Self {
        let handles = Arc::new(FileHandleTable::new(options.read_mode));
        Self { handles, options }
    }

    /// Share `handles` with other loaders.
    pub fn with_handles(handles: Arc<FileHandleTable>, options: LoadOptions) -> Self {
        Self { handles, options }
    }

    pub fn handles(&self) -> &Arc<FileHandleTable> {
        &self.handles
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    fn prepare(&self, path: &Path) -> Result<(Arc<TreeShared>, Walker, NodeId, Vec<Pending>)> {
        let canonical = path
            .canonicalize()
            .map_err(|_| Error::FileNotFound(path.to_path_buf()))?;
        let file = self.handles.acquire(&canonical)?;
        let shared = Arc::new(TreeShared::new(
            canonical.clone(),
            self.options.host.clone(),
            Arc::clone(&self.handles),
        ));
        shared.acquired.lock().push(canonical);

        let mut walker = Walker::new(Arc::clone(&shared), self.options.clone());
        let mut pending = Vec::new();
        match walker.root(&file, &mut pending) {
            Ok(root) => Ok((shared, walker, root, pending)),
            Err(err) => {
                shared.shutdown();
                Err(err)
            }
        }
    }

    /// Materialize the whole tree on the calling thread.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Tree> {
        let (shared, mut walker, root, pending) = self.prepare(path.as_ref())?;
        walker.run_depth_first(pending);
        let count = shared.graph.read().len();
        shared.gate.finish(count, 0);
        info!(
            path = %shared.path.display(),
            nodes = count,
            warnings = shared.warnings.lock().len(),
            "tree materialized"
        );
        Ok(Tree { shared, root })
    }

    /// Build the root synchronously, then keep loading level by level on a
    /// background thread. Returns once `min_nodes` nodes exist or loading
    /// has ended; failures of the loader surface here or on later waits.
    pub fn open_async(&self, path: impl AsRef<Path>, min_nodes: usize) -> Result<Tree> {
        let (shared, mut walker, root, pending) = self.prepare(path.as_ref())?;
        shared.gate.publish(shared.graph.read().len(), 0);
        let tree = Tree {
            shared: Arc::clone(&shared),
            root,
        };

        let loader = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("hdftree-loader".to_string())
            .spawn(move || {
                let run = panic::catch_unwind(AssertUnwindSafe(|| {
                    walker.run_breadth_first(pending, min_nodes)
                }));
                if let Err(payload) = run {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    loader.gate.fail(Error::CorruptNode {
                        path: loader.path.display().to_string(),
                        reason: format!("loader panicked: {message}"),
                    });
                }
            })?;
        *shared.worker.lock() = Some(worker);

        tree.wait_for(min_nodes)?;
        Ok(tree)
    }

    /// Close `tree`, releasing its file handles.
    pub fn close(&self, tree: &Tree) {
        tree.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdftree_fixtures::FileBuilder;

    fn fixture(dir: &Path) -> PathBuf {
        let path = dir.join("scan.h5");
        let mut fb = FileBuilder::new();
        fb.dataset_f64("/entry/data/x", &[4], &[1.0, 2.0, 3.0, 4.0]);
        fb.dataset_str("/entry/title", "scan 1");
        fb.attr_str("/entry", "NX_class", "NXentry");
        fb.write(&path).unwrap();
        path
    }

    #[test]
    fn open_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TreeLoader::default();
        let tree = loader.open(fixture(dir.path())).unwrap();

        assert!(tree.is_complete());
        assert_eq!(tree.node_count(), 5);
        let entry = tree.get("/entry").unwrap();
        assert_eq!(
            tree.attributes(entry)[0].value.as_str(),
            Some("NXentry")
        );
        let names: Vec<_> = tree.children(entry).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["data", "title"]);

        let x = tree
            .read_slice("/entry/data/x", &SliceSpec::all().start(&[2]))
            .unwrap();
        assert_eq!(x.to_vec::<f64>().unwrap(), vec![3.0, 4.0]);
        assert!(tree.lazy_source("/entry/data/x").is_some());
        // scalars are read eagerly
        assert!(tree.lazy_source("/entry/title").is_none());
        let title = tree.read_slice("/entry/title", &SliceSpec::all()).unwrap();
        assert_eq!(title.strings().unwrap(), vec!["scan 1"]);
    }

    #[test]
    fn close_is_idempotent_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TreeLoader::default();
        let tree = loader.open(fixture(dir.path())).unwrap();
        assert_eq!(loader.handles().len(), 1);

        loader.close(&tree);
        tree.close();
        assert!(loader.handles().is_empty());
        assert!(matches!(
            tree.read_slice("/entry/data/x", &SliceSpec::all()),
            Err(Error::Closed)
        ));
        drop(tree);
        assert!(loader.handles().is_empty());
    }

    #[test]
    fn missing_root_file() {
        let loader = TreeLoader::default();
        assert!(matches!(
            loader.open("/definitely/not/here.h5"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn not_a_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.h5");
        std::fs::write(&path, vec![0u8; 256]).unwrap();
        let loader = TreeLoader::default();
        assert!(matches!(
            loader.open(&path),
            Err(Error::InvalidContainer { .. })
        ));
        assert!(loader.handles().is_empty());
    }

    #[test]
    fn group_and_missing_paths_are_not_readable() {
        let dir = tempfile::tempdir().unwrap();
        let tree = TreeLoader::default().open(fixture(dir.path())).unwrap();
        assert!(matches!(
            tree.read_slice("/entry", &SliceSpec::all()),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            tree.read_slice("/entry/none", &SliceSpec::all()),
            Err(Error::NoSuchNode(p)) if p == "/entry/none"
        ));
    }
}
