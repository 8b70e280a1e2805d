//! Tree materialization.
//!
//! A [`Walker`] turns the objects of one or more files into nodes of a
//! [`NodeGraph`](crate::node::NodeGraph). Synchronous loads walk depth first
//! on the caller's thread; asynchronous loads walk one breadth-first level at
//! a time on a background thread and publish progress through the tree's
//! [`LoadGate`](crate::gate::LoadGate).
//!
//! Problems with a single object never abort the walk: the object becomes a
//! symbolic placeholder and a [`LoadWarning`] is recorded.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use hdftree_format::attribute::AttributeMessage;
use hdftree_format::data_layout::DataLayout;
use hdftree_format::dataspace::UNLIMITED;
use hdftree_format::link_message::LinkTarget;
use hdftree_format::message_type::MessageType;
use hdftree_format::object_header::ObjectHeader;
use hdftree_format::FormatError;
use hdftree_io::FileHandle;
use tracing::{debug, info, warn};

use crate::array::{byte_len, element_count};
use crate::error::{Error, Result};
use crate::lazy::{DatasetMeta, DatasetSource, LazySource};
use crate::link::{parse_mount, resolve_in_file, resolve_target_file};
use crate::node::{DataNode, DataValue, Node, NodeId, NodeKind, NodeKindTag};
use crate::options::LoadOptions;
use crate::pool::NodePool;
use crate::token::ObjectToken;
use crate::tree::TreeShared;
use crate::types::{decode_attribute, Attribute};

/// Category of a recovered problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    Truncated,
    LinkUnresolved,
    LinkDepthExceeded,
    BadMount,
    CorruptNode,
    FileNotFound,
    Unsupported,
}

impl WarningKind {
    fn of(err: &Error) -> Self {
        match err {
            Error::LinkUnresolved { .. } => WarningKind::LinkUnresolved,
            Error::LinkDepthExceeded { .. } => WarningKind::LinkDepthExceeded,
            Error::FileNotFound(_) | Error::InvalidContainer { .. } => WarningKind::FileNotFound,
            Error::Unsupported(_) | Error::Format(FormatError::Unsupported(_)) => {
                WarningKind::Unsupported
            }
            _ => WarningKind::CorruptNode,
        }
    }
}

/// A problem recovered during materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// Tree path of the affected node.
    pub path: String,
    pub kind: WarningKind,
    pub message: String,
}

/// A group member waiting to be materialized.
#[derive(Debug)]
pub(crate) struct Pending {
    parent: NodeId,
    name: String,
    path: String,
    file: Arc<FileHandle>,
    /// Object header of the group holding the link, for relative soft links.
    group_address: u64,
    target: LinkTarget,
    /// External or mount hops taken to reach the holding group.
    depth: usize,
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

pub(crate) struct Walker {
    shared: Arc<TreeShared>,
    options: LoadOptions,
    pool: NodePool,
}

impl Walker {
    pub fn new(shared: Arc<TreeShared>, options: LoadOptions) -> Self {
        Self {
            shared,
            options,
            pool: NodePool::new(),
        }
    }

    /// Build the root group of `file`, queueing its members into `out`.
    pub fn root(&mut self, file: &Arc<FileHandle>, out: &mut Vec<Pending>) -> Result<NodeId> {
        let id = self.object(file, file.root_address(), 0, "/", out)?;
        let is_group = self.shared.graph.read().get(id).is_some_and(Node::is_group);
        if !is_group {
            return Err(Error::InvalidContainer {
                path: file.path().to_path_buf(),
                reason: "root object is not a group".to_string(),
            });
        }
        Ok(id)
    }

    /// Walk depth first until nothing is left.
    pub fn run_depth_first(&mut self, pending: Vec<Pending>) {
        let mut stack: Vec<Pending> = pending.into_iter().rev().collect();
        let mut out = Vec::new();
        while let Some(item) = stack.pop() {
            self.process(item, &mut out);
            stack.extend(out.drain(..).rev());
        }
    }

    /// Walk level by level, publishing after each one. Stops early when the
    /// tree's cancel flag is raised.
    pub fn run_breadth_first(&mut self, pending: Vec<Pending>, target: usize) {
        let mut level = pending;
        let mut depth = 1;
        while !level.is_empty() {
            let mut next = Vec::new();
            for item in level {
                if self.shared.cancel.load(Ordering::Acquire) {
                    debug!(path = %self.shared.path.display(), depth, "materialization cancelled");
                    self.shared.gate.cancelled();
                    return;
                }
                self.process(item, &mut next);
            }
            let count = self.shared.graph.read().len();
            self.shared.gate.publish(count, depth);
            debug!(depth, nodes = count, queued = next.len(), "level materialized");
            level = next;
            depth += 1;
        }
        let count = self.shared.graph.read().len();
        self.shared.gate.finish(count, target);
        info!(
            path = %self.shared.path.display(),
            nodes = count,
            warnings = self.shared.warnings.lock().len(),
            "tree materialized"
        );
    }

    fn process(&mut self, item: Pending, out: &mut Vec<Pending>) {
        let result = match &item.target {
            LinkTarget::Hard { address } => {
                self.object(&item.file, *address, item.depth, &item.path, out)
            }
            LinkTarget::Soft { path } => {
                resolve_in_file(&item.file, path, item.group_address)
                    .and_then(|address| self.object(&item.file, address, item.depth, &item.path, out))
            }
            LinkTarget::External { file, path } => {
                self.external(&item.file, file, path, item.depth, &item.path, out)
            }
        };
        let id = result.unwrap_or_else(|err| {
            let (target_file, target_path) = match &item.target {
                LinkTarget::Hard { address } => (None, format!("@{address:#x}")),
                LinkTarget::Soft { path } => (None, path.clone()),
                LinkTarget::External { file, path } => {
                    (Some(resolve_target_file(item.file.path(), file)), path.clone())
                }
            };
            self.placeholder(&item.path, target_file.as_deref(), &target_path, &err, WarningKind::of(&err))
        });
        let attached = self.shared.graph.write().attach(item.parent, &item.name, id);
        if let Err(err) = attached {
            self.warn(&item.path, WarningKind::CorruptNode, err.to_string());
        }
    }

    fn warn(&self, path: &str, kind: WarningKind, message: String) {
        warn!(path, ?kind, "{message}");
        self.shared.warnings.lock().push(LoadWarning {
            path: path.to_string(),
            kind,
            message,
        });
    }

    fn placeholder(
        &self,
        path: &str,
        target_file: Option<&Path>,
        target_path: &str,
        err: &Error,
        kind: WarningKind,
    ) -> NodeId {
        let reason = err.to_string();
        self.warn(path, kind, reason.clone());
        self.shared.graph.write().add(Node::symbolic(
            target_file.map(Path::to_path_buf),
            target_path,
            reason,
        ))
    }

    fn attributes(&self, file: &FileHandle, hdr: &ObjectHeader, path: &str) -> Vec<Attribute> {
        let mut out = Vec::new();
        for msg in hdr.all(MessageType::Attribute) {
            match AttributeMessage::parse(&msg.data, file.length_size()) {
                Ok(msg) => {
                    if self.options.load_attributes || msg.name == self.options.mount_attribute {
                        out.push(decode_attribute(&msg));
                    }
                }
                Err(err) => self.warn(path, WarningKind::CorruptNode, format!("attribute skipped: {err}")),
            }
        }
        out
    }

    /// Materialize the object whose header is at `address`, reusing the
    /// pooled node when it was seen before.
    fn object(
        &mut self,
        file: &Arc<FileHandle>,
        address: u64,
        depth: usize,
        path: &str,
        out: &mut Vec<Pending>,
    ) -> Result<NodeId> {
        let token = ObjectToken::native(file.id(), address);
        if let Some((id, _)) = self.pool.get(&token) {
            return Ok(id);
        }
        let hdr = file.object_header(address)?;
        let attributes = self.attributes(file, &hdr, path);

        if let Some(mount) = attributes.iter().find(|a| a.name == self.options.mount_attribute) {
            let value = mount.value.as_str().unwrap_or_default().to_string();
            let id = self.mount(file, &value, depth, path, out);
            let tag = self.shared.graph.read().get(id).map_or(NodeKindTag::Symbolic, Node::tag);
            if tag != NodeKindTag::Symbolic {
                self.pool.insert(token, id, tag);
            }
            return Ok(id);
        }

        if hdr.is_group() {
            let mut links = file.links(address)?;
            if links.len() > self.options.max_group_members {
                self.warn(
                    path,
                    WarningKind::Truncated,
                    format!(
                        "group has {} members, keeping the first {}",
                        links.len(),
                        self.options.max_group_members
                    ),
                );
                links.truncate(self.options.max_group_members);
            }
            let id = self.pool.get_or_create(token, NodeKindTag::Group, || {
                Ok(self.shared.graph.write().add(Node::group(Some(token), attributes)))
            })?;
            out.extend(links.into_iter().map(|link| Pending {
                parent: id,
                path: join_path(path, &link.name),
                name: link.name,
                file: Arc::clone(file),
                group_address: address,
                target: link.target,
                depth,
            }));
            return Ok(id);
        }

        if hdr.is_dataset() {
            let meta = DatasetMeta::from_header(&hdr, file.offset_size(), file.length_size())?;
            let data = self.data_node(file, address, meta)?;
            return self.pool.get_or_create(token, NodeKindTag::Data, || {
                Ok(self.shared.graph.write().add(Node {
                    token: Some(token),
                    attributes,
                    kind: NodeKind::Data(data),
                }))
            });
        }

        Err(Error::CorruptNode {
            path: path.to_string(),
            reason: "object is neither a group nor a dataset".to_string(),
        })
    }

    fn data_node(&self, file: &Arc<FileHandle>, address: u64, meta: DatasetMeta) -> Result<DataNode> {
        let shape = meta.shape();
        let max_shape = match &meta.dataspace.max_dimensions {
            Some(max) => max
                .iter()
                .map(|&m| (m != UNLIMITED).then_some(m as usize))
                .collect(),
            None => shape.iter().map(|&d| Some(d)).collect(),
        };
        let chunk_shape = match &meta.layout {
            DataLayout::Chunked { chunk_dims, .. } => {
                Some(chunk_dims.iter().map(|&d| d as usize).collect())
            }
            _ => None,
        };

        let source = DatasetSource::from_meta(Arc::clone(file), address, meta);
        let dtype = source.dtype();
        // payload size must fit in usize
        byte_len(&shape, dtype.size())?;
        let elements = element_count(&shape).unwrap_or(usize::MAX);
        let value = if elements <= self.options.eager_max_elements && source.is_readable() {
            DataValue::Eager(source.read()?)
        } else {
            DataValue::Lazy(Arc::new(source))
        };
        DataNode::new(shape, max_shape, chunk_shape, dtype, value)
    }

    /// Follow a legacy mount attribute. Failures become placeholders.
    fn mount(
        &mut self,
        file: &Arc<FileHandle>,
        value: &str,
        depth: usize,
        path: &str,
        out: &mut Vec<Pending>,
    ) -> NodeId {
        let target = match parse_mount(value, &self.options.mount_scheme) {
            Ok(target) => target,
            Err(err) => return self.placeholder(path, None, value, &err, WarningKind::BadMount),
        };
        match self.external(file, &target.file, &target.path, depth, path, out) {
            Ok(id) => id,
            Err(err) => {
                let target_file = resolve_target_file(file.path(), &target.file);
                self.placeholder(path, Some(&target_file), &target.path, &err, WarningKind::of(&err))
            }
        }
    }

    /// Materialize `target_path` inside the file `target_file`, named
    /// relative to the file `from`.
    fn external(
        &mut self,
        from: &Arc<FileHandle>,
        target_file: &str,
        target_path: &str,
        depth: usize,
        path: &str,
        out: &mut Vec<Pending>,
    ) -> Result<NodeId> {
        if depth >= self.options.max_link_depth {
            return Err(Error::LinkDepthExceeded {
                path: path.to_string(),
                depth: depth + 1,
            });
        }
        let target = resolve_target_file(from.path(), target_file);
        let canonical = target
            .canonicalize()
            .map_err(|_| Error::FileNotFound(target.clone()))?;
        let token = ObjectToken::external(&canonical, target_path);
        if let Some((id, _)) = self.pool.get(&token) {
            return Ok(id);
        }
        if self.pool.is_resolving(&token) {
            return Err(Error::LinkUnresolved {
                path: path.to_string(),
                reason: format!("cycle through {}:{target_path}", canonical.display()),
            });
        }
        self.pool.begin_resolving(token);
        let result = self.enter(&canonical, target_path, depth + 1, path, out);
        self.pool.end_resolving(&token);

        let id = result?;
        let tag = self.shared.graph.read().get(id).map_or(NodeKindTag::Symbolic, Node::tag);
        if tag != NodeKindTag::Symbolic {
            self.pool.insert(token, id, tag);
        }
        Ok(id)
    }

    fn enter(
        &mut self,
        canonical: &Path,
        target_path: &str,
        depth: usize,
        path: &str,
        out: &mut Vec<Pending>,
    ) -> Result<NodeId> {
        let handle = self.shared.table.acquire(canonical)?;
        self.shared.acquired.lock().push(canonical.to_path_buf());
        debug!(file = %canonical.display(), target_path, depth, "entering external file");
        let address = resolve_in_file(&handle, target_path, handle.root_address())?;
        self.object(&handle, address, depth, path, out)
    }
}
