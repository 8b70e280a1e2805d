//! Arena-backed node graph.
//!
//! Nodes live in a [`NodeGraph`] and refer to each other by [`NodeId`], so a
//! node reached through several links is stored once and shared.

use std::path::PathBuf;
use std::sync::Arc;

use crate::array::Array;
use crate::error::{Error, Result};
use crate::lazy::LazySource;
use crate::slice::SliceSpec;
use crate::token::ObjectToken;
use crate::types::{AttrValue, Attribute, DType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Payload of a data node.
#[derive(Debug, Clone)]
pub enum DataValue {
    /// Read at materialization time (scalars and tiny arrays).
    Eager(Array),
    Lazy(Arc<dyn LazySource>),
}

#[derive(Debug, Clone)]
pub struct DataNode {
    pub shape: Vec<usize>,
    /// `None` marks an unlimited axis.
    pub max_shape: Vec<Option<usize>>,
    pub chunk_shape: Option<Vec<usize>>,
    pub dtype: DType,
    pub value: DataValue,
}

impl DataNode {
    /// Build a data node, enforcing equal ranks of shape, max shape and
    /// chunk shape.
    pub fn new(
        shape: Vec<usize>,
        max_shape: Vec<Option<usize>>,
        chunk_shape: Option<Vec<usize>>,
        dtype: DType,
        value: DataValue,
    ) -> Result<DataNode> {
        if max_shape.len() != shape.len() {
            return Err(Error::ShapeMismatch {
                expected: shape,
                actual: max_shape.iter().map(|m| m.unwrap_or(usize::MAX)).collect(),
            });
        }
        if let Some(chunk) = &chunk_shape {
            if chunk.len() != shape.len() {
                return Err(Error::ShapeMismatch {
                    expected: shape,
                    actual: chunk.clone(),
                });
            }
        }
        Ok(DataNode {
            shape,
            max_shape,
            chunk_shape,
            dtype,
            value,
        })
    }

    pub fn is_readable(&self) -> bool {
        match &self.value {
            DataValue::Eager(_) => true,
            DataValue::Lazy(src) => src.is_readable(),
        }
    }

    pub fn read_slice(&self, spec: &SliceSpec) -> Result<Array> {
        match &self.value {
            DataValue::Eager(array) => array.slice(spec),
            DataValue::Lazy(src) => src.read_slice(spec),
        }
    }

    pub fn lazy_source(&self) -> Option<&Arc<dyn LazySource>> {
        match &self.value {
            DataValue::Lazy(src) => Some(src),
            DataValue::Eager(_) => None,
        }
    }
}

/// Placeholder for a target that was not materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicNode {
    pub target_file: Option<PathBuf>,
    pub target_path: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Named children in insertion order.
    Group { children: Vec<(String, NodeId)> },
    Data(DataNode),
    Symbolic(SymbolicNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKindTag {
    Group,
    Data,
    Symbolic,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub token: Option<ObjectToken>,
    pub attributes: Vec<Attribute>,
    pub kind: NodeKind,
}

impl Node {
    pub fn group(token: Option<ObjectToken>, attributes: Vec<Attribute>) -> Node {
        Node {
            token,
            attributes,
            kind: NodeKind::Group {
                children: Vec::new(),
            },
        }
    }

    pub fn symbolic(target_file: Option<PathBuf>, target_path: &str, reason: String) -> Node {
        Node {
            token: None,
            attributes: Vec::new(),
            kind: NodeKind::Symbolic(SymbolicNode {
                target_file,
                target_path: target_path.to_string(),
                reason,
            }),
        }
    }

    pub fn tag(&self) -> NodeKindTag {
        match self.kind {
            NodeKind::Group { .. } => NodeKindTag::Group,
            NodeKind::Data(_) => NodeKindTag::Data,
            NodeKind::Symbolic(_) => NodeKindTag::Symbolic,
        }
    }

    pub fn is_group(&self) -> bool {
        self.tag() == NodeKindTag::Group
    }

    pub fn as_data(&self) -> Option<&DataNode> {
        match &self.kind {
            NodeKind::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_symbolic(&self) -> Option<&SymbolicNode> {
        match &self.kind {
            NodeKind::Symbolic(s) => Some(s),
            _ => None,
        }
    }

    pub fn children(&self) -> &[(String, NodeId)] {
        match &self.kind {
            NodeKind::Group { children } => children,
            _ => &[],
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }
}

#[derive(Debug, Default)]
pub struct NodeGraph {
    nodes: Vec<Node>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append `child` under `name` to the group `parent`. An existing child
    /// of the same name is kept.
    pub fn attach(&mut self, parent: NodeId, name: &str, child: NodeId) -> Result<()> {
        match self.nodes.get_mut(parent.index()).map(|n| &mut n.kind) {
            Some(NodeKind::Group { children }) => {
                if !children.iter().any(|(n, _)| n == name) {
                    children.push((name.to_string(), child));
                }
                Ok(())
            }
            _ => Err(Error::CorruptNode {
                path: name.to_string(),
                reason: format!("parent {parent:?} is not a group"),
            }),
        }
    }

    pub fn children(&self, id: NodeId) -> &[(String, NodeId)] {
        match self.get(id) {
            Some(node) => node.children(),
            None => &[],
        }
    }

    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| *c)
    }

    /// Follow a slash-separated path from `root`.
    pub fn lookup(&self, root: NodeId, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|c| !c.is_empty())
            .try_fold(root, |at, name| self.child(at, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }
}
