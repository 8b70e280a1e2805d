//! Per-traversal deduplication of materialized objects.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::node::{NodeId, NodeKindTag};
use crate::token::ObjectToken;

/// Map from [`ObjectToken`] to the node built for it, plus the set of
/// external targets whose subtree is still being walked.
#[derive(Debug, Default)]
pub struct NodePool {
    entries: HashMap<ObjectToken, (NodeId, NodeKindTag)>,
    resolving: HashSet<ObjectToken>,
}

impl NodePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token: &ObjectToken) -> Option<(NodeId, NodeKindTag)> {
        self.entries.get(token).copied()
    }

    /// Return the pooled node for `token`, or build one with `factory`.
    ///
    /// A pooled node of a different kind is reported as corrupt.
    pub fn get_or_create<F>(&mut self, token: ObjectToken, kind: NodeKindTag, factory: F) -> Result<NodeId>
    where
        F: FnOnce() -> Result<NodeId>,
    {
        if let Some((id, existing)) = self.get(&token) {
            if existing != kind {
                return Err(Error::CorruptNode {
                    path: token.to_string(),
                    reason: format!("pooled as {existing:?}, requested as {kind:?}"),
                });
            }
            return Ok(id);
        }
        let id = factory()?;
        self.entries.insert(token, (id, kind));
        Ok(id)
    }

    /// Record `token` as another name for an already built node.
    pub fn insert(&mut self, token: ObjectToken, id: NodeId, kind: NodeKindTag) {
        self.entries.entry(token).or_insert((id, kind));
    }

    /// Mark `token` as being resolved.
    pub fn begin_resolving(&mut self, token: ObjectToken) {
        self.resolving.insert(token);
    }

    pub fn end_resolving(&mut self, token: &ObjectToken) {
        self.resolving.remove(token);
    }

    pub fn is_resolving(&self, token: &ObjectToken) -> bool {
        self.resolving.contains(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
