//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use hdftree::{NodeId, NodeKind, Tree};
use hdftree_fixtures::FileBuilder;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn write(dir: &Path, name: &str, fb: &FileBuilder) -> PathBuf {
    let path = dir.join(name);
    fb.write(&path).unwrap();
    path
}

/// One line per reachable path: kind, shape and attribute names. Shared
/// nodes are described once per path reaching them, cycles stop at the
/// first revisit.
pub fn describe(tree: &Tree) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = Vec::new();
    walk(tree, tree.root(), "/".to_string(), &mut stack, &mut out);
    out
}

fn walk(tree: &Tree, id: NodeId, path: String, stack: &mut Vec<NodeId>, out: &mut Vec<String>) {
    let node = tree.node(id).unwrap();
    let mut attrs: Vec<_> = node.attributes.iter().map(|a| a.name.clone()).collect();
    attrs.sort();
    let kind = match &node.kind {
        NodeKind::Group { .. } => "group".to_string(),
        NodeKind::Data(d) => format!("data {:?} {}", d.shape, d.dtype),
        NodeKind::Symbolic(s) => format!("symbolic {}", s.target_path),
    };
    out.push(format!("{path} {kind} {attrs:?}"));
    if stack.contains(&id) {
        return;
    }
    stack.push(id);
    for (name, child) in tree.children(id) {
        let child_path = if path == "/" {
            format!("/{name}")
        } else {
            format!("{path}/{name}")
        };
        walk(tree, child, child_path, stack, out);
    }
    stack.pop();
}
