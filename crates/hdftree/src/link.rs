//! Link resolution inside one file and across files.
//!
//! Soft links are followed through the group tables of a single
//! [`FileHandle`]. External and mount links name another file, resolved
//! relative to the directory of the file holding the link.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use hdftree_format::link_message::LinkTarget;
use hdftree_io::FileHandle;

use crate::error::{Error, Result};

/// Target of a legacy mount attribute (`scheme://file#/path`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountTarget {
    pub file: String,
    pub path: String,
}

/// Parse a mount attribute value; only `scheme` is accepted.
///
/// A missing fragment mounts the root of the target file.
pub fn parse_mount(value: &str, scheme: &str) -> Result<MountTarget> {
    let bad = |reason: String| Error::LinkUnresolved {
        path: value.to_string(),
        reason,
    };
    let (found, rest) = value
        .split_once("://")
        .ok_or_else(|| bad("mount value has no scheme".to_string()))?;
    if found != scheme {
        return Err(bad(format!("unsupported mount scheme {found:?}")));
    }
    let (file, path) = match rest.split_once('#') {
        Some((file, path)) => (file, if path.is_empty() { "/" } else { path }),
        None => (rest, "/"),
    };
    if file.is_empty() {
        return Err(bad("mount value names no file".to_string()));
    }
    Ok(MountTarget {
        file: file.to_string(),
        path: path.to_string(),
    })
}

/// Locate `target` relative to the directory of `referencing`.
pub fn resolve_target_file(referencing: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    match referencing.parent() {
        Some(dir) => dir.join(target),
        None => target.to_path_buf(),
    }
}

/// Address of the object at `path` inside `file`.
///
/// Relative paths start at the group at `relative_to`. Soft links met along
/// the way are followed without a hop limit; a soft link reached again while
/// it is still being resolved is a cycle and reported as unresolved. `.` and
/// `..` components are honoured. External links inside a path are not
/// followed.
pub fn resolve_in_file(file: &FileHandle, path: &str, relative_to: u64) -> Result<u64> {
    walk(file, path, relative_to, &mut HashSet::new())
}

/// `resolving` holds the soft links, as (group address, member name),
/// whose targets are being walked.
fn walk(
    file: &FileHandle,
    path: &str,
    relative_to: u64,
    resolving: &mut HashSet<(u64, String)>,
) -> Result<u64> {
    let unresolved = |reason: String| Error::LinkUnresolved {
        path: path.to_string(),
        reason,
    };
    let mut stack = if path.starts_with('/') {
        vec![file.root_address()]
    } else {
        vec![relative_to]
    };

    for name in path.split('/').filter(|c| !c.is_empty()) {
        let here = stack.last().copied().unwrap_or_else(|| file.root_address());
        match name {
            "." => continue,
            ".." => {
                if stack.len() > 1 {
                    stack.pop();
                }
                continue;
            }
            _ => {}
        }
        let next = match file.member(here, name)? {
            Some(LinkTarget::Hard { address }) => address,
            Some(LinkTarget::Soft { path: target }) => {
                let key = (here, name.to_string());
                if !resolving.insert(key.clone()) {
                    return Err(unresolved(format!("soft link {name} -> {target} forms a cycle")));
                }
                let found = walk(file, &target, here, resolving);
                resolving.remove(&key);
                found?
            }
            Some(LinkTarget::External { file: ext, path: target }) => {
                return Err(unresolved(format!(
                    "component {name} is an external link to {ext}:{target}"
                )));
            }
            None => return Err(unresolved(format!("no member {name}"))),
        };
        stack.push(next);
    }
    Ok(stack.last().copied().unwrap_or_else(|| file.root_address()))
}
