//! Tree representation for repository directory structures
//!
//! A repository tree is a sequence of top-level [`TreeNode`]s. The repository
//! root itself is never materialized. Directories own their children in the
//! order the provider listed them.
//!
//! Every traversal in this crate goes through [`walk`], a pre-order depth-first
//! iterator driven by an explicit stack, so arbitrarily deep repositories do
//! not exhaust the call stack and all statistics agree on one visiting order.

mod builder;
mod stats;

pub use builder::{NodeId, TreeBuildError, TreeBuilder};
pub use stats::{
    StructureSummary, count_directories, count_files, file_type_histogram, max_depth,
};

use serde::{Deserialize, Serialize};

/// Histogram key for files without a discernible suffix
pub const NO_EXTENSION: &str = "no_extension";

/// Entry in a repository directory tree
///
/// Serialized with a `type` tag so persisted records read
/// `{"type": "directory", "name": ..., "path": ..., "contents": [...]}` and
/// `{"type": "file", "name": ..., "path": ..., "extension": ...}`.
///
/// Dropping a tree is iterative. `Clone`, `PartialEq` and serialization still
/// recurse once per directory level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    /// A directory and the entries it owns
    Directory {
        name: String,
        path: String,
        contents: Vec<TreeNode>,
    },
    /// A file with its lower-cased extension or [`NO_EXTENSION`]
    File {
        name: String,
        path: String,
        extension: String,
    },
}

impl TreeNode {
    /// Creates a file node from its full path.
    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = last_segment(&path).to_string();
        let extension = file_extension(&name);
        TreeNode::File {
            name,
            path,
            extension,
        }
    }

    /// Creates a directory node from its full path and children.
    pub fn directory(path: impl Into<String>, contents: Vec<TreeNode>) -> Self {
        let path = path.into();
        let name = last_segment(&path).to_string();
        TreeNode::Directory {
            name,
            path,
            contents,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TreeNode::Directory { name, .. } | TreeNode::File { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            TreeNode::Directory { path, .. } | TreeNode::File { path, .. } => path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, TreeNode::File { .. })
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, TreeNode::Directory { .. })
    }

    /// Children of a directory; empty for files.
    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::Directory { contents, .. } => contents,
            TreeNode::File { .. } => &[],
        }
    }

    /// Extension of a file node, `None` for directories.
    pub fn extension(&self) -> Option<&str> {
        match self {
            TreeNode::File { extension, .. } => Some(extension),
            TreeNode::Directory { .. } => None,
        }
    }
}

impl Drop for TreeNode {
    fn drop(&mut self) {
        let TreeNode::Directory { contents, .. } = self else {
            return;
        };
        let mut pending = std::mem::take(contents);
        while let Some(mut node) = pending.pop() {
            if let TreeNode::Directory { contents, .. } = &mut node {
                pending.append(contents);
            }
        }
    }
}

/// Derives the histogram key for a file name.
///
/// The key is the lower-cased suffix starting at the final `.`. Names with no
/// `.` after their first character (`README`, `.gitignore`) map to
/// [`NO_EXTENSION`].
///
/// ```
/// use repotree::tree::{file_extension, NO_EXTENSION};
///
/// assert_eq!(file_extension("main.PY"), ".py");
/// assert_eq!(file_extension("archive.tar.gz"), ".gz");
/// assert_eq!(file_extension("README"), NO_EXTENSION);
/// assert_eq!(file_extension(".gitignore"), NO_EXTENSION);
/// ```
pub fn file_extension(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx..].to_lowercase(),
        _ => NO_EXTENSION.to_string(),
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Pre-order depth-first iterator over a node sequence.
///
/// Yields `(depth, node)` pairs where top-level entries have depth 1.
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<(usize, std::slice::Iter<'a, TreeNode>)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (depth, siblings) = self.stack.last_mut()?;
            let depth = *depth;
            match siblings.next() {
                Some(node) => {
                    if let TreeNode::Directory { contents, .. } = node {
                        self.stack.push((depth + 1, contents.iter()));
                    }
                    return Some((depth, node));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Walks `nodes` in the canonical depth-first order.
pub fn walk(nodes: &[TreeNode]) -> Walk<'_> {
    Walk {
        stack: vec![(1, nodes.iter())],
    }
}
