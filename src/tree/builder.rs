//! Flat-to-nested tree construction
//!
//! Providers list a tree as flat `(path, kind)` entries. [`TreeBuilder`] turns
//! that listing into owned [`TreeNode`]s in a single pass: every node lives in
//! an arena indexed by its full path, and directories record the ids of their
//! children in listing order. A parent always receives a smaller id than its
//! children, which lets [`TreeBuilder::build`] assemble the owned tree by
//! walking the arena backwards without recursion.

use std::collections::HashMap;

use thiserror::Error;

use super::TreeNode;

/// Handle to a node inside a [`TreeBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Inconsistent flat listing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeBuildError {
    #[error("tree entry has an empty path")]
    EmptyPath,

    #[error("'{path}' is listed both as a file and as a directory")]
    KindConflict { path: String },

    #[error("'{path}' is nested below file '{file}'")]
    NestedUnderFile { path: String, file: String },
}

#[derive(Debug)]
enum PendingKind {
    File,
    Directory { children: Vec<NodeId> },
}

#[derive(Debug)]
struct PendingNode {
    path: String,
    kind: PendingKind,
}

/// Path-keyed builder for repository trees
#[derive(Debug, Default)]
pub struct TreeBuilder {
    arena: Vec<PendingNode>,
    index: HashMap<String, NodeId>,
    roots: Vec<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct nodes recorded so far, implicit parents included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Records a file entry.
    pub fn insert_file(&mut self, path: &str) -> Result<NodeId, TreeBuildError> {
        self.insert(path, false)
    }

    /// Records a directory entry.
    ///
    /// A directory already created implicitly by one of its descendants is
    /// reused, keeping its position among its siblings.
    pub fn insert_directory(&mut self, path: &str) -> Result<NodeId, TreeBuildError> {
        self.insert(path, true)
    }

    /// Full path of a recorded node.
    pub fn path(&self, id: NodeId) -> &str {
        &self.arena[id.0].path
    }

    /// Number of direct children recorded for a node (0 for files).
    pub fn child_count(&self, id: NodeId) -> usize {
        match &self.arena[id.0].kind {
            PendingKind::Directory { children } => children.len(),
            PendingKind::File => 0,
        }
    }

    fn insert(&mut self, path: &str, is_dir: bool) -> Result<NodeId, TreeBuildError> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Err(TreeBuildError::EmptyPath);
        }

        if let Some(&id) = self.index.get(path) {
            return match (&self.arena[id.0].kind, is_dir) {
                (PendingKind::Directory { .. }, true) | (PendingKind::File, false) => {
                    tracing::trace!("Entry '{}' already recorded", path);
                    Ok(id)
                }
                _ => Err(TreeBuildError::KindConflict {
                    path: path.to_string(),
                }),
            };
        }

        let parent = self.ensure_parent(path)?;
        let kind = if is_dir {
            PendingKind::Directory {
                children: Vec::new(),
            }
        } else {
            PendingKind::File
        };
        let id = self.push(path.to_string(), kind);
        self.attach(parent, id);
        Ok(id)
    }

    /// Returns the parent directory of `path`, creating missing ancestors top-down.
    fn ensure_parent(&mut self, path: &str) -> Result<Option<NodeId>, TreeBuildError> {
        let Some((parent_path, _)) = path.rsplit_once('/') else {
            return Ok(None);
        };

        let mut missing = Vec::new();
        let mut anchor = None;
        let mut cursor = parent_path;
        loop {
            if let Some(&id) = self.index.get(cursor) {
                anchor = Some(id);
                break;
            }
            missing.push(cursor);
            match cursor.rsplit_once('/') {
                Some((up, _)) => cursor = up,
                None => break,
            }
        }

        if let Some(id) = anchor {
            if matches!(self.arena[id.0].kind, PendingKind::File) {
                return Err(TreeBuildError::NestedUnderFile {
                    path: path.to_string(),
                    file: self.arena[id.0].path.clone(),
                });
            }
        }

        let mut parent = anchor;
        for dir_path in missing.into_iter().rev() {
            let id = self.push(
                dir_path.to_string(),
                PendingKind::Directory {
                    children: Vec::new(),
                },
            );
            self.attach(parent, id);
            parent = Some(id);
        }
        Ok(parent)
    }

    fn push(&mut self, path: String, kind: PendingKind) -> NodeId {
        let id = NodeId(self.arena.len());
        self.index.insert(path.clone(), id);
        self.arena.push(PendingNode { path, kind });
        id
    }

    fn attach(&mut self, parent: Option<NodeId>, child: NodeId) {
        match parent {
            Some(parent) => {
                if let PendingKind::Directory { children } = &mut self.arena[parent.0].kind {
                    children.push(child);
                }
            }
            None => self.roots.push(child),
        }
    }

    /// Consumes the builder and returns the top-level nodes.
    pub fn build(self) -> Vec<TreeNode> {
        let mut built: Vec<Option<TreeNode>> = Vec::with_capacity(self.arena.len());
        built.resize_with(self.arena.len(), || None);

        // Children always have larger ids than their parent.
        for (id, pending) in self.arena.into_iter().enumerate().rev() {
            let node = match pending.kind {
                PendingKind::File => TreeNode::file(pending.path),
                PendingKind::Directory { children } => {
                    let contents = children
                        .into_iter()
                        .filter_map(|child| built[child.0].take())
                        .collect();
                    TreeNode::directory(pending.path, contents)
                }
            };
            built[id] = Some(node);
        }

        self.roots
            .into_iter()
            .filter_map(|id| built[id.0].take())
            .collect()
    }
}
