//! Structural statistics over repository trees

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{TreeNode, walk};

/// Total number of file nodes.
pub fn count_files(nodes: &[TreeNode]) -> usize {
    walk(nodes).filter(|(_, node)| node.is_file()).count()
}

/// Total number of directory nodes. The implicit root is not counted.
pub fn count_directories(nodes: &[TreeNode]) -> usize {
    walk(nodes).filter(|(_, node)| node.is_directory()).count()
}

/// Deepest level reached by any node; top-level entries are depth 1, an empty tree is 0.
pub fn max_depth(nodes: &[TreeNode]) -> usize {
    walk(nodes).map(|(depth, _)| depth).max().unwrap_or(0)
}

/// Occurrences of each file extension (or `no_extension`).
pub fn file_type_histogram(nodes: &[TreeNode]) -> BTreeMap<String, usize> {
    let mut histogram = BTreeMap::new();
    for (_, node) in walk(nodes) {
        if let Some(extension) = node.extension() {
            *histogram.entry(extension.to_string()).or_insert(0) += 1;
        }
    }
    histogram
}

/// Aggregate statistics derived from a repository tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureSummary {
    pub file_count: usize,
    pub directory_count: usize,
    pub max_depth: usize,
    pub file_types: BTreeMap<String, usize>,
}

impl StructureSummary {
    /// Computes every statistic in one pass over `nodes`.
    pub fn from_nodes(nodes: &[TreeNode]) -> Self {
        let mut summary = StructureSummary {
            file_count: 0,
            directory_count: 0,
            max_depth: 0,
            file_types: BTreeMap::new(),
        };

        for (depth, node) in walk(nodes) {
            summary.max_depth = summary.max_depth.max(depth);
            match node {
                TreeNode::File { extension, .. } => {
                    summary.file_count += 1;
                    *summary.file_types.entry(extension.clone()).or_insert(0) += 1;
                }
                TreeNode::Directory { .. } => summary.directory_count += 1,
            }
        }

        summary
    }
}
