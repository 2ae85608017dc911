//! Depth buckets and directory size aggregation over a materialized walk

use std::collections::BTreeMap;

use netsync_core::domain::{RemoteEntry, RemotePath};

/// Entries of one depth, in walk order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthBucket {
    pub depth: usize,
    pub entries: Vec<RemoteEntry>,
}

/// Statistics derived from a remote walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSummary {
    /// Ascending by depth
    pub depth_buckets: Vec<DepthBucket>,
    /// Directory path to the total bytes of files below it. Contains the
    /// root and every directory seen, including empty ones.
    pub directory_sizes: BTreeMap<RemotePath, u64>,
    /// Total bytes below the root
    pub total_size: u64,
}

impl TreeSummary {
    /// Aggregated size of `dir`, if it was part of the walk
    pub fn size_of(&self, dir: &RemotePath) -> Option<u64> {
        self.directory_sizes.get(dir).copied()
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.depth_buckets.last().map(|b| b.depth)
    }

    pub fn entry_count(&self) -> usize {
        self.depth_buckets.iter().map(|b| b.entries.len()).sum()
    }
}

/// Buckets `entries` by depth and sums file sizes into every ancestor
/// directory up to and including `root`.
///
/// Directories and symlinks contribute 0 bytes, as do files of unknown size.
pub fn aggregate(root: &RemotePath, entries: &[RemoteEntry]) -> TreeSummary {
    let mut buckets: BTreeMap<usize, Vec<RemoteEntry>> = BTreeMap::new();
    let mut sizes: BTreeMap<RemotePath, u64> = BTreeMap::new();
    sizes.insert(root.clone(), 0);

    for entry in entries {
        buckets.entry(entry.depth).or_default().push(entry.clone());

        if entry.file.is_dir() {
            sizes.entry(entry.path.clone()).or_insert(0);
        }

        let size = entry.byte_size();
        let mut cursor = Some(entry.parent.clone());
        while let Some(dir) = cursor {
            *sizes.entry(dir.clone()).or_insert(0) += size;
            if &dir == root {
                break;
            }
            cursor = dir.parent();
        }
    }

    let total_size = sizes.get(root).copied().unwrap_or(0);
    TreeSummary {
        depth_buckets: buckets
            .into_iter()
            .map(|(depth, entries)| DepthBucket { depth, entries })
            .collect(),
        directory_sizes: sizes,
        total_size,
    }
}
