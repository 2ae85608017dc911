//! Local filesystem port (driven/secondary port)
//!
//! This module defines the local filesystem operations the sync engine
//! needs beyond what the remote primitives already do (uploads read and
//! downloads write the local files themselves).
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - `get_state` never fails for a missing path; it reports `exists: false`.

use std::path::Path;

/// Snapshot of a local path's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemState {
    /// Whether the path exists on disk
    pub exists: bool,
    /// Whether this is a regular file
    pub is_file: bool,
    /// Whether this is a directory
    pub is_dir: bool,
    /// Size in bytes (0 for directories or non-existent paths)
    pub size: u64,
    /// Last modification time in unix milliseconds, if available
    pub modified_ms: Option<i64>,
}

impl FileSystemState {
    /// Returns a state representing a non-existent path
    pub fn not_found() -> Self {
        Self {
            exists: false,
            is_file: false,
            is_dir: false,
            size: 0,
            modified_ms: None,
        }
    }

    /// Returns true if the path exists and is a regular file
    pub fn is_regular_file(&self) -> bool {
        self.exists && self.is_file
    }

    /// Returns true if the path exists and is a directory
    pub fn is_directory(&self) -> bool {
        self.exists && self.is_dir
    }

    /// Modification time truncated to unix seconds
    pub fn modified_secs(&self) -> Option<i64> {
        self.modified_ms.map(|ms| ms.div_euclid(1000))
    }
}

/// Port trait for local filesystem operations
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Gets the current state of a file or directory
    ///
    /// Returns `FileSystemState::not_found()` if the path doesn't exist.
    async fn get_state(&self, path: &Path) -> anyhow::Result<FileSystemState>;

    /// Computes the lower-case hex MD5 digest of a file
    async fn compute_md5(&self, path: &Path) -> anyhow::Result<String>;

    /// Creates a directory and all parent directories as needed (`mkdir -p`)
    async fn create_dir_all(&self, path: &Path) -> anyhow::Result<()>;

    /// Removes a single file or symlink
    async fn remove_file(&self, path: &Path) -> anyhow::Result<()>;

    /// Removes a directory and everything below it
    async fn remove_dir_all(&self, path: &Path) -> anyhow::Result<()>;
}
