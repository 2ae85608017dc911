//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Streaming MD5**: digests are computed in fixed-size chunks so large
//!   files are never read into memory at once. The hex encoding matches the
//!   digests the remote service reports.
//! - **Missing paths are not errors**: `get_state` reports `exists: false`.

use std::io::ErrorKind;
use std::path::Path;
use std::time::UNIX_EPOCH;

use anyhow::Context;
use md5::{Digest, Md5};
use netsync_core::ports::local_filesystem::{FileSystemState, ILocalFileSystem};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

/// Read buffer for checksum computation
const HASH_CHUNK_SIZE: usize = 64 * 1024;

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// Zero-sized: every operation takes absolute paths, the sync roots live
/// in the engine.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn get_state(&self, path: &Path) -> anyhow::Result<FileSystemState> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("path not found");
                return Ok(FileSystemState::not_found());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stat {}", path.display()))
            }
        };

        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|st| st.duration_since(UNIX_EPOCH).ok())
            .and_then(|dur| i64::try_from(dur.as_millis()).ok());

        let state = FileSystemState {
            exists: true,
            is_file: metadata.is_file(),
            is_dir: metadata.is_dir(),
            size: if metadata.is_file() { metadata.len() } else { 0 },
            modified_ms,
        };
        debug!(is_file = state.is_file, size = state.size, "state retrieved");
        Ok(state)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn compute_md5(&self, path: &Path) -> anyhow::Result<String> {
        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {} for hashing", path.display()))?;

        let mut hasher = Md5::new();
        let mut buf = vec![0u8; HASH_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        let digest = hex::encode(hasher.finalize());
        debug!(md5 = %digest, "checksum computed");
        Ok(digest)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create_dir_all(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create directory {}", path.display()))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove_file(&self, path: &Path) -> anyhow::Result<()> {
        debug!("removing file");
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("Failed to remove {}", path.display()))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove_dir_all(&self, path: &Path) -> anyhow::Result<()> {
        debug!("removing directory recursively");
        tokio::fs::remove_dir_all(path)
            .await
            .with_context(|| format!("Failed to remove directory {}", path.display()))
    }
}

// ============================================================================
// Unit tests
// ============================================================================
