//! Remote storage port (driven/secondary port)
//!
//! This module defines the primitive operations of the path-addressed remote
//! storage service. Request signing, HTTP transport and response decoding
//! live in an adapter outside this workspace; the sync core only ever sees
//! typed results and classified [`RemoteError`]s.
//!
//! ## Design Notes
//!
//! - Uses `RemoteError` rather than `anyhow` so that callers can classify
//!   failures (retryable, not-found, cancelled) without string matching.
//! - Paths are [`RemotePath`]s, validated before they reach the adapter.
//! - Adapters should not retry internally; `netsync_remote::RemoteClient`
//!   wraps every call with the retry executor.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{FileMeta, RemoteError, RemotePath};

/// Status block returned by every mutating primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpStatus {
    /// Service status code (HTTP-style, 200 on success)
    pub code: u16,
}

impl OpStatus {
    pub const OK: OpStatus = OpStatus { code: 200 };

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// Result of a directory listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Direct children, in the order the service returned them
    pub directory_entries: Vec<FileMeta>,
}

/// Port trait for remote storage primitives
///
/// Every method either returns a typed result or a classified error. A
/// missing path is reported as [`RemoteError::NotFound`] by `list` and as
/// `Ok(None)` by `get_metadata`.
#[async_trait::async_trait]
pub trait IRemoteStorage: Send + Sync {
    /// Lists the direct children of a directory
    ///
    /// # Errors
    /// `NotFound` if the directory does not exist
    async fn list(&self, path: &RemotePath) -> Result<ListResponse, RemoteError>;

    /// Retrieves metadata for a single path, `None` when it does not exist
    async fn get_metadata(&self, path: &RemotePath) -> Result<Option<FileMeta>, RemoteError>;

    /// Uploads the full content of `local_path` to `remote_path`
    async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &RemotePath,
    ) -> Result<OpStatus, RemoteError>;

    /// Downloads the full content of `remote_path` into `local_path`
    async fn download_file(
        &self,
        remote_path: &RemotePath,
        local_path: &Path,
    ) -> Result<OpStatus, RemoteError>;

    /// Deletes a file or symlink
    async fn delete_file(&self, path: &RemotePath) -> Result<OpStatus, RemoteError>;

    /// Deletes an empty directory
    async fn delete_directory(&self, path: &RemotePath) -> Result<OpStatus, RemoteError>;

    /// Creates a single directory (its parent must exist)
    async fn make_directory(&self, path: &RemotePath) -> Result<OpStatus, RemoteError>;

    /// Creates a symlink at `link_path` pointing to `target`
    async fn create_symlink(
        &self,
        target: &str,
        link_path: &RemotePath,
    ) -> Result<OpStatus, RemoteError>;

    /// Sets the modification time of a path, in unix seconds
    async fn set_modification_time(
        &self,
        path: &RemotePath,
        unix_seconds: i64,
    ) -> Result<OpStatus, RemoteError>;
}
