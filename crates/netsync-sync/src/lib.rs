//! netsync Sync - Tree traversal and two-way synchronization
//!
//! Provides:
//! - Lazy remote (breadth-first) and local tree walkers
//! - Depth buckets and per-directory size aggregation
//! - Per-entry compare strategies
//! - The sync engine: single-entry, single-file and directory sync with
//!   extraneous deletion and bounded concurrency
//!
//! ## Modules
//!
//! - [`remote_walker`] - Breadth-first walk of a remote tree
//! - [`local_walker`] - Recursive walk of a local tree
//! - [`aggregate`] - Depth buckets and directory sizes
//! - [`compare`] - Decides whether an entry needs a transfer
//! - [`engine`] - Sync orchestration
//! - [`filesystem`] - Local filesystem adapter (stat, MD5, mkdir, delete)

pub mod aggregate;
pub mod compare;
pub mod engine;
pub mod filesystem;
pub mod local_walker;
pub mod remote_walker;

use std::path::PathBuf;

use netsync_conflict::ConflictError;
use netsync_core::domain::{DomainError, RemoteError, RemotePath};
use thiserror::Error;

pub use engine::{EntryPair, SyncEngine, SyncOptions};

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote call failed after retries
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// An I/O error occurred while walking or reading local files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The two sides disagree on what kind of object a path is
    #[error("cannot sync {} with {remote}: {reason}", .local.display())]
    Ambiguity {
        local: PathBuf,
        remote: RemotePath,
        reason: String,
    },

    /// Invalid conflict rule or ignore pattern
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// A local filesystem adapter call failed
    #[error("local filesystem error: {0:#}")]
    Local(#[from] anyhow::Error),

    /// A relative path could not be mapped to a remote path
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A per-entry task was aborted before it could report
    #[error("sync task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
