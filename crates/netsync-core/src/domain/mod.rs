//! Domain entities and business vocabulary
//!
//! This module contains the core domain types for netsync:
//! - Validated remote paths
//! - Remote and local tree entries
//! - Sync enums, events and results
//! - Domain-specific error types

pub mod entry;
pub mod errors;
pub mod newtypes;
pub mod sync;

// Re-export commonly used types
pub use entry::{FileKind, FileMeta, LocalEntry, RemoteEntry};
pub use errors::{DomainError, RemoteError};
pub use newtypes::RemotePath;
pub use sync::{
    CompareStrategy, ConflictAction, ConflictResolution, DeleteEvent, DeleteScope, Direction,
    EntryOutcome, Side, SkipEvent, SkipReason, SyncResult, TransferDirection, TransferEvent,
};
