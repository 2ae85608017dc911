//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync core depends on; their
//! implementations live in adapter crates or in the embedding application.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStorage`] - Primitive operations of the remote storage service
//! - [`ILocalFileSystem`] - Local stat, hashing, mkdir and delete
//! - [`ISyncEventSink`] - Observer for transfer/skip/delete events

pub mod events;
pub mod local_filesystem;
pub mod remote_storage;

pub use events::{ISyncEventSink, NoopEventSink};
pub use local_filesystem::{FileSystemState, ILocalFileSystem};
pub use remote_storage::{IRemoteStorage, ListResponse, OpStatus};
