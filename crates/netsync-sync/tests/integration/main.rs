//! Integration tests for netsync-sync
//!
//! Runs `SyncEngine` against `MemoryStorage` and a temporary local tree.

mod common;

mod test_directory_sync;
mod test_file_sync;
