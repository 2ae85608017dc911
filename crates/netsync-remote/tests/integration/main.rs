//! Integration tests for netsync-remote
//!
//! Drives `RemoteClient` against `MemoryStorage` and verifies retry,
//! rate limiting and cancellation behavior end to end.

mod common;

mod test_client_pipeline;
