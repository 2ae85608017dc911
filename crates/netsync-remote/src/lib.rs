//! netsync Remote - Resilient access to path-addressed remote storage
//!
//! Provides:
//! - A retry executor with exponential backoff and jitter
//! - Per-operation-class adaptive rate limiting
//! - [`RemoteClient`], which layers retry, rate limiting, timeouts and
//!   cancellation over any [`netsync_core::ports::IRemoteStorage`] adapter
//! - [`MemoryStorage`], an in-process adapter for tests and dry models
//!
//! ## Modules
//!
//! - [`retry`] - Retry policy and executor
//! - [`rate_limit`] - Token buckets keyed by operation class
//! - [`client`] - The resilient client
//! - [`memory`] - In-memory storage adapter

pub mod client;
pub mod memory;
pub mod rate_limit;
pub mod retry;

pub use client::RemoteClient;
pub use memory::MemoryStorage;
pub use rate_limit::{OpClass, RateLimiter};
pub use retry::RetryPolicy;
