//! Shared test helpers for remote client integration tests

use std::sync::Arc;
use std::time::Duration;

use netsync_core::context::{ClientContext, RateLimitSettings, RetrySettings};
use netsync_core::domain::RemotePath;
use netsync_core::ports::IRemoteStorage;
use netsync_remote::{MemoryStorage, RemoteClient};

/// Retry settings matching the documented backoff example
pub fn test_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(800),
        jitter: false,
    }
}

/// Builds a client over `storage` with fast, deterministic settings
pub fn client_for(storage: &Arc<MemoryStorage>) -> RemoteClient {
    client_with(storage, ClientContext::default().with_retry(test_retry()))
}

pub fn client_with(storage: &Arc<MemoryStorage>, ctx: ClientContext) -> RemoteClient {
    RemoteClient::new(
        Arc::clone(storage) as Arc<dyn IRemoteStorage>,
        Arc::new(ctx),
    )
}

pub fn tight_rate_limit() -> RateLimitSettings {
    RateLimitSettings {
        capacity: 2,
        refill_per_second: 4.0,
    }
}

pub fn rp(path: &str) -> RemotePath {
    RemotePath::new(path).expect("valid remote path")
}
