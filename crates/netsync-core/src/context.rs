//! Client context shared by every remote call
//!
//! A [`ClientContext`] is built once (usually from [`Config`]) and handed to
//! the remote client behind an `Arc`. It never changes after construction;
//! callers that need different settings build a second context.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::config::{Config, RateLimitingConfig, RemoteConfig, RetryConfig};

/// Credentials and endpoint of the remote service
#[derive(Clone, Default)]
pub struct Credentials {
    pub host: String,
    pub key_name: String,
    pub key: String,
    pub cp_code: String,
}

impl Credentials {
    /// Whether a signing key is present
    pub fn has_key(&self) -> bool {
        !self.key.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("key_name", &self.key_name)
            .field("key", &if self.has_key() { "<redacted>" } else { "" })
            .field("cp_code", &self.cp_code)
            .finish()
    }
}

impl From<&RemoteConfig> for Credentials {
    fn from(cfg: &RemoteConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            key_name: cfg.key_name.clone(),
            key: cfg.key.clone(),
            cp_code: cfg.cp_code.clone(),
        }
    }
}

/// Retry settings applied to each remote primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetrySettings {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            jitter: cfg.jitter,
        }
    }
}

/// Token bucket settings, applied per operation class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSettings {
    pub capacity: u32,
    pub refill_per_second: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self::from(&RateLimitingConfig::default())
    }
}

impl From<&RateLimitingConfig> for RateLimitSettings {
    fn from(cfg: &RateLimitingConfig) -> Self {
        Self {
            capacity: cfg.capacity,
            refill_per_second: cfg.refill_per_second,
        }
    }
}

/// Immutable settings for one remote client
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub credentials: Credentials,
    /// Budget for a single attempt of a single call
    pub request_timeout: Duration,
    pub retry: RetrySettings,
    pub rate_limit: RateLimitSettings,
    /// Cancelling aborts every in-flight and future call made with this context
    pub cancel: CancellationToken,
    /// Parent span for remote call instrumentation
    pub span: Span,
}

impl ClientContext {
    /// Build a context from configuration with a fresh cancellation token
    pub fn from_config(config: &Config) -> Self {
        let credentials = Credentials::from(&config.remote);
        let span = tracing::info_span!(
            "netsync",
            host = %credentials.host,
            cp_code = %credentials.cp_code
        );
        Self {
            credentials,
            request_timeout: Duration::from_millis(config.remote.timeout_ms),
            retry: RetrySettings::from(&config.retry),
            rate_limit: RateLimitSettings::from(&config.rate_limiting),
            cancel: CancellationToken::new(),
            span,
        }
    }

    /// Replace the cancellation token, e.g. with a child of an application-wide token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the retry settings
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitSettings) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for ClientContext {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
