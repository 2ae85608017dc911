//! Retry executor with exponential backoff
//!
//! [`execute`] runs an async operation until it succeeds, fails with a
//! non-retryable error, or exhausts [`RetryPolicy::max_attempts`]. A policy is
//! built per call site and holds no state between calls.
//!
//! ## Backoff
//!
//! The delay before retry `n` (1-based) is `min(max_delay, base_delay * 2^(n-1))`,
//! drawn uniformly from `[0, delay]` when jitter is enabled. A policy given a
//! cancellation token stops sleeping as soon as the token fires.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use netsync_core::context::RetrySettings;

type RetryablePredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type BeforeAttemptHook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;
type OnRetryHook<E> = Arc<dyn Fn(&E, u32, Duration) + Send + Sync>;
type CancelledError<E> = Arc<dyn Fn() -> E + Send + Sync>;

// ============================================================================
// RetryPolicy
// ============================================================================

/// How an operation is retried
pub struct RetryPolicy<E> {
    /// Total attempts including the first; 0 is treated as 1
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    is_retryable: RetryablePredicate<E>,
    before_attempt: Option<BeforeAttemptHook>,
    on_retry: Option<OnRetryHook<E>>,
    cancel: Option<(CancellationToken, CancelledError<E>)>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            jitter: self.jitter,
            is_retryable: Arc::clone(&self.is_retryable),
            before_attempt: self.before_attempt.clone(),
            on_retry: self.on_retry.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("before_attempt", &self.before_attempt.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl<E> RetryPolicy<E> {
    /// Creates a policy; every error is considered retryable until
    /// [`RetryPolicy::retry_if`] says otherwise.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter: false,
            is_retryable: Arc::new(|_| true),
            before_attempt: None,
            on_retry: None,
            cancel: None,
        }
    }

    /// Creates a policy from client context settings
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(settings.max_attempts, settings.base_delay, settings.max_delay)
            .with_jitter(settings.jitter)
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the error classifier
    pub fn retry_if(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.is_retryable = Arc::new(predicate);
        self
    }

    /// Sets a hook awaited before every attempt, including the first
    pub fn before_attempt<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.before_attempt = Some(Arc::new(move || Box::pin(hook()) as BoxFuture<'static, ()>));
        self
    }

    /// Sets a hook invoked with `(error, attempt, delay)` before each backoff sleep
    pub fn on_retry(mut self, hook: impl Fn(&E, u32, Duration) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Interrupts backoff sleeps when `token` is cancelled; the call then
    /// fails with `on_cancel()`
    pub fn cancel_on(
        mut self,
        token: CancellationToken,
        on_cancel: impl Fn() -> E + Send + Sync + 'static,
    ) -> Self {
        self.cancel = Some((token, Arc::new(on_cancel)));
        self
    }

    /// Whether `err` should be retried under this policy
    pub fn is_retryable(&self, err: &E) -> bool {
        (self.is_retryable)(err)
    }

    /// Effective attempt budget
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Un-jittered delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        if self.jitter {
            jittered(delay)
        } else {
            delay
        }
    }
}

fn jittered(delay: Duration) -> Duration {
    let max_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

// ============================================================================
// execute
// ============================================================================

/// Executes `operation` under `policy`
///
/// Non-retryable errors propagate immediately. When every attempt fails,
/// the last error is returned. Cancellation during a backoff sleep returns
/// the policy's cancellation error.
pub async fn execute<T, E, F, Fut>(policy: &RetryPolicy<E>, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        if let Some(hook) = &policy.before_attempt {
            hook().await;
        }

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= attempts || !policy.is_retryable(&err) {
                    debug!(attempt, attempts, error = %err, "Giving up");
                    return Err(err);
                }

                let delay = policy.next_delay(attempt);
                warn!(
                    attempt,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retryable error, backing off"
                );
                if let Some(hook) = &policy.on_retry {
                    hook(&err, attempt, delay);
                }
                match &policy.cancel {
                    Some((token, on_cancel)) => {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => {
                                debug!(attempt, "Cancelled during backoff");
                                return Err(on_cancel());
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => tokio::time::sleep(delay).await,
                }
                attempt += 1;
            }
        }
    }
}
