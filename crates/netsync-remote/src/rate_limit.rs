//! Rate limiting and adaptive throttling for remote storage calls
//!
//! Keeps request bursts within what the storage service tolerates before it
//! starts answering HTTP 429.
//!
//! ## Architecture
//!
//! - [`TokenBucket`]: token bucket for a single operation class
//! - [`RateLimiter`]: one bucket per [`OpClass`], with capacity that shrinks on
//!   throttle responses and recovers on sustained success
//!
//! The limiter is wired into the retry executor as its `before_attempt` hook,
//! so every attempt (including retries) consumes a token.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use netsync_core::context::RateLimitSettings;

/// Successes required before capacity recovers by one step
const RECOVERY_INTERVAL: u64 = 100;

/// Fraction of the current capacity restored per recovery step
const RECOVERY_FACTOR: f64 = 0.05;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// OpClass
// ============================================================================

/// Class of remote operation, each with its own bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    List,
    Metadata,
    Upload,
    Download,
    /// Deletes, mkdir, symlink and mtime updates
    Mutate,
}

impl OpClass {
    pub const ALL: [OpClass; 5] = [
        OpClass::List,
        OpClass::Metadata,
        OpClass::Upload,
        OpClass::Download,
        OpClass::Mutate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpClass::List => "list",
            OpClass::Metadata => "metadata",
            OpClass::Upload => "upload",
            OpClass::Download => "download",
            OpClass::Mutate => "mutate",
        }
    }
}

impl fmt::Display for OpClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TokenBucket
// ============================================================================

#[derive(Debug)]
struct BucketState {
    /// Fractional for smooth refill
    tokens: f64,
    last_refill: Instant,
    effective_capacity: u32,
    successes: u64,
}

/// Token bucket for one operation class.
///
/// Tokens are consumed per request and refilled at a constant rate, capped
/// at the effective capacity. The bucket starts full.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
                effective_capacity: capacity,
                successes: 0,
            }),
        }
    }

    fn refill(state: &mut BucketState, refill_rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens =
                (state.tokens + elapsed * refill_rate).min(f64::from(state.effective_capacity));
            state.last_refill = now;
        }
    }

    /// Takes one token if available
    pub fn try_acquire(&self) -> bool {
        let mut state = lock(&self.state);
        Self::refill(&mut state, self.refill_rate);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the next token is available (zero if one is available now)
    pub fn time_until_available(&self) -> Duration {
        let mut state = lock(&self.state);
        Self::refill(&mut state, self.refill_rate);

        if state.tokens >= 1.0 {
            Duration::ZERO
        } else if self.refill_rate > 0.0 {
            Duration::try_from_secs_f64((1.0 - state.tokens) / self.refill_rate)
                .unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        }
    }

    pub fn available_tokens(&self) -> f64 {
        let mut state = lock(&self.state);
        Self::refill(&mut state, self.refill_rate);
        state.tokens
    }

    /// Configured capacity
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Current capacity after throttle adjustments
    pub fn effective_capacity(&self) -> u32 {
        lock(&self.state).effective_capacity
    }

    /// Records a successful call.
    ///
    /// Every 100 consecutive successes the effective capacity grows by 5%
    /// (at least one token), up to the configured capacity.
    pub fn on_success(&self) {
        let mut state = lock(&self.state);
        state.successes += 1;

        if state.successes % RECOVERY_INTERVAL == 0 && state.effective_capacity < self.capacity {
            let old = state.effective_capacity;
            let step = ((f64::from(old) * RECOVERY_FACTOR) as u32).max(1);
            state.effective_capacity = (old + step).min(self.capacity);
            debug!(
                old_capacity = old,
                new_capacity = state.effective_capacity,
                successes = state.successes,
                "Recovering bucket capacity"
            );
        }
    }

    /// Records an HTTP 429: halves the effective capacity (minimum 1) and
    /// resets the success streak.
    pub fn on_throttle(&self) {
        let mut state = lock(&self.state);
        let old = state.effective_capacity;
        state.effective_capacity = (old / 2).max(1);
        state.tokens = state.tokens.min(f64::from(state.effective_capacity));
        state.successes = 0;
        warn!(
            old_capacity = old,
            new_capacity = state.effective_capacity,
            "Throttled by remote, halving bucket capacity"
        );
    }
}

// ============================================================================
// RateLimiter
// ============================================================================

/// Per-operation-class limiter, shared by `Arc` between client clones
#[derive(Debug)]
pub struct RateLimiter {
    buckets: HashMap<OpClass, TokenBucket>,
}

impl RateLimiter {
    /// Creates one bucket per operation class with the same settings
    pub fn new(settings: RateLimitSettings) -> Self {
        let buckets = OpClass::ALL
            .iter()
            .map(|op| {
                (
                    *op,
                    TokenBucket::new(settings.capacity, settings.refill_per_second),
                )
            })
            .collect();
        Self { buckets }
    }

    /// Bucket for `op`
    pub fn bucket(&self, op: OpClass) -> Option<&TokenBucket> {
        self.buckets.get(&op)
    }

    /// Waits until a token for `op` is available and takes it
    pub async fn acquire(&self, op: OpClass) {
        let Some(bucket) = self.bucket(op) else {
            return;
        };

        loop {
            if bucket.try_acquire() {
                return;
            }

            let wait = bucket
                .time_until_available()
                .clamp(Duration::from_millis(10), Duration::from_secs(60));
            debug!(op = %op, wait_ms = wait.as_millis() as u64, "Rate limited, waiting for token");
            tokio::time::sleep(wait).await;
        }
    }

    pub fn on_success(&self, op: OpClass) {
        if let Some(bucket) = self.bucket(op) {
            bucket.on_success();
        }
    }

    pub fn on_throttle(&self, op: OpClass) {
        if let Some(bucket) = self.bucket(op) {
            bucket.on_throttle();
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitSettings::default())
    }
}
