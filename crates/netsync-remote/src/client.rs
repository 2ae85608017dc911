//! Resilient remote storage client
//!
//! [`RemoteClient`] wraps a raw [`IRemoteStorage`] adapter and applies, per call:
//!
//! 1. **Input validation**: malformed requests fail with
//!    [`RemoteError::Validation`] before anything reaches the adapter.
//! 2. **Rate limiting**: a token for the call's [`OpClass`] is taken before
//!    every attempt.
//! 3. **Timeout and cancellation**: each attempt races the context's
//!    cancellation token and the per-call timeout.
//! 4. **Retry**: retryable failures (transient, timeout, 429, 5xx) are retried
//!    with exponential backoff from the context's retry settings. Backoff
//!    sleeps also end when the cancellation token fires.
//!
//! The client is cheap to clone; clones share the adapter, context and limiter.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, Instrument};

use netsync_core::context::ClientContext;
use netsync_core::domain::{FileMeta, RemoteError, RemotePath};
use netsync_core::ports::{IRemoteStorage, ListResponse, OpStatus};

use crate::rate_limit::{OpClass, RateLimiter};
use crate::retry::{self, RetryPolicy};

/// Remote storage client with retry, rate limiting, timeout and cancellation
#[derive(Clone)]
pub struct RemoteClient {
    storage: Arc<dyn IRemoteStorage>,
    context: Arc<ClientContext>,
    limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl RemoteClient {
    /// Creates a client with a fresh rate limiter built from the context
    pub fn new(storage: Arc<dyn IRemoteStorage>, context: Arc<ClientContext>) -> Self {
        let limiter = Arc::new(RateLimiter::new(context.rate_limit));
        Self {
            storage,
            context,
            limiter,
        }
    }

    /// Shares an existing limiter, e.g. between clients talking to the same host
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn storage(&self) -> &Arc<dyn IRemoteStorage> {
        &self.storage
    }

    // ========================================================================
    // Call pipeline
    // ========================================================================

    fn policy(&self, op: OpClass) -> RetryPolicy<RemoteError> {
        let acquire_limiter = Arc::clone(&self.limiter);
        let throttle_limiter = Arc::clone(&self.limiter);

        RetryPolicy::from_settings(&self.context.retry)
            .retry_if(RemoteError::is_retryable)
            .cancel_on(self.context.cancel.clone(), || RemoteError::Cancelled)
            .before_attempt(move || {
                let limiter = Arc::clone(&acquire_limiter);
                async move { limiter.acquire(op).await }
            })
            .on_retry(move |err, _, _| {
                if err.is_throttle() {
                    throttle_limiter.on_throttle(op);
                }
            })
    }

    /// Runs one primitive through the retry pipeline
    async fn call<T, F, Fut>(
        &self,
        op: OpClass,
        name: &'static str,
        path: &RemotePath,
        f: F,
    ) -> Result<T, RemoteError>
    where
        F: Fn(Arc<dyn IRemoteStorage>) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let span = tracing::debug_span!(parent: &self.context.span, "remote", op = name, path = %path);
        let policy = self.policy(op);
        let cancel = &self.context.cancel;
        let timeout = self.context.request_timeout;

        let result = retry::execute(&policy, || {
            let attempt = f(Arc::clone(&self.storage));
            async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RemoteError::Cancelled),
                    outcome = tokio::time::timeout(timeout, attempt) => match outcome {
                        Ok(result) => result,
                        Err(_) => Err(RemoteError::Timeout {
                            ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        }),
                    },
                }
            }
        })
        .instrument(span)
        .await;

        match &result {
            Ok(_) => self.limiter.on_success(op),
            Err(err) => debug!(op = name, path = %path, error = %err, "Remote call failed"),
        }
        result
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    /// Lists the direct children of `path`
    pub async fn list(&self, path: &RemotePath) -> Result<ListResponse, RemoteError> {
        self.call(OpClass::List, "list", path, |s| async move { s.list(path).await })
            .await
    }

    /// Metadata for `path`, `None` when it does not exist
    pub async fn get_metadata(&self, path: &RemotePath) -> Result<Option<FileMeta>, RemoteError> {
        self.call(OpClass::Metadata, "stat", path, |s| async move {
            s.get_metadata(path).await
        })
        .await
    }

    pub async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &RemotePath,
    ) -> Result<OpStatus, RemoteError> {
        if local_path.as_os_str().is_empty() {
            return Err(RemoteError::Validation("local path is empty".into()));
        }
        self.call(OpClass::Upload, "upload", remote_path, |s| async move {
            s.upload_file(local_path, remote_path).await
        })
        .await
    }

    pub async fn download_file(
        &self,
        remote_path: &RemotePath,
        local_path: &Path,
    ) -> Result<OpStatus, RemoteError> {
        if local_path.as_os_str().is_empty() {
            return Err(RemoteError::Validation("local path is empty".into()));
        }
        self.call(OpClass::Download, "download", remote_path, |s| async move {
            s.download_file(remote_path, local_path).await
        })
        .await
    }

    pub async fn delete_file(&self, path: &RemotePath) -> Result<OpStatus, RemoteError> {
        Self::reject_root(path, "delete")?;
        self.call(OpClass::Mutate, "delete", path, |s| async move {
            s.delete_file(path).await
        })
        .await
    }

    pub async fn delete_directory(&self, path: &RemotePath) -> Result<OpStatus, RemoteError> {
        Self::reject_root(path, "rmdir")?;
        self.call(OpClass::Mutate, "rmdir", path, |s| async move {
            s.delete_directory(path).await
        })
        .await
    }

    pub async fn make_directory(&self, path: &RemotePath) -> Result<OpStatus, RemoteError> {
        Self::reject_root(path, "mkdir")?;
        self.call(OpClass::Mutate, "mkdir", path, |s| async move {
            s.make_directory(path).await
        })
        .await
    }

    pub async fn create_symlink(
        &self,
        target: &str,
        link_path: &RemotePath,
    ) -> Result<OpStatus, RemoteError> {
        if target.is_empty() {
            return Err(RemoteError::Validation("symlink target is empty".into()));
        }
        self.call(OpClass::Mutate, "symlink", link_path, |s| async move {
            s.create_symlink(target, link_path).await
        })
        .await
    }

    /// Sets the modification time of `path` in unix seconds
    pub async fn set_modification_time(
        &self,
        path: &RemotePath,
        unix_seconds: i64,
    ) -> Result<OpStatus, RemoteError> {
        if unix_seconds < 0 {
            return Err(RemoteError::Validation(format!(
                "modification time must not be negative: {unix_seconds}"
            )));
        }
        self.call(OpClass::Mutate, "mtime", path, |s| async move {
            s.set_modification_time(path, unix_seconds).await
        })
        .await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Whether `path` exists; a `NotFound` answer maps to `false`
    pub async fn exists(&self, path: &RemotePath) -> Result<bool, RemoteError> {
        match self.get_metadata(path).await {
            Ok(meta) => Ok(meta.is_some()),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Creates `path` and any missing ancestors.
    ///
    /// Tolerates directories created concurrently by another task: a failed
    /// mkdir is accepted when the directory exists afterwards.
    pub async fn ensure_directory(&self, path: &RemotePath) -> Result<(), RemoteError> {
        // Collect missing directories from `path` upwards
        let mut missing = Vec::new();
        let mut cursor = Some(path.clone());
        while let Some(dir) = cursor {
            if dir.is_root() {
                break;
            }
            match self.stat_or_none(&dir).await? {
                Some(meta) if meta.is_dir() => break,
                Some(meta) => {
                    return Err(RemoteError::Validation(format!(
                        "{dir} exists and is a {}, not a directory",
                        meta.kind
                    )));
                }
                None => {
                    cursor = dir.parent();
                    missing.push(dir);
                }
            }
        }

        for dir in missing.into_iter().rev() {
            debug!(path = %dir, "Creating remote directory");
            if let Err(err) = self.make_directory(&dir).await {
                match self.stat_or_none(&dir).await? {
                    Some(meta) if meta.is_dir() => {
                        debug!(path = %dir, "Remote directory created concurrently");
                    }
                    _ => return Err(err),
                }
            }
        }
        Ok(())
    }

    async fn stat_or_none(&self, path: &RemotePath) -> Result<Option<FileMeta>, RemoteError> {
        match self.get_metadata(path).await {
            Err(err) if err.is_not_found() => Ok(None),
            other => other,
        }
    }

    fn reject_root(path: &RemotePath, op: &str) -> Result<(), RemoteError> {
        if path.is_root() {
            return Err(RemoteError::Validation(format!(
                "cannot {op} the namespace root"
            )));
        }
        Ok(())
    }
}
