//! Domain error types
//!
//! [`DomainError`] covers validation of domain values. [`RemoteError`] is the
//! classified failure returned by every remote storage primitive; callers
//! branch on its classification (retryable, not-found, cancelled) rather than
//! on message text.

use thiserror::Error;

/// Errors that can occur when constructing domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Invalid path component (empty, contains a separator or traversal)
    #[error("Invalid path component: {0}")]
    InvalidComponent(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Classified failure of a remote storage call
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The addressed path does not exist on the remote side
    #[error("remote path not found: {0}")]
    NotFound(String),

    /// Network-level failure that is expected to clear up on its own
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// The service answered with a non-success status code
    #[error("remote request failed with status {code}: {message}")]
    Status { code: u16, message: String },

    /// The call did not complete within its per-call budget
    #[error("remote request timed out after {ms} ms")]
    Timeout { ms: u64 },

    /// The call was aborted through the client's cancellation token
    #[error("remote request cancelled")]
    Cancelled,

    /// Malformed input rejected before any request was made
    #[error("invalid request: {0}")]
    Validation(String),

    /// Local I/O failed while streaming a transfer
    #[error("local I/O error during transfer: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Whether retrying the same call may succeed.
    ///
    /// Transient network failures, timeouts, HTTP 429 and 5xx responses are
    /// retryable. Cancellation, validation and not-found never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transient(_) | RemoteError::Timeout { .. } => true,
            RemoteError::Status { code, .. } => *code == 429 || (500..600).contains(code),
            RemoteError::NotFound(_)
            | RemoteError::Cancelled
            | RemoteError::Validation(_)
            | RemoteError::Io(_) => false,
        }
    }

    /// Whether the error reports a missing remote path
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_) | RemoteError::Status { code: 404, .. })
    }

    /// Whether the service asked us to slow down (HTTP 429)
    pub fn is_throttle(&self) -> bool {
        matches!(self, RemoteError::Status { code: 429, .. })
    }

    /// Whether the call was aborted by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RemoteError::Cancelled)
    }
}

impl From<DomainError> for RemoteError {
    fn from(err: DomainError) -> Self {
        RemoteError::Validation(err.to_string())
    }
}
