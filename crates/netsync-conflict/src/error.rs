//! Error types for the conflict policy

use thiserror::Error;

/// Errors that can occur while building conflict rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    /// Invalid glob pattern in conflict rule
    #[error("invalid glob pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
