//! Error types for inventory lock operations.
//!
//! Only faults live here. A refused acquisition, a missing lock or an owner
//! mismatch are ordinary outcomes and are reported as `None`, `false` or `0`.

use thiserror::Error;

/// Errors that can occur during lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The caller passed an argument outside the operation's contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Backend connection failed.
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Backend-specific error.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A stored lock record could not be decoded.
    #[error("corrupt lock record at {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LockError {
    /// Wraps any error as a backend fault.
    pub fn backend(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(error))
    }

    /// Wraps any error as a connection fault.
    pub fn connection(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Connection(Box::new(error))
    }

    /// Returns true when the fault comes from the backing store rather than
    /// from the caller.
    ///
    /// After such a fault the outcome of a mutating call is unknown; callers
    /// reconcile through `get_locks_by_owner` before retrying.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Backend(_) | Self::CorruptRecord { .. }
        )
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
