//! Error types for `lease-storage`.
//!
//! These sit at the bottom of the crate's error hierarchy: every other error
//! type in the workspace wraps [`StorageError`] via `#[from]`.

/// Errors from the Redis-backed lease backend and its script cache.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The underlying Redis connection failed or the command itself errored.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A script reply could not be decoded into the expected shape.
    #[error("malformed script reply for '{script}': {reason}")]
    MalformedReply { script: &'static str, reason: String },

    /// The script returned `INVALID_ARGUMENT` or `ILLEGAL_ARGUMENTS`.
    #[error("invalid argument rejected by script '{script}': {message}")]
    InvalidArgument { script: &'static str, message: String },

    /// A named script was not found in the local script table.
    #[error("unknown script: {0}")]
    UnknownScript(&'static str),
}

impl StorageError {
    /// Whether this error represents a transient transport fault that is
    /// safe to retry (as opposed to a programming error or a rejected
    /// argument, which retrying cannot fix).
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            StorageError::Redis(e) => e.is_connection_dropped() || e.is_timeout() || e.is_io_error(),
            StorageError::MalformedReply { .. }
            | StorageError::InvalidArgument { .. }
            | StorageError::UnknownScript(_) => false,
        }
    }
}
