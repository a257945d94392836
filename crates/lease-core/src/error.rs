//! Error types for `lease-core`.
//!
//! Layered the way a barrier-over-storage design layers its errors: the
//! low-level [`StorageError`] is wrapped by [`ProviderError`] (adds
//! invalid-argument variants), which is in turn wrapped by [`ReaperError`],
//! [`LessorError`], and [`WatcherError`] at the public surface.

pub use lease_storage::StorageError;

/// Errors from [`crate::provider::LeaseProvider`].
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A caller-supplied argument was rejected before reaching the backend.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend returned an error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ProviderError {
    /// Whether retrying the same call might succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            ProviderError::InvalidArgument(_) => false,
            ProviderError::Storage(e) => e.is_retriable(),
        }
    }
}

/// Errors from [`crate::reaper::LeaseReaper`].
#[derive(Debug, thiserror::Error)]
pub enum ReaperError {
    /// An expiry executor failed and the error handler did not suppress it.
    #[error("reaper provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Connecting the backend client during `start` failed.
    #[error("reaper backend connection failed: {0}")]
    Connect(#[from] StorageError),

    /// A workspace was registered more than once.
    #[error("workspace '{workspace}' is already registered")]
    DuplicateWorkspace { workspace: String },
}

/// Errors from [`crate::lessor::Lessor`].
#[derive(Debug, thiserror::Error)]
pub enum LessorError {
    /// The provider returned an error.
    #[error("lessor provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Errors from [`crate::watcher::Watcher`].
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// The backend returned an error while reading or acknowledging the
    /// stream.
    #[error("watcher storage error: {0}")]
    Storage(#[from] StorageError),

    /// A consumer group could not be created or altered for a reason other
    /// than `BUSYGROUP` (which is treated as success).
    #[error("failed to configure consumer group '{group}' on stream '{stream}': {reason}")]
    ConsumerGroup {
        group: String,
        stream: String,
        reason: String,
    },
}
