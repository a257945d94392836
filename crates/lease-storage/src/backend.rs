//! The [`LeaseBackend`] trait — the pluggable execution surface for the five
//! atomic lease operations.
//!
//! Like `StorageBackend` in a barrier-over-storage design, this trait knows
//! nothing about the friendlier domain types (`Timestamp`, `Duration`,
//! `Lease`) that `lease-core` builds on top of it — only raw millisecond
//! integers and counts.

use async_trait::async_trait;

use crate::StorageError;

/// The raw fields decoded from a `get` script reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLease {
    /// Time-to-live in milliseconds, as stored in the hash.
    pub ttl_ms: i64,
    /// Last-update timestamp in milliseconds, as stored in the hash.
    pub timestamp_ms: i64,
    /// Current score in the expiry index, if the lease is still indexed.
    pub expire_at_ms: Option<i64>,
}

/// A pluggable backend implementing the five atomic lease operations.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait]
pub trait LeaseBackend: Send + Sync + 'static {
    /// `Put` — create or (monotonically) refresh a lease. See the crate-level
    /// docs for the exact semantics.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on a transport failure or a rejected argument.
    async fn put(
        &self,
        workspace: &str,
        lease_id: &str,
        ttl_ms: i64,
        timestamp_ms: i64,
    ) -> Result<bool, StorageError>;

    /// `Get` — read the stored attributes and current expiry of a lease.
    ///
    /// Returns `Ok(None)` if the lease does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on a transport failure or a rejected argument.
    async fn get(&self, workspace: &str, lease_id: &str) -> Result<Option<RawLease>, StorageError>;

    /// `Delete` — unconditionally remove a lease's hash and index entry.
    ///
    /// Returns `true` iff the lease was present and removed from the index.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on a transport failure or a rejected argument.
    async fn delete(&self, workspace: &str, lease_id: &str) -> Result<bool, StorageError>;

    /// `Renew` — advance a lease's `timestamp` if the caller's value is newer.
    ///
    /// Returns the current index score (`0` if the lease has no `ttl`
    /// recorded and no index entry exists).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on a transport failure or a rejected argument.
    async fn renew(
        &self,
        workspace: &str,
        lease_id: &str,
        timestamp_ms: i64,
    ) -> Result<i64, StorageError>;

    /// `Expire` — atomically retire due leases, emitting one event per lease
    /// on `event_sink`. `limit` of `None` or `Some(0)` means unlimited.
    ///
    /// Returns the number of leases retired.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on a transport failure or a rejected argument.
    async fn expire(
        &self,
        workspace: &str,
        event_sink: &str,
        timestamp_ms: i64,
        limit: Option<u64>,
    ) -> Result<u64, StorageError>;
}
