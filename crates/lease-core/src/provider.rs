//! Typed façade over [`LeaseBackend`].

use std::sync::Arc;
use std::time::Duration;

use lease_storage::LeaseBackend;

use crate::error::ProviderError;
use crate::event::ExpireOptions;
use crate::lease::Lease;
use crate::timestamp::Timestamp;

/// Validates arguments and converts between domain types and the backend's
/// raw millisecond integers.
pub struct LeaseProvider {
    backend: Arc<dyn LeaseBackend>,
}

impl LeaseProvider {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn LeaseBackend>) -> Self {
        Self { backend }
    }

    /// Create or refresh a lease. See [crate-level docs](crate) for the
    /// monotonicity rule.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidArgument`] if `workspace` or
    /// `lease.id` is empty, or [`ProviderError::Storage`] on a backend
    /// failure.
    pub async fn put(&self, workspace: &str, lease: &Lease, timestamp: Timestamp) -> Result<bool, ProviderError> {
        non_empty("workspace", workspace)?;
        non_empty("lease id", &lease.id)?;

        let ttl_ms = i64::try_from(lease.ttl.as_millis()).unwrap_or(i64::MAX);
        Ok(self
            .backend
            .put(workspace, &lease.id, ttl_ms, timestamp.as_millis())
            .await?)
    }

    /// Read a lease's current attributes and expiry.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidArgument`] if `workspace` or
    /// `lease_id` is empty, or [`ProviderError::Storage`] on a backend
    /// failure.
    pub async fn get(&self, workspace: &str, lease_id: &str) -> Result<Option<Lease>, ProviderError> {
        non_empty("workspace", workspace)?;
        non_empty("lease id", lease_id)?;

        let Some(raw) = self.backend.get(workspace, lease_id).await? else {
            return Ok(None);
        };

        Ok(Some(Lease {
            id: lease_id.to_owned(),
            ttl: Duration::from_millis(raw.ttl_ms.max(0) as u64),
            expire_at: raw.expire_at_ms.map(Timestamp::from_millis),
        }))
    }

    /// Unconditionally remove a lease.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidArgument`] if `workspace` or
    /// `lease_id` is empty, or [`ProviderError::Storage`] on a backend
    /// failure.
    pub async fn delete(&self, workspace: &str, lease_id: &str) -> Result<bool, ProviderError> {
        non_empty("workspace", workspace)?;
        non_empty("lease id", lease_id)?;

        Ok(self.backend.delete(workspace, lease_id).await?)
    }

    /// Advance a lease's timestamp if `timestamp` is newer than the stored
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidArgument`] if `workspace` or
    /// `lease_id` is empty, or [`ProviderError::Storage`] on a backend
    /// failure.
    pub async fn renew(
        &self,
        workspace: &str,
        lease_id: &str,
        timestamp: Timestamp,
    ) -> Result<Timestamp, ProviderError> {
        non_empty("workspace", workspace)?;
        non_empty("lease id", lease_id)?;

        let score = self.backend.renew(workspace, lease_id, timestamp.as_millis()).await?;
        Ok(Timestamp::from_millis(score))
    }

    /// Atomically retire every lease in `workspace` due by `timestamp`,
    /// emitting one event per lease on `event_sink`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidArgument`] if `workspace` or
    /// `event_sink` is empty, or [`ProviderError::Storage`] on a backend
    /// failure.
    pub async fn expire(
        &self,
        workspace: &str,
        event_sink: &str,
        timestamp: Timestamp,
        options: &ExpireOptions,
    ) -> Result<u64, ProviderError> {
        non_empty("workspace", workspace)?;
        non_empty("event sink", event_sink)?;

        Ok(self
            .backend
            .expire(workspace, event_sink, timestamp.as_millis(), options.limit())
            .await?)
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ProviderError> {
    if value.is_empty() {
        return Err(ProviderError::InvalidArgument(format!("'{field}' cannot be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lease_storage::MemoryBackend;

    fn make_provider() -> LeaseProvider {
        LeaseProvider::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn put_rejects_empty_workspace() {
        let provider = make_provider();
        let lease = Lease::new("a", Duration::from_secs(1));
        let err = provider.put("", &lease, Timestamp::from_millis(0)).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let provider = make_provider();
        let lease = Lease::new("a", Duration::from_secs(1));
        assert!(provider.put("ws", &lease, Timestamp::from_millis(100)).await.unwrap());

        let fetched = provider.get("ws", "a").await.unwrap().unwrap();
        assert_eq!(fetched.ttl, Duration::from_secs(1));
        assert_eq!(fetched.expire_at, Some(Timestamp::from_millis(1100)));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let provider = make_provider();
        assert!(provider.get("ws", "missing").await.unwrap().is_none());
    }
}
