//! Thin client-side façade over [`LeaseProvider`].

use std::sync::Arc;
use std::time::Duration;

use lease_storage::{LeaseBackend, RedisBackend};

use crate::error::LessorError;
use crate::lease::Lease;
use crate::provider::LeaseProvider;
use crate::timestamp::Timestamp;

/// Client-side façade for lease CRUD/renew, the counterpart callers reach
/// for directly rather than going through [`LeaseProvider`].
pub struct Lessor {
    provider: LeaseProvider,
}

impl Lessor {
    /// Wrap an already-built backend.
    #[must_use]
    pub fn new(backend: Arc<dyn LeaseBackend>) -> Self {
        Self {
            provider: LeaseProvider::new(backend),
        }
    }

    /// Connect to Redis and wrap the resulting backend.
    ///
    /// # Errors
    ///
    /// Returns [`LessorError`] if the connection cannot be established.
    pub async fn connect(redis_url: &str) -> Result<Self, LessorError> {
        let backend = RedisBackend::connect(redis_url)
            .await
            .map_err(|e| LessorError::Provider(e.into()))?;
        Ok(Self::new(Arc::new(backend)))
    }

    /// Grant (create or refresh) a lease.
    ///
    /// # Errors
    ///
    /// Returns [`LessorError`] on an invalid argument or backend failure.
    pub async fn grant(&self, workspace: &str, lease_id: &str, ttl: Duration, timestamp: Timestamp) -> Result<bool, LessorError> {
        let lease = Lease::new(lease_id, ttl);
        Ok(self.provider.put(workspace, &lease, timestamp).await?)
    }

    /// Refresh a lease's timestamp, returning its new absolute expiry.
    ///
    /// # Errors
    ///
    /// Returns [`LessorError`] on an invalid argument or backend failure.
    pub async fn keep_alive(&self, workspace: &str, lease_key: &str, timestamp: Timestamp) -> Result<Timestamp, LessorError> {
        Ok(self.provider.renew(workspace, lease_key, timestamp).await?)
    }

    /// Unconditionally remove a lease.
    ///
    /// # Errors
    ///
    /// Returns [`LessorError`] on an invalid argument or backend failure.
    pub async fn revoke(&self, workspace: &str, lease_key: &str) -> Result<bool, LessorError> {
        Ok(self.provider.delete(workspace, lease_key).await?)
    }

    /// Fetch a lease's current attributes.
    ///
    /// # Errors
    ///
    /// Returns [`LessorError`] on an invalid argument or backend failure.
    pub async fn lease(&self, workspace: &str, lease_key: &str) -> Result<Option<Lease>, LessorError> {
        Ok(self.provider.get(workspace, lease_key).await?)
    }

    /// Time since expiry (`now - expire_at`): negative while the lease is
    /// still alive, positive once it has expired. `None` if the lease does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LessorError`] on an invalid argument or backend failure.
    pub async fn time_to_live(&self, workspace: &str, lease_key: &str) -> Result<Option<chrono::Duration>, LessorError> {
        Ok(self.lease(workspace, lease_key).await?.and_then(|l| l.time_to_live()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lease_storage::MemoryBackend;

    fn make_lessor() -> Lessor {
        Lessor::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn grant_then_lease_roundtrips() {
        let lessor = make_lessor();
        assert!(lessor
            .grant("ws", "a", Duration::from_secs(30), Timestamp::from_millis(1000))
            .await
            .unwrap());

        let lease = lessor.lease("ws", "a").await.unwrap().unwrap();
        assert_eq!(lease.ttl, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn revoke_removes_the_lease() {
        let lessor = make_lessor();
        lessor
            .grant("ws", "a", Duration::from_secs(30), Timestamp::from_millis(1000))
            .await
            .unwrap();

        assert!(lessor.revoke("ws", "a").await.unwrap());
        assert!(lessor.lease("ws", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn time_to_live_is_none_for_missing_lease() {
        let lessor = make_lessor();
        assert!(lessor.time_to_live("ws", "missing").await.unwrap().is_none());
    }
}
