//! In-process [`LeaseBackend`] implementation.
//!
//! Reimplements the five Lua scripts' semantics natively over an in-memory
//! map guarded by a [`tokio::sync::Mutex`]. Used by this crate's own tests
//! and by downstream consumers who want to exercise `lease-core` without a
//! live Redis server. It is not a general-purpose cache — only the lease
//! engine's exact invariants are reproduced.

use std::collections::BTreeMap;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backend::{LeaseBackend, RawLease};
use crate::error::StorageError;

/// One emitted `EXPIRED` event, recorded for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub event_sink: String,
    pub workspace: String,
    pub lease_id: String,
    pub expire_at_ms: i64,
}

#[derive(Debug, Clone, Copy)]
struct Record {
    ttl_ms: i64,
    timestamp_ms: i64,
}

#[derive(Debug, Default)]
struct Workspace {
    records: HashMap<String, Record>,
    /// Ordered expiry index: score (expire_at_ms) -> lease ids with that
    /// score, mirroring a sorted-set's score ordering well enough for
    /// ascending range scans. Distinct leases sharing a score both survive.
    index: BTreeMap<i64, Vec<String>>,
}

impl Workspace {
    fn index_remove(&mut self, lease_id: &str, score: i64) {
        if let Some(bucket) = self.index.get_mut(&score) {
            bucket.retain(|id| id != lease_id);
            if bucket.is_empty() {
                self.index.remove(&score);
            }
        }
    }

    fn index_insert(&mut self, lease_id: &str, score: i64) {
        self.index.entry(score).or_default().push(lease_id.to_owned());
    }

    fn score_of(&self, lease_id: &str) -> Option<i64> {
        self.records.get(lease_id).map(|r| r.timestamp_ms + r.ttl_ms)
    }
}

/// In-process [`LeaseBackend`], suitable for unit tests.
#[derive(Default)]
pub struct MemoryBackend {
    workspaces: Mutex<HashMap<String, Workspace>>,
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return every event emitted by `expire` calls so far.
    pub async fn drain_events(&self) -> Vec<RecordedEvent> {
        std::mem::take(&mut *self.events.lock().await)
    }
}

#[async_trait]
impl LeaseBackend for MemoryBackend {
    async fn put(
        &self,
        workspace: &str,
        lease_id: &str,
        ttl_ms: i64,
        timestamp_ms: i64,
    ) -> Result<bool, StorageError> {
        if ttl_ms <= 0 {
            return Ok(false);
        }

        let mut workspaces = self.workspaces.lock().await;
        let ws = workspaces.entry(workspace.to_owned()).or_default();

        let last_update = ws.records.get(lease_id).map(|r| r.timestamp_ms);
        if last_update.is_some_and(|last| timestamp_ms <= last) {
            return Ok(false);
        }

        if let Some(old_score) = ws.score_of(lease_id) {
            ws.index_remove(lease_id, old_score);
        }
        ws.index_insert(lease_id, timestamp_ms + ttl_ms);
        ws.records.insert(
            lease_id.to_owned(),
            Record { ttl_ms, timestamp_ms },
        );

        Ok(true)
    }

    async fn get(&self, workspace: &str, lease_id: &str) -> Result<Option<RawLease>, StorageError> {
        let workspaces = self.workspaces.lock().await;
        let Some(ws) = workspaces.get(workspace) else {
            return Ok(None);
        };
        let Some(record) = ws.records.get(lease_id) else {
            return Ok(None);
        };

        Ok(Some(RawLease {
            ttl_ms: record.ttl_ms,
            timestamp_ms: record.timestamp_ms,
            expire_at_ms: ws.score_of(lease_id),
        }))
    }

    async fn delete(&self, workspace: &str, lease_id: &str) -> Result<bool, StorageError> {
        let mut workspaces = self.workspaces.lock().await;
        let Some(ws) = workspaces.get_mut(workspace) else {
            return Ok(false);
        };

        ws.records.remove(lease_id);

        let mut removed = false;
        for bucket in ws.index.values_mut() {
            if bucket.iter().any(|id| id == lease_id) {
                bucket.retain(|id| id != lease_id);
                removed = true;
            }
        }
        ws.index.retain(|_, bucket| !bucket.is_empty());

        Ok(removed)
    }

    async fn renew(
        &self,
        workspace: &str,
        lease_id: &str,
        timestamp_ms: i64,
    ) -> Result<i64, StorageError> {
        let mut workspaces = self.workspaces.lock().await;
        let ws = workspaces.entry(workspace.to_owned()).or_default();

        let Some(record) = ws.records.get_mut(lease_id) else {
            return Ok(0);
        };

        if timestamp_ms <= record.timestamp_ms {
            return Ok(record.timestamp_ms + record.ttl_ms);
        }

        let old_score = record.timestamp_ms + record.ttl_ms;
        let new_score = timestamp_ms + record.ttl_ms;
        record.timestamp_ms = timestamp_ms;

        ws.index_remove(lease_id, old_score);
        ws.index_insert(lease_id, new_score);
        Ok(new_score)
    }

    async fn expire(
        &self,
        workspace: &str,
        event_sink: &str,
        timestamp_ms: i64,
        limit: Option<u64>,
    ) -> Result<u64, StorageError> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(u64::MAX);

        let mut workspaces = self.workspaces.lock().await;
        let Some(ws) = workspaces.get_mut(workspace) else {
            return Ok(0);
        };

        let due: Vec<(i64, String)> = ws
            .index
            .range(..=timestamp_ms)
            .flat_map(|(score, ids)| ids.iter().map(move |id| (*score, id.clone())))
            .take(limit as usize)
            .collect();

        let mut events = self.events.lock().await;
        let mut count = 0u64;
        for (score, lease_id) in due {
            events.push(RecordedEvent {
                event_sink: event_sink.to_owned(),
                workspace: workspace.to_owned(),
                lease_id: lease_id.clone(),
                expire_at_ms: score,
            });
            ws.records.remove(&lease_id);
            ws.index_remove(&lease_id, score);
            count += 1;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_rejects_non_positive_ttl() {
        let backend = MemoryBackend::new();
        let ok = backend.put("ws", "lease-1", 0, 100).await.unwrap();
        assert!(!ok);
        assert!(backend.get("ws", "lease-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let backend = MemoryBackend::new();
        assert!(backend.put("ws", "lease-1", 1000, 100).await.unwrap());

        let lease = backend.get("ws", "lease-1").await.unwrap().unwrap();
        assert_eq!(lease.ttl_ms, 1000);
        assert_eq!(lease.timestamp_ms, 100);
        assert_eq!(lease.expire_at_ms, Some(1100));
    }

    #[tokio::test]
    async fn put_is_monotonic() {
        let backend = MemoryBackend::new();
        assert!(backend.put("ws", "lease-1", 1000, 100).await.unwrap());
        assert!(!backend.put("ws", "lease-1", 1000, 50).await.unwrap());

        let lease = backend.get("ws", "lease-1").await.unwrap().unwrap();
        assert_eq!(lease.timestamp_ms, 100);
    }

    #[tokio::test]
    async fn renew_advances_score_only_when_newer() {
        let backend = MemoryBackend::new();
        backend.put("ws", "lease-1", 1000, 100).await.unwrap();

        let score = backend.renew("ws", "lease-1", 200).await.unwrap();
        assert_eq!(score, 1200);

        let stale = backend.renew("ws", "lease-1", 150).await.unwrap();
        assert_eq!(stale, 1200);
    }

    #[tokio::test]
    async fn renew_unknown_lease_is_noop() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.renew("ws", "missing", 100).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_removes_record_and_index_entry() {
        let backend = MemoryBackend::new();
        backend.put("ws", "lease-1", 1000, 100).await.unwrap();

        assert!(backend.delete("ws", "lease-1").await.unwrap());
        assert!(backend.get("ws", "lease-1").await.unwrap().is_none());
        assert!(!backend.delete("ws", "lease-1").await.unwrap());
    }

    #[tokio::test]
    async fn expire_retires_due_leases_and_records_events() {
        let backend = MemoryBackend::new();
        backend.put("ws", "lease-1", 100, 0).await.unwrap();
        backend.put("ws", "lease-2", 1000, 0).await.unwrap();

        let retired = backend.expire("ws", "sink", 100, None).await.unwrap();
        assert_eq!(retired, 1);
        assert!(backend.get("ws", "lease-1").await.unwrap().is_none());
        assert!(backend.get("ws", "lease-2").await.unwrap().is_some());

        let events = backend.drain_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].lease_id, "lease-1");
        assert_eq!(events[0].event_sink, "sink");
    }

    #[tokio::test]
    async fn expire_honors_limit() {
        let backend = MemoryBackend::new();
        backend.put("ws", "lease-1", 100, 0).await.unwrap();
        backend.put("ws", "lease-2", 100, 0).await.unwrap();
        backend.put("ws", "lease-3", 100, 0).await.unwrap();

        let retired = backend.expire("ws", "sink", 500, Some(2)).await.unwrap();
        assert_eq!(retired, 2);

        let remaining = backend.expire("ws", "sink", 500, None).await.unwrap();
        assert_eq!(remaining, 1);
    }
}
