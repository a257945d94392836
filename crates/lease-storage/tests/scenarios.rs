//! Deterministic scenario tests against the in-process backend, using the
//! same timestamps and expected values as the engine's worked examples.

use lease_storage::{LeaseBackend, MemoryBackend};

const BASE_TS: i64 = 1_631_116_984_000; // 2021-09-08T16:03:04.000Z

#[tokio::test]
async fn s1_put_put_duplicate() {
    let backend = MemoryBackend::new();

    assert!(backend.put("op/lease", "lease-1", 300, BASE_TS).await.unwrap());
    assert!(!backend.put("op/lease", "lease-1", 300, BASE_TS).await.unwrap());

    backend.delete("op/lease", "lease-1").await.unwrap();
    assert!(backend.get("op/lease", "lease-1").await.unwrap().is_none());
}

#[tokio::test]
async fn s2_get_after_put() {
    let backend = MemoryBackend::new();
    backend.put("op/lease", "lease-1", 300, BASE_TS).await.unwrap();

    let lease = backend.get("op/lease", "lease-1").await.unwrap().unwrap();
    assert_eq!(lease.ttl_ms, 300);
    assert_eq!(lease.timestamp_ms, BASE_TS);
    assert_eq!(lease.expire_at_ms, Some(BASE_TS + 300));
}

#[tokio::test]
async fn s3_delete_duplicate() {
    let backend = MemoryBackend::new();
    backend.put("op/lease", "lease-1", 300, BASE_TS).await.unwrap();

    assert!(backend.delete("op/lease", "lease-1").await.unwrap());
    assert!(!backend.delete("op/lease", "lease-1").await.unwrap());
}

#[tokio::test]
async fn s4_renew_idempotence() {
    let backend = MemoryBackend::new();
    backend.put("op/lease", "lease-1", 300, BASE_TS).await.unwrap();

    let first = backend.renew("op/lease", "lease-1", BASE_TS + 150).await.unwrap();
    assert_eq!(first, BASE_TS + 450);

    let second = backend.renew("op/lease", "lease-1", BASE_TS + 150).await.unwrap();
    assert_eq!(second, BASE_TS + 450);
}

#[tokio::test]
async fn s5_expire_one_due_lease() {
    let backend = MemoryBackend::new();
    backend.put("op/lease", "lease-1", 300, BASE_TS).await.unwrap();

    let retired = backend.expire("op/lease", "op/lease/events", BASE_TS + 301, None).await.unwrap();
    assert_eq!(retired, 1);

    let events = backend.drain_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_sink, "op/lease/events");
    assert_eq!(events[0].workspace, "op/lease");
    assert_eq!(events[0].lease_id, "lease-1");
    assert_eq!(events[0].expire_at_ms, BASE_TS + 300);
}

#[tokio::test]
async fn s6_expire_with_limit_over_three_leases() {
    let backend = MemoryBackend::new();
    backend.put("op/lease", "lease-300a", 300, BASE_TS).await.unwrap();
    backend.put("op/lease", "lease-300b", 300, BASE_TS).await.unwrap();
    backend.put("op/lease", "lease-400", 400, BASE_TS).await.unwrap();

    let retired = backend.expire("op/lease", "op/lease/events", BASE_TS + 300, Some(1)).await.unwrap();
    assert_eq!(retired, 1);

    let remaining_300 = backend.get("op/lease", "lease-300a").await.unwrap().is_some()
        || backend.get("op/lease", "lease-300b").await.unwrap().is_some();
    assert!(remaining_300, "exactly one due 300ms lease should remain");

    let lease_400 = backend.get("op/lease", "lease-400").await.unwrap();
    assert!(lease_400.is_some(), "the 400ms lease is not yet due and must remain");
}
