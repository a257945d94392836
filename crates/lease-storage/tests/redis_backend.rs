//! Integration tests against a live Redis instance.
//!
//! Gated behind `#[ignore]` and the `LEASE_TEST_REDIS_URL` environment
//! variable — run with
//! `LEASE_TEST_REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`.

use std::time::Duration;

use lease_storage::{LeaseBackend, RedisBackend};

async fn connect() -> RedisBackend {
    let url = std::env::var("LEASE_TEST_REDIS_URL").expect("LEASE_TEST_REDIS_URL must be set for this test");
    RedisBackend::connect(&url).await.expect("failed to connect to Redis")
}

#[tokio::test]
#[ignore]
async fn put_then_get_roundtrips() {
    let backend = connect().await;
    let workspace = "lease-storage-it-roundtrip";

    let accepted = backend.put(workspace, "lease-1", 30_000, 1000).await.unwrap();
    assert!(accepted);

    let lease = backend.get(workspace, "lease-1").await.unwrap().unwrap();
    assert_eq!(lease.ttl_ms, 30_000);
    assert_eq!(lease.timestamp_ms, 1000);
    assert_eq!(lease.expire_at_ms, Some(31_000));

    backend.delete(workspace, "lease-1").await.unwrap();
}

#[tokio::test]
#[ignore]
async fn expire_emits_one_event_per_due_lease() {
    let backend = connect().await;
    let workspace = "lease-storage-it-expire";
    let sink = "lease-storage-it-expire-sink";

    backend.put(workspace, "lease-a", 100, 0).await.unwrap();
    backend.put(workspace, "lease-b", 100, 0).await.unwrap();

    let retired = backend.expire(workspace, sink, 1000, None).await.unwrap();
    assert_eq!(retired, 2);

    assert!(backend.get(workspace, "lease-a").await.unwrap().is_none());
    assert!(backend.get(workspace, "lease-b").await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn renew_is_monotonic() {
    let backend = connect().await;
    let workspace = "lease-storage-it-renew";

    backend.put(workspace, "lease-1", Duration::from_secs(10).as_millis() as i64, 1000).await.unwrap();

    let advanced = backend.renew(workspace, "lease-1", 2000).await.unwrap();
    assert_eq!(advanced, 2000 + Duration::from_secs(10).as_millis() as i64);

    let stale = backend.renew(workspace, "lease-1", 500).await.unwrap();
    assert_eq!(stale, advanced);

    backend.delete(workspace, "lease-1").await.unwrap();
}
