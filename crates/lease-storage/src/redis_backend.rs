//! Production [`LeaseBackend`] implementation, executing the Lua scripts
//! over a multiplexed Redis connection.

use async_trait::async_trait;
use redis::Value;
use redis::aio::ConnectionManager;
use serde::Deserialize;

use crate::backend::{LeaseBackend, RawLease};
use crate::error::StorageError;
use crate::script_cache::ScriptCache;
use crate::scripts;

/// Redis-backed implementation of [`LeaseBackend`].
///
/// Holds a [`ConnectionManager`], which reconnects and retries transparently
/// under the hood, plus the process-wide [`ScriptCache`].
pub struct RedisBackend {
    conn: ConnectionManager,
    scripts: ScriptCache,
}

impl RedisBackend {
    /// Build a backend from an already-established connection manager.
    #[must_use]
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            scripts: ScriptCache::new(),
        }
    }

    /// Connect to `redis_url` and build a backend.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Redis`] if the client or connection manager
    /// cannot be constructed.
    pub async fn connect(redis_url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }
}

#[derive(Debug, Deserialize)]
struct GetReply {
    ttl: Option<i64>,
    timestamp: Option<i64>,
    expire_at: Option<i64>,
}

#[async_trait]
impl LeaseBackend for RedisBackend {
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

        let mut conn = self.conn.clone();
        let reply = self
            .scripts
            .exec(
                &mut conn,
                scripts::PUT,
                &[workspace, lease_id],
                &[ttl_ms.to_string(), timestamp_ms.to_string()],
            )
            .await?;

        Ok(matches!(reply, Value::Okay)
            || matches!(reply, Value::SimpleString(ref s) if s == "OK")
            || matches!(reply, Value::BulkString(ref b) if b == b"OK"))
    }

    async fn get(&self, workspace: &str, lease_id: &str) -> Result<Option<RawLease>, StorageError> {
        let mut conn = self.conn.clone();
        let reply = self
            .scripts
            .exec(&mut conn, scripts::GET, &[workspace, lease_id], &[])
            .await?;

        let bytes = match reply {
            Value::Nil => return Ok(None),
            Value::BulkString(b) => b,
            Value::SimpleString(s) => s.into_bytes(),
            other => {
                return Err(StorageError::MalformedReply {
                    script: scripts::GET,
                    reason: format!("unexpected reply shape: {other:?}"),
                });
            }
        };

        let decoded: GetReply = rmp_serde::from_slice(&bytes).map_err(|e| StorageError::MalformedReply {
            script: scripts::GET,
            reason: e.to_string(),
        })?;

        let (Some(ttl_ms), Some(timestamp_ms)) = (decoded.ttl, decoded.timestamp) else {
            return Ok(None);
        };

        Ok(Some(RawLease {
            ttl_ms,
            timestamp_ms,
            expire_at_ms: decoded.expire_at,
        }))
    }

    async fn delete(&self, workspace: &str, lease_id: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn.clone();
        let reply = self
            .scripts
            .exec(&mut conn, scripts::DELETE, &[workspace, lease_id], &[])
            .await?;

        Ok(matches!(reply, Value::Okay)
            || matches!(reply, Value::SimpleString(ref s) if s == "OK")
            || matches!(reply, Value::BulkString(ref b) if b == b"OK"))
    }

    async fn renew(
        &self,
        workspace: &str,
        lease_id: &str,
        timestamp_ms: i64,
    ) -> Result<i64, StorageError> {
        let mut conn = self.conn.clone();
        let reply = self
            .scripts
            .exec(
                &mut conn,
                scripts::RENEW,
                &[workspace, lease_id],
                &[timestamp_ms.to_string()],
            )
            .await?;

        match reply {
            Value::Nil => Ok(0),
            Value::Int(v) => Ok(v),
            Value::BulkString(ref b) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .map(|f| f as i64)
                .ok_or_else(|| StorageError::MalformedReply {
                    script: scripts::RENEW,
                    reason: "non-numeric bulk reply".to_owned(),
                }),
            other => Err(StorageError::MalformedReply {
                script: scripts::RENEW,
                reason: format!("unexpected reply shape: {other:?}"),
            }),
        }
    }

    async fn expire(
        &self,
        workspace: &str,
        event_sink: &str,
        timestamp_ms: i64,
        limit: Option<u64>,
    ) -> Result<u64, StorageError> {
        let mut conn = self.conn.clone();
        let mut args = vec![timestamp_ms.to_string()];
        if let Some(limit) = limit.filter(|l| *l > 0) {
            args.push("LIMIT".to_owned());
            args.push(limit.to_string());
        }

        let reply = self
            .scripts
            .exec(&mut conn, scripts::EXPIRE, &[workspace, event_sink], &args)
            .await?;

        match reply {
            Value::Nil => Ok(0),
            Value::Int(v) => Ok(v.max(0) as u64),
            other => Err(StorageError::MalformedReply {
                script: scripts::EXPIRE,
                reason: format!("unexpected reply shape: {other:?}"),
            }),
        }
    }
}
