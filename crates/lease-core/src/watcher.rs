//! Consumer-group subscription over a workspace's event sink.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WatcherError;
use crate::event::Event;
use crate::timestamp::Timestamp;

/// A stream to subscribe to, read from the tail (`latest`) or the
/// beginning (`from_start`) the first time its consumer group is created.
#[derive(Debug, Clone)]
pub struct StreamOffset {
    pub stream: String,
    offset: &'static str,
}

impl StreamOffset {
    /// Start the consumer group at the beginning of the stream.
    #[must_use]
    pub fn from_start(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            offset: "0",
        }
    }

    /// Start the consumer group at the tail of the stream (only new
    /// messages are delivered).
    #[must_use]
    pub fn latest(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            offset: "$",
        }
    }
}

/// Handles one decoded [`Event`]. Returning `Ok` acknowledges and deletes
/// the underlying message; returning `Err` leaves it pending for claim or
/// redelivery.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), WatcherError>;
}

/// Consumer-group client for a set of event-sink streams.
pub struct Watcher {
    group: String,
    name: String,
    redis_url: String,
    max_in_flight: i64,
    max_polling_timeout: Duration,
    auto_claim_min_idle_time: Duration,
    claim_sensitivity: i64,
    claim_occurrence_rate: u64,
    event_handler: Arc<dyn EventHandler>,
    running: AsyncMutex<Option<(JoinHandle<()>, CancellationToken)>>,
}

impl Watcher {
    /// Build a watcher. `claim_occurrence_rate` is the number of read
    /// iterations between `XAUTOCLAIM` passes (0 disables auto-claim);
    /// `claim_sensitivity` is the `COUNT` used for each such pass.
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        redis_url: impl Into<String>,
        max_in_flight: i64,
        max_polling_timeout: Duration,
        auto_claim_min_idle_time: Duration,
        claim_sensitivity: i64,
        claim_occurrence_rate: u64,
        event_handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            redis_url: redis_url.into(),
            max_in_flight,
            max_polling_timeout,
            auto_claim_min_idle_time,
            claim_sensitivity,
            claim_occurrence_rate,
            event_handler,
            running: AsyncMutex::new(None),
        }
    }

    /// Ensure the consumer group exists on every listed stream, then spawn
    /// the background read loop.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError`] if the Redis connection or consumer-group
    /// setup fails.
    pub async fn subscribe(self: Arc<Self>, streams: Vec<StreamOffset>) -> Result<(), WatcherError> {
        let client = redis::Client::open(self.redis_url.as_str())
            .map_err(lease_storage::StorageError::from)?;
        let mut conn = ConnectionManager::new(client).await.map_err(lease_storage::StorageError::from)?;

        for s in &streams {
            self.ensure_consumer_group(&mut conn, s).await?;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&self).run(conn, streams, cancel.clone()));

        *self.running.lock().await = Some((task, cancel));
        Ok(())
    }

    /// Stop the background read loop and wait for it to exit.
    pub async fn close(&self) {
        if let Some((task, cancel)) = self.running.lock().await.take() {
            cancel.cancel();
            let _ = task.await;
        }
    }

    async fn ensure_consumer_group(&self, conn: &mut ConnectionManager, s: &StreamOffset) -> Result<(), WatcherError> {
        let result: Result<Value, redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&s.stream)
            .arg(&self.group)
            .arg(s.offset)
            .arg("MKSTREAM")
            .query_async(conn)
            .await;

        match result {
            Ok(_) => {
                info!(stream = %s.stream, group = %self.group, "consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(stream = %s.stream, group = %self.group, "consumer group already exists");
                Ok(())
            }
            Err(e) => Err(WatcherError::ConsumerGroup {
                group: self.group.clone(),
                stream: s.stream.clone(),
                reason: e.to_string(),
            }),
        }
    }

    async fn run(self: Arc<Self>, mut conn: ConnectionManager, streams: Vec<StreamOffset>, cancel: CancellationToken) {
        let mut iteration: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            iteration += 1;

            if self.claim_occurrence_rate > 0 && iteration % self.claim_occurrence_rate == 0 {
                for s in &streams {
                    self.run_autoclaim_pass(&mut conn, &s.stream).await;
                }
            }

            match self.read_once(&mut conn, &streams).await {
                Ok(messages) => {
                    for (stream, id, fields) in messages {
                        self.process_message(&mut conn, &stream, &id, fields).await;
                    }
                }
                Err(e) => warn!(error = %e, "watcher read failed"),
            }
        }
    }

    async fn read_once(
        &self,
        conn: &mut ConnectionManager,
        streams: &[StreamOffset],
    ) -> Result<Vec<(String, String, HashMap<String, String>)>, WatcherError> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.group)
            .arg(&self.name)
            .arg("COUNT")
            .arg(self.max_in_flight)
            .arg("BLOCK")
            .arg(i64::try_from(self.max_polling_timeout.as_millis()).unwrap_or(i64::MAX))
            .arg("STREAMS");
        for s in streams {
            cmd.arg(&s.stream);
        }
        for _ in streams {
            cmd.arg(">");
        }

        let reply: Value = cmd.query_async(conn).await.map_err(lease_storage::StorageError::from)?;
        Ok(parse_stream_reply(&reply))
    }

    async fn run_autoclaim_pass(&self, conn: &mut ConnectionManager, stream: &str) {
        let min_idle_ms = i64::try_from(self.auto_claim_min_idle_time.as_millis()).unwrap_or(i64::MAX);
        let reply: Result<Value, redis::RedisError> = redis::cmd("XAUTOCLAIM")
            .arg(stream)
            .arg(&self.group)
            .arg(&self.name)
            .arg(min_idle_ms)
            .arg("0")
            .arg("COUNT")
            .arg(self.claim_sensitivity.max(1))
            .query_async(conn)
            .await;

        match reply {
            Ok(value) => {
                let messages = parse_autoclaim_reply(stream, &value);
                for (stream, id, fields) in messages {
                    self.process_message(conn, &stream, &id, fields).await;
                }
            }
            Err(e) => warn!(error = %e, stream, "autoclaim pass failed"),
        }
    }

    async fn process_message(&self, conn: &mut ConnectionManager, stream: &str, id: &str, fields: HashMap<String, String>) {
        let event = fill_event_from_message(stream, id, &fields);

        match self.event_handler.handle(&event).await {
            Ok(()) => {
                let _: Result<Value, redis::RedisError> =
                    redis::cmd("XACK").arg(stream).arg(&self.group).arg(id).query_async(conn).await;
                let _: Result<Value, redis::RedisError> = redis::cmd("XDEL").arg(stream).arg(id).query_async(conn).await;
            }
            Err(e) => warn!(stream, id, error = %e, "event handler failed, message left pending"),
        }
    }
}

fn parse_stream_reply(value: &Value) -> Vec<(String, String, HashMap<String, String>)> {
    let Value::Array(streams) = value else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for entry in streams {
        let Value::Array(pair) = entry else { continue };
        let [Value::BulkString(stream_name), Value::Array(messages)] = pair.as_slice() else {
            continue;
        };
        let stream = String::from_utf8_lossy(stream_name).into_owned();
        for message in messages {
            if let Some((id, fields)) = parse_message(message) {
                out.push((stream.clone(), id, fields));
            }
        }
    }
    out
}

fn parse_autoclaim_reply(stream: &str, value: &Value) -> Vec<(String, String, HashMap<String, String>)> {
    let Value::Array(parts) = value else {
        return Vec::new();
    };
    let Some(Value::Array(messages)) = parts.get(1) else {
        return Vec::new();
    };

    messages
        .iter()
        .filter_map(|m| parse_message(m).map(|(id, fields)| (stream.to_owned(), id, fields)))
        .collect()
}

fn parse_message(value: &Value) -> Option<(String, HashMap<String, String>)> {
    let Value::Array(parts) = value else { return None };
    let [Value::BulkString(id), Value::Array(field_values)] = parts.as_slice() else {
        return None;
    };
    let id = String::from_utf8_lossy(id).into_owned();

    let mut fields = HashMap::new();
    let mut iter = field_values.iter();
    while let (Some(Value::BulkString(k)), Some(v)) = (iter.next(), iter.next()) {
        if let Value::BulkString(v) = v {
            fields.insert(String::from_utf8_lossy(k).into_owned(), String::from_utf8_lossy(v).into_owned());
        }
    }
    Some((id, fields))
}

fn fill_event_from_message(stream: &str, id: &str, fields: &HashMap<String, String>) -> Event {
    let timestamp = id
        .split_once('-')
        .and_then(|(ms, _)| ms.parse::<i64>().ok())
        .map(Timestamp::from_millis)
        .unwrap_or(Timestamp::from_millis(0));

    let expire_at = fields
        .get("expire_at")
        .and_then(|v| v.parse::<i64>().ok())
        .map(Timestamp::from_millis)
        .unwrap_or(Timestamp::from_millis(0));

    Event {
        action: fields.get("action").cloned().unwrap_or_default(),
        sink: stream.to_owned(),
        workspace: fields.get("workspace").cloned().unwrap_or_default(),
        lease_id: fields.get("lease").cloned().unwrap_or_default(),
        expire_at,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_event_parses_fields_and_id_prefix() {
        let mut fields = HashMap::new();
        fields.insert("action".to_owned(), "EXPIRED".to_owned());
        fields.insert("workspace".to_owned(), "ws".to_owned());
        fields.insert("lease".to_owned(), "lease-1".to_owned());
        fields.insert("expire_at".to_owned(), "1700000001000".to_owned());

        let event = fill_event_from_message("sink", "1700000000000-0", &fields);
        assert_eq!(event.action, "EXPIRED");
        assert_eq!(event.workspace, "ws");
        assert_eq!(event.lease_id, "lease-1");
        assert_eq!(event.expire_at.as_millis(), 1_700_000_001_000);
        assert_eq!(event.timestamp.as_millis(), 1_700_000_000_000);
        assert_eq!(event.sink, "sink");
    }
}
