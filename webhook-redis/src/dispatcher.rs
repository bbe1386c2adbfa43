use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use webhook_core::dispatcher::{DispatchEnvelope, DispatchOperation, Dispatcher};
use webhook_core::error::DispatchError;

/// Broker-mode `Dispatcher`: each topic is a Redis list, `publish_*` does
/// `RPUSH`, `next` does a blocking `BLPOP` across the retries and events
/// lists (retries checked first so a backlog of new events never starves
/// messages that are already due for another attempt). `balancing` has no
/// consumer in this crate yet; it is reserved wire surface.
pub struct RedisDispatcher {
    conn: MultiplexedConnection,
    events_key: String,
    retries_key: String,
    #[allow(dead_code)]
    balancing_key: String,
    block_timeout_s: f64,
}

fn redis_err(e: redis::RedisError) -> DispatchError {
    DispatchError::TransportUnavailable(e.to_string())
}

impl RedisDispatcher {
    pub fn new(
        conn: MultiplexedConnection,
        events_topic: &str,
        retries_topic: &str,
        balancing_topic: &str,
    ) -> Self {
        Self {
            conn,
            events_key: events_topic.to_string(),
            retries_key: retries_topic.to_string(),
            balancing_key: balancing_topic.to_string(),
            block_timeout_s: 5.0,
        }
    }

    async fn push(&self, key: &str, message_id: &str, operation: DispatchOperation) -> Result<(), DispatchError> {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        let envelope = DispatchEnvelope::new(message_id, timestamp, operation);
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| DispatchError::TransportUnavailable(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(key, payload).await.map_err(redis_err)
    }
}

#[async_trait]
impl Dispatcher for RedisDispatcher {
    async fn publish_event(&self, message_id: &str) -> Result<(), DispatchError> {
        self.push(&self.events_key, message_id, DispatchOperation::Process).await
    }

    async fn publish_retry(&self, message_id: &str) -> Result<(), DispatchError> {
        self.push(&self.retries_key, message_id, DispatchOperation::Retry).await
    }

    async fn next(&self) -> Result<Option<(String, DispatchOperation)>, DispatchError> {
        let mut conn = self.conn.clone();
        let result: Option<(String, String)> = conn
            .blpop(&[self.retries_key.clone(), self.events_key.clone()], self.block_timeout_s)
            .await
            .map_err(redis_err)?;

        let Some((_key, payload)) = result else {
            return Ok(None);
        };

        let envelope: DispatchEnvelope =
            serde_json::from_str(&payload).map_err(|e| DispatchError::TransportUnavailable(e.to_string()))?;
        let operation = envelope.operation.unwrap_or(DispatchOperation::Process);
        Ok(Some((envelope.message_id, operation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let envelope = DispatchEnvelope::new("msg_1", 0, DispatchOperation::Retry);
        let json = serde_json::to_string(&envelope).unwrap();
        let back: DispatchEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.message_id, "msg_1");
        assert_eq!(back.operation, Some(DispatchOperation::Retry));
    }
}
