use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// The three broker topics / in-process channels a message id can travel
/// through. `Balancing` is reserved for cross-node rebalancing hints and is
/// not produced by this crate today, but is part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Events,
    Retries,
    Balancing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOperation {
    Process,
    Retry,
}

/// Wire payload published to a topic / sent over the in-process channel.
/// Key = `message_id`; this struct is the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    pub message_id: String,
    pub timestamp: i64,
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<DispatchOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node: Option<String>,
}

impl DispatchEnvelope {
    pub fn new(message_id: impl Into<String>, timestamp: i64, operation: DispatchOperation) -> Self {
        Self {
            message_id: message_id.into(),
            timestamp,
            uuid: ulid::Ulid::new().to_string(),
            operation: Some(operation),
            target_node: None,
        }
    }
}

/// Decouples reception from delivery. Broker mode publishes to durable
/// topics (`events`, `retries`, `balancing`); direct mode hands ids to a
/// bounded in-process queue. Both are at-least-once: the Delivery Worker's
/// state-guarded `markProcessing` tolerates duplicate delivery of the same
/// id.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn publish_event(&self, message_id: &str) -> Result<(), DispatchError>;
    async fn publish_retry(&self, message_id: &str) -> Result<(), DispatchError>;

    /// Pop the next message id to process, waiting up to the implementation's
    /// own timeout. Returns `None` on a timeout with nothing available.
    async fn next(&self) -> Result<Option<(String, DispatchOperation)>, DispatchError>;
}
