use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{DeliveryError, DeliveryErrorKind, Phase};
use crate::signer;
use crate::store::Store;
use crate::types::{is_valid_webhook_name, Message};

fn now_ms() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as f64
}

/// Maximum raw payload size accepted at the inbound port, in bytes.
const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Receives an inbound event for a named, active webhook: validates the
/// name and payload, signs it, persists a PENDING message, and publishes it
/// to the events channel. Returns the new message id.
pub struct Ingestion {
    store: Arc<dyn Store>,
    dispatcher: Arc<dyn Dispatcher>,
    config: Arc<EngineConfig>,
}

impl Ingestion {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<dyn Dispatcher>, config: Arc<EngineConfig>) -> Self {
        Self { store, dispatcher, config }
    }

    #[instrument(skip(self, raw_payload, user_headers), fields(webhook_name = %webhook_name))]
    pub async fn receive(
        &self,
        webhook_name: &str,
        raw_payload: &str,
        user_headers: Option<std::collections::HashMap<String, String>>,
        target_url_override: Option<String>,
    ) -> Result<String, DeliveryError> {
        if !is_valid_webhook_name(webhook_name) {
            return Err(DeliveryError::new(DeliveryErrorKind::Configuration, Phase::Validation)
                .with_webhook(webhook_name)
                .with_cause("invalid webhook name"));
        }
        if raw_payload.is_empty() || raw_payload.len() > MAX_PAYLOAD_BYTES {
            return Err(DeliveryError::new(DeliveryErrorKind::Configuration, Phase::Validation)
                .with_webhook(webhook_name)
                .with_cause("payload missing or exceeds size limit"));
        }

        let config = self
            .store
            .get_active_config_by_name(webhook_name)
            .await
            .map_err(|e| DeliveryError::from(e).with_webhook(webhook_name))?;

        let target_url = self
            .config
            .destination_url_override
            .clone()
            .or(target_url_override)
            .unwrap_or_else(|| config.target_url.clone());

        let canonical_payload = signer::canonicalize(raw_payload);
        let signature = signer::sign(&canonical_payload, &config.secret)
            .map_err(|e| DeliveryError::from(e).with_webhook(webhook_name))?;

        let now = now_ms();
        let message = Message {
            id: ulid::Ulid::new().to_string(),
            webhook_config_id: config.id.clone(),
            payload: canonical_payload,
            target_url,
            signature,
            headers: user_headers,
            status: crate::types::MessageStatus::Pending,
            retry_count: 0,
            next_retry: None,
            last_error: None,
            created_at: now,
            updated_at: now,
            processing_node: None,
        };

        let message_id = message.id.clone();
        self.store
            .insert_message(message)
            .await
            .map_err(|e| DeliveryError::from(e).with_webhook(webhook_name))?;

        self.dispatcher
            .publish_event(&message_id)
            .await
            .map_err(|e| DeliveryError::from(e).with_webhook(webhook_name).with_message_id(&message_id))?;

        info!(message_id = %message_id, "accepted webhook event");
        Ok(message_id)
    }
}
