use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::dispatcher::Dispatcher;
use crate::error::{DeliveryError, DeliveryErrorKind, Phase};
use crate::state_machine::can_cancel;
use crate::store::Store;
use crate::types::{
    is_valid_webhook_name, Message, MessageSearchFilters, MessageStatus, Page, WebhookConfig,
    WebhookHealthStats,
};

/// Selects the set of messages a bulk-retry call applies to: an explicit id
/// list takes precedence; otherwise FAILED messages are selected by age
/// (`time_range_hours`) and capped at `limit`. `destination_url`, if set, is
/// applied to every selected message before it is retried.
#[derive(Debug, Default, Clone)]
pub struct BulkRetryRequest {
    pub message_ids: Option<Vec<String>>,
    pub time_range_hours: Option<f64>,
    pub limit: Option<u32>,
    pub destination_url: Option<String>,
}

fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as f64
}

fn not_found(phase: Phase, id: &str) -> DeliveryError {
    DeliveryError::new(DeliveryErrorKind::ResourceNotFound, phase).with_message_id(id)
}

/// The out-of-band management surface: everything a caller does to a
/// message or webhook config *after* ingestion has already happened.
/// Ingestion itself lives in [`crate::ingestion::Ingestion`] — that port only
/// ever moves a message PENDING -> enqueued, never touches an existing one.
pub struct Management {
    store: Arc<dyn Store>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Management {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { store, dispatcher }
    }

    pub async fn register_webhook(&self, config: WebhookConfig) -> Result<(), DeliveryError> {
        if !is_valid_webhook_name(&config.name) {
            return Err(DeliveryError::new(DeliveryErrorKind::Configuration, Phase::Validation)
                .with_webhook(config.name.clone())
                .with_cause("webhook name must match [A-Za-z0-9_.-]{1,64}"));
        }
        self.store.insert_config(config).await.map_err(|e| {
            let kind = match e {
                crate::error::StoreError::AlreadyExists => DeliveryErrorKind::ResourceAlreadyExists,
                _ => DeliveryErrorKind::Configuration,
            };
            DeliveryError::new(kind, Phase::Validation).with_cause(e.to_string())
        })
    }

    pub async fn get_message(&self, message_id: &str) -> Result<Message, DeliveryError> {
        self.store
            .get_message(message_id)
            .await
            .map_err(|_| not_found(Phase::Reception, message_id))
    }

    pub async fn search_messages(
        &self,
        filters: &MessageSearchFilters,
        page: Page,
    ) -> Result<Vec<Message>, DeliveryError> {
        self.store
            .search_messages(filters, page)
            .await
            .map_err(|e| DeliveryError::new(DeliveryErrorKind::Configuration, Phase::Reception).with_cause(e.to_string()))
    }

    pub async fn get_webhook_health(&self, config_id: &str) -> Result<WebhookHealthStats, DeliveryError> {
        self.store
            .get_health_stats(config_id)
            .await
            .map_err(|_| not_found(Phase::ResponseHandling, config_id))
    }

    /// Cancels `message_id` if it is not already terminal. Returns `true` if
    /// this call made the transition, `false` if it was already terminal.
    pub async fn cancel_message(&self, message_id: &str) -> Result<bool, DeliveryError> {
        let message = self.get_message(message_id).await?;
        if !can_cancel(message.status) {
            return Ok(false);
        }
        self.store
            .cancel_message(message_id)
            .await
            .map_err(|e| DeliveryError::new(DeliveryErrorKind::StorageConflict, Phase::Cleanup).with_cause(e.to_string()))
    }

    /// Forces an immediate redelivery attempt outside the normal backoff
    /// schedule: only valid for a message currently FAILED-terminal (no
    /// retry already scheduled). PENDING/PROCESSING messages are already on
    /// a path to delivery; DELIVERED/CANCELLED messages are done.
    pub async fn retry_message(&self, message_id: &str) -> Result<(), DeliveryError> {
        let message = self.get_message(message_id).await?;
        if message.status != crate::types::MessageStatus::Failed || message.next_retry.is_some() {
            return Err(DeliveryError::new(DeliveryErrorKind::Configuration, Phase::RetryScheduling)
                .with_message_id(message_id)
                .with_cause("message is not eligible for a manual retry"));
        }

        self.store
            .mark_failed(message_id, "manual retry requested", Some(now_ms()))
            .await
            .map_err(|e| DeliveryError::new(DeliveryErrorKind::StorageConflict, Phase::RetryScheduling).with_cause(e.to_string()))?;

        self.dispatcher
            .publish_retry(message_id)
            .await
            .map_err(DeliveryError::from)
    }

    /// Best-effort bulk retry: every selected id is attempted independently,
    /// and a failure on one does not prevent the rest from being tried.
    /// Returns the ids that were actually rescheduled.
    ///
    /// Selection: `request.message_ids` wins if present; otherwise FAILED
    /// messages created within the last `time_range_hours` (default: no age
    /// bound) are selected, capped at `request.limit` (default 100). If
    /// `request.destination_url` is set, it overrides every selected
    /// message's target before the retry is scheduled.
    pub async fn bulk_retry_messages(&self, request: &BulkRetryRequest) -> Vec<String> {
        let ids = match &request.message_ids {
            Some(ids) => ids.clone(),
            None => self.select_messages_for_bulk_retry(request).await,
        };

        let mut retried = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(ref url) = request.destination_url {
                if self.store.set_message_target_url(id, url).await.is_err() {
                    continue;
                }
            }
            if self.retry_message(id).await.is_ok() {
                retried.push(id.clone());
            }
        }
        retried
    }

    async fn select_messages_for_bulk_retry(&self, request: &BulkRetryRequest) -> Vec<String> {
        let created_after = request.time_range_hours.map(|hours| now_ms() - hours * 3_600_000.0);
        let filters = MessageSearchFilters {
            webhook_config_id: None,
            status: Some(MessageStatus::Failed),
            created_after,
            created_before: None,
        };
        let page = Page { limit: request.limit.unwrap_or(100), offset: 0 };
        self.store
            .search_messages(&filters, page)
            .await
            .map(|messages| messages.into_iter().map(|m| m.id).collect())
            .unwrap_or_default()
    }
}
