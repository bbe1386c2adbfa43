use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{
    DeliveryAttempt, Message, MessageSearchFilters, Page, WebhookConfig, WebhookHealthStats,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable persistence of configs, messages, attempts, and health stats.
/// Every method is atomic; multi-column transitions use conditional updates
/// (compare-and-set on status) so the Delivery Worker and Retry Scheduler
/// never lose an update to each other. The Store is the sole mutator of
/// persistent state — workers hold only immutable snapshots during a
/// delivery cycle.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_active_config_by_name(&self, name: &str) -> StoreResult<WebhookConfig>;
    async fn get_config(&self, id: &str) -> StoreResult<WebhookConfig>;
    async fn insert_config(&self, config: WebhookConfig) -> StoreResult<()>;
    async fn deactivate_config(&self, name: &str) -> StoreResult<()>;

    async fn insert_message(&self, message: Message) -> StoreResult<()>;
    async fn get_message(&self, id: &str) -> StoreResult<Message>;

    /// Transitions `id` from PENDING or FAILED-due-for-retry to PROCESSING.
    /// Returns the number of rows changed: `1` if this call won the race,
    /// `0` if another worker already claimed it.
    async fn mark_processing(&self, id: &str) -> StoreResult<u64>;
    async fn mark_delivered(&self, id: &str) -> StoreResult<()>;
    async fn mark_failed(
        &self,
        id: &str,
        error_message: &str,
        next_retry: Option<f64>,
    ) -> StoreResult<()>;
    async fn increment_retry_count(&self, id: &str) -> StoreResult<()>;

    /// Overrides the delivery target for a single message, e.g. a
    /// `destination_url` supplied on a manual/bulk retry request.
    async fn set_message_target_url(&self, id: &str, target_url: &str) -> StoreResult<()>;

    /// Transitions `id` to CANCELLED from PENDING|FAILED|PROCESSING. Returns
    /// whether the call mutated the row (`false` if already terminal).
    async fn cancel_message(&self, id: &str) -> StoreResult<bool>;

    async fn find_messages_for_retry(&self, now: f64, limit: u64) -> StoreResult<Vec<String>>;
    async fn find_pending_messages(&self, limit: u64) -> StoreResult<Vec<String>>;
    async fn find_stuck_messages(&self, threshold: f64) -> StoreResult<Vec<String>>;
    async fn search_messages(
        &self,
        filters: &MessageSearchFilters,
        page: Page,
    ) -> StoreResult<Vec<Message>>;

    async fn append_attempt(&self, attempt: DeliveryAttempt) -> StoreResult<()>;
    async fn get_attempts(&self, message_id: &str, limit: u64) -> StoreResult<Vec<DeliveryAttempt>>;

    async fn record_success(&self, config_id: &str, latency_ms: f64) -> StoreResult<()>;
    async fn record_failure(&self, config_id: &str, reason: &str) -> StoreResult<()>;
    async fn get_health_stats(&self, config_id: &str) -> StoreResult<WebhookHealthStats>;

    async fn delete_old_messages(
        &self,
        cutoff: f64,
        statuses: &[crate::types::MessageStatus],
        batch_size: u64,
    ) -> StoreResult<u64>;
    async fn delete_old_attempts(&self, cutoff: f64, batch_size: u64) -> StoreResult<u64>;
}
