use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, instrument, warn};

use crate::config::EngineConfig;
use crate::store::Store;
use crate::types::MessageStatus;

fn now_ms() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as f64
}

/// Background jobs with no externally-driven trigger: recovering messages
/// stuck in PROCESSING (a worker died mid-delivery) and batched retention
/// cleanup of terminal messages and their attempts. Both loops are no-ops
/// when `cleanup_enabled` is false, except the stuck detector, which always
/// runs — a crashed worker leaving a message stranded in PROCESSING is not
/// a retention concern.
pub struct Maintenance {
    store: Arc<dyn Store>,
    config: Arc<EngineConfig>,
}

impl Maintenance {
    pub fn new(store: Arc<dyn Store>, config: Arc<EngineConfig>) -> Self {
        Self { store, config }
    }

    pub async fn run_stuck_detector(&self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.stuck_detector_interval_min * 60));
        loop {
            interval.tick().await;
            self.recover_stuck_messages().await;
        }
    }

    #[instrument(skip(self))]
    pub async fn recover_stuck_messages(&self) {
        let threshold = now_ms() - (self.config.stuck_threshold_min as f64 * 60_000.0);
        let ids = match self.store.find_stuck_messages(threshold).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "failed to query stuck messages");
                return;
            }
        };
        if ids.is_empty() {
            return;
        }

        let next_retry = now_ms() + (self.config.stuck_next_retry_offset_min as f64 * 60_000.0);
        for id in &ids {
            if let Err(e) = self.store.mark_failed(id, "recovered from stuck", Some(next_retry)).await {
                warn!(message_id = %id, error = %e, "failed to recover stuck message");
            }
        }
        info!(count = ids.len(), "recovered stuck messages");
    }

    pub async fn run_retention_cleanup(&self) {
        if !self.config.cleanup_enabled {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_secs(3_600));
        loop {
            interval.tick().await;
            self.clean_once().await;
        }
    }

    #[instrument(skip(self))]
    pub async fn clean_once(&self) {
        if !self.config.cleanup_enabled {
            return;
        }

        let now = now_ms();
        let day_ms = 86_400_000.0;

        let plans: &[(MessageStatus, u64)] = &[
            (MessageStatus::Delivered, self.config.delivered_retention_days),
            (MessageStatus::Failed, self.config.failed_retention_days),
            (MessageStatus::Cancelled, self.config.cancelled_retention_days),
        ];

        for (status, retention_days) in plans {
            let cutoff = now - (*retention_days as f64 * day_ms);
            match self
                .store
                .delete_old_messages(cutoff, std::slice::from_ref(status), self.config.clean_batch_size)
                .await
            {
                Ok(n) if n > 0 => info!(status = ?status, deleted = n, "cleaned up messages"),
                Ok(_) => {}
                Err(e) => warn!(status = ?status, error = %e, "message cleanup failed"),
            }
        }

        let attempts_cutoff = now - (self.config.attempts_retention_days as f64 * day_ms);
        match self.store.delete_old_attempts(attempts_cutoff, self.config.clean_batch_size).await {
            Ok(n) if n > 0 => info!(deleted = n, "cleaned up delivery attempts"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "attempt cleanup failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::types::{BackoffStrategy, Message, WebhookConfig};

    fn config_with(cleanup_enabled: bool) -> Arc<EngineConfig> {
        let mut config = EngineConfig::default();
        config.cleanup_enabled = cleanup_enabled;
        config.delivered_retention_days = 1;
        config.failed_retention_days = 1;
        config.cancelled_retention_days = 1;
        config.attempts_retention_days = 1;
        Arc::new(config)
    }

    fn old_delivered_message(id: &str) -> Message {
        Message {
            id: id.to_string(),
            webhook_config_id: "cfg_1".to_string(),
            payload: "{}".to_string(),
            target_url: "https://example.test/hook".to_string(),
            signature: "sha256=deadbeef".to_string(),
            headers: None,
            status: MessageStatus::Delivered,
            retry_count: 0,
            next_retry: None,
            last_error: None,
            created_at: 0.0,
            updated_at: 0.0, // far in the past relative to "now"
            processing_node: None,
        }
    }

    fn stuck_processing_message(id: &str) -> Message {
        Message {
            id: id.to_string(),
            webhook_config_id: "cfg_1".to_string(),
            payload: "{}".to_string(),
            target_url: "https://example.test/hook".to_string(),
            signature: "sha256=deadbeef".to_string(),
            headers: None,
            status: MessageStatus::Processing,
            retry_count: 0,
            next_retry: None,
            last_error: None,
            created_at: 0.0,
            updated_at: 0.0,
            processing_node: Some("node-a".to_string()),
        }
    }

    fn webhook_config() -> WebhookConfig {
        WebhookConfig {
            id: "cfg_1".into(),
            name: "orders".into(),
            target_url: "https://example.test/hook".into(),
            secret: "s3cr3t".into(),
            active: true,
            max_retries: 5,
            backoff_strategy: BackoffStrategy::Fixed,
            initial_interval_s: 1,
            backoff_factor: 2.0,
            max_interval_s: 60,
            max_age_s: 86_400,
            headers: None,
            created_at: 0.0,
            updated_at: 0.0,
        }
    }

    #[tokio::test]
    async fn recover_stuck_messages_reschedules_them() {
        let store = Arc::new(MemoryStore::new());
        store.insert_config(webhook_config()).await.unwrap();
        store.insert_message(stuck_processing_message("msg_stuck")).await.unwrap();

        let maintenance = Maintenance::new(store.clone(), config_with(true));
        maintenance.recover_stuck_messages().await;

        let message = store.get_message("msg_stuck").await.unwrap();
        assert_eq!(message.status, MessageStatus::Failed);
        assert!(message.next_retry.is_some());
    }

    #[tokio::test]
    async fn clean_once_removes_old_delivered_messages() {
        let store = Arc::new(MemoryStore::new());
        store.insert_config(webhook_config()).await.unwrap();
        store.insert_message(old_delivered_message("msg_old")).await.unwrap();

        let maintenance = Maintenance::new(store.clone(), config_with(true));
        maintenance.clean_once().await;

        assert!(store.get_message("msg_old").await.is_err());
    }

    #[tokio::test]
    async fn clean_once_is_noop_when_disabled() {
        let store = Arc::new(MemoryStore::new());
        store.insert_config(webhook_config()).await.unwrap();
        store.insert_message(old_delivered_message("msg_old")).await.unwrap();

        let maintenance = Maintenance::new(store.clone(), config_with(false));
        maintenance.clean_once().await;

        assert!(store.get_message("msg_old").await.is_ok());
    }
}
