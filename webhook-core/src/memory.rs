use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::dispatcher::{DispatchOperation, Dispatcher};
use crate::error::{DispatchError, StoreError};
use crate::health::ewma_update;
use crate::state_machine::{can_cancel, can_claim_for_processing};
use crate::store::{Store, StoreResult};
use crate::types::{
    DeliveryAttempt, Message, MessageSearchFilters, MessageStatus, Page, WebhookConfig,
    WebhookHealthStats,
};

fn now_ms() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as f64
}

/// In-process `Store` backed by `Arc<RwLock<HashMap>>`, grounded on the same
/// shape the teacher uses for its in-memory adapters. Used by unit tests and
/// as the persistence layer in direct mode when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    configs_by_id: RwLock<HashMap<String, WebhookConfig>>,
    configs_by_name: RwLock<HashMap<String, String>>,
    messages: RwLock<HashMap<String, Message>>,
    attempts: RwLock<HashMap<String, Vec<DeliveryAttempt>>>,
    health: RwLock<HashMap<String, WebhookHealthStats>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_active_config_by_name(&self, name: &str) -> StoreResult<WebhookConfig> {
        let id = self
            .configs_by_name
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        let config = self.configs_by_id.read().unwrap().get(&id).cloned().ok_or(StoreError::NotFound)?;
        if !config.active {
            return Err(StoreError::NotFound);
        }
        Ok(config)
    }

    async fn get_config(&self, id: &str) -> StoreResult<WebhookConfig> {
        self.configs_by_id.read().unwrap().get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn insert_config(&self, config: WebhookConfig) -> StoreResult<()> {
        let mut by_name = self.configs_by_name.write().unwrap();
        if by_name.contains_key(&config.name) {
            return Err(StoreError::AlreadyExists);
        }
        by_name.insert(config.name.clone(), config.id.clone());
        self.configs_by_id.write().unwrap().insert(config.id.clone(), config);
        Ok(())
    }

    async fn deactivate_config(&self, name: &str) -> StoreResult<()> {
        let id = self.configs_by_name.read().unwrap().get(name).cloned().ok_or(StoreError::NotFound)?;
        let mut by_id = self.configs_by_id.write().unwrap();
        let config = by_id.get_mut(&id).ok_or(StoreError::NotFound)?;
        config.active = false;
        config.updated_at = now_ms();
        Ok(())
    }

    async fn insert_message(&self, message: Message) -> StoreResult<()> {
        let mut messages = self.messages.write().unwrap();
        if messages.contains_key(&message.id) {
            return Err(StoreError::AlreadyExists);
        }
        messages.insert(message.id.clone(), message);
        Ok(())
    }

    async fn get_message(&self, id: &str) -> StoreResult<Message> {
        self.messages.read().unwrap().get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn mark_processing(&self, id: &str) -> StoreResult<u64> {
        let mut messages = self.messages.write().unwrap();
        let message = messages.get_mut(id).ok_or(StoreError::NotFound)?;
        if !can_claim_for_processing(message.status) {
            return Ok(0);
        }
        message.status = MessageStatus::Processing;
        message.updated_at = now_ms();
        Ok(1)
    }

    async fn mark_delivered(&self, id: &str) -> StoreResult<()> {
        let mut messages = self.messages.write().unwrap();
        let message = messages.get_mut(id).ok_or(StoreError::NotFound)?;
        message.status = MessageStatus::Delivered;
        message.next_retry = None;
        message.last_error = None;
        message.updated_at = now_ms();
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error_message: &str, next_retry: Option<f64>) -> StoreResult<()> {
        let mut messages = self.messages.write().unwrap();
        let message = messages.get_mut(id).ok_or(StoreError::NotFound)?;
        message.status = MessageStatus::Failed;
        message.next_retry = next_retry;
        message.last_error = Some(error_message.to_string());
        message.updated_at = now_ms();
        Ok(())
    }

    async fn increment_retry_count(&self, id: &str) -> StoreResult<()> {
        let mut messages = self.messages.write().unwrap();
        let message = messages.get_mut(id).ok_or(StoreError::NotFound)?;
        message.retry_count += 1;
        message.updated_at = now_ms();
        Ok(())
    }

    async fn set_message_target_url(&self, id: &str, target_url: &str) -> StoreResult<()> {
        let mut messages = self.messages.write().unwrap();
        let message = messages.get_mut(id).ok_or(StoreError::NotFound)?;
        message.target_url = target_url.to_string();
        message.updated_at = now_ms();
        Ok(())
    }

    async fn cancel_message(&self, id: &str) -> StoreResult<bool> {
        let mut messages = self.messages.write().unwrap();
        let message = messages.get_mut(id).ok_or(StoreError::NotFound)?;
        if !can_cancel(message.status) {
            return Ok(false);
        }
        message.status = MessageStatus::Cancelled;
        message.next_retry = None;
        message.updated_at = now_ms();
        Ok(true)
    }

    async fn find_messages_for_retry(&self, now: f64, limit: u64) -> StoreResult<Vec<String>> {
        let messages = self.messages.read().unwrap();
        let mut due: Vec<&Message> = messages
            .values()
            .filter(|m| m.status == MessageStatus::Failed && m.next_retry.map(|t| t <= now).unwrap_or(false))
            .collect();
        due.sort_by(|a, b| a.next_retry.partial_cmp(&b.next_retry).unwrap());
        Ok(due.into_iter().take(limit as usize).map(|m| m.id.clone()).collect())
    }

    async fn find_pending_messages(&self, limit: u64) -> StoreResult<Vec<String>> {
        let messages = self.messages.read().unwrap();
        let mut pending: Vec<&Message> =
            messages.values().filter(|m| m.status == MessageStatus::Pending).collect();
        pending.sort_by(|a, b| a.created_at.partial_cmp(&b.created_at).unwrap());
        Ok(pending.into_iter().take(limit as usize).map(|m| m.id.clone()).collect())
    }

    async fn find_stuck_messages(&self, threshold: f64) -> StoreResult<Vec<String>> {
        let messages = self.messages.read().unwrap();
        Ok(messages
            .values()
            .filter(|m| m.status == MessageStatus::Processing && m.updated_at < threshold)
            .map(|m| m.id.clone())
            .collect())
    }

    async fn search_messages(&self, filters: &MessageSearchFilters, page: Page) -> StoreResult<Vec<Message>> {
        let messages = self.messages.read().unwrap();
        let mut matched: Vec<Message> = messages
            .values()
            .filter(|m| {
                filters.webhook_config_id.as_deref().map(|id| id == m.webhook_config_id).unwrap_or(true)
                    && filters.status.map(|s| s == m.status).unwrap_or(true)
                    && filters.created_after.map(|t| m.created_at >= t).unwrap_or(true)
                    && filters.created_before.map(|t| m.created_at <= t).unwrap_or(true)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.partial_cmp(&a.created_at).unwrap());
        let start = page.offset as usize;
        let end = (start + page.limit as usize).min(matched.len());
        Ok(if start >= matched.len() { Vec::new() } else { matched[start..end].to_vec() })
    }

    async fn append_attempt(&self, attempt: DeliveryAttempt) -> StoreResult<()> {
        self.attempts.write().unwrap().entry(attempt.message_id.clone()).or_default().push(attempt);
        Ok(())
    }

    async fn get_attempts(&self, message_id: &str, limit: u64) -> StoreResult<Vec<DeliveryAttempt>> {
        let attempts = self.attempts.read().unwrap();
        Ok(attempts
            .get(message_id)
            .map(|v| v.iter().rev().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn record_success(&self, config_id: &str, latency_ms: f64) -> StoreResult<()> {
        let name = self.config_name(config_id);
        let mut health = self.health.write().unwrap();
        let stats = health
            .entry(config_id.to_string())
            .or_insert_with(|| WebhookHealthStats::new(config_id, name, now_ms()));
        stats.total_sent += 1;
        stats.total_delivered += 1;
        stats.avg_response_time_ms = ewma_update(stats.avg_response_time_ms, latency_ms);
        stats.last_success_time = Some(now_ms());
        stats.updated_at = now_ms();
        Ok(())
    }

    async fn record_failure(&self, config_id: &str, reason: &str) -> StoreResult<()> {
        let name = self.config_name(config_id);
        let mut health = self.health.write().unwrap();
        let stats = health
            .entry(config_id.to_string())
            .or_insert_with(|| WebhookHealthStats::new(config_id, name, now_ms()));
        stats.total_sent += 1;
        stats.total_failed += 1;
        stats.last_error_time = Some(now_ms());
        stats.last_error = Some(reason.to_string());
        stats.updated_at = now_ms();
        Ok(())
    }

    async fn get_health_stats(&self, config_id: &str) -> StoreResult<WebhookHealthStats> {
        self.health
            .read()
            .unwrap()
            .get(config_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete_old_messages(
        &self,
        cutoff: f64,
        statuses: &[MessageStatus],
        batch_size: u64,
    ) -> StoreResult<u64> {
        let mut messages = self.messages.write().unwrap();
        let ids: Vec<String> = messages
            .values()
            .filter(|m| statuses.contains(&m.status) && m.updated_at < cutoff)
            .take(batch_size as usize)
            .map(|m| m.id.clone())
            .collect();
        for id in &ids {
            messages.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn delete_old_attempts(&self, cutoff: f64, batch_size: u64) -> StoreResult<u64> {
        let mut attempts = self.attempts.write().unwrap();
        let mut removed = 0u64;
        for bucket in attempts.values_mut() {
            let before = bucket.len();
            bucket.retain(|a| a.timestamp >= cutoff);
            removed += (before - bucket.len()) as u64;
            if removed >= batch_size {
                break;
            }
        }
        Ok(removed)
    }
}

impl MemoryStore {
    fn config_name(&self, config_id: &str) -> String {
        self.configs_by_id
            .read()
            .unwrap()
            .get(config_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| config_id.to_string())
    }
}

/// In-process dispatch fabric for direct mode: a bounded `tokio::sync::mpsc`
/// channel shared by the events and retries paths, wrapped in a `Mutex` so
/// `Dispatcher::next` has a single receiver across however many workers poll
/// it concurrently.
pub struct MemoryDispatcher {
    sender: tokio::sync::mpsc::Sender<(String, DispatchOperation)>,
    receiver: Mutex<tokio::sync::mpsc::Receiver<(String, DispatchOperation)>>,
}

impl MemoryDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = tokio::sync::mpsc::channel(capacity);
        Self { sender, receiver: Mutex::new(receiver) }
    }
}

#[async_trait]
impl Dispatcher for MemoryDispatcher {
    async fn publish_event(&self, message_id: &str) -> Result<(), DispatchError> {
        self.sender
            .send((message_id.to_string(), DispatchOperation::Process))
            .await
            .map_err(|_| DispatchError::TransportUnavailable("channel closed".to_string()))
    }

    async fn publish_retry(&self, message_id: &str) -> Result<(), DispatchError> {
        self.sender
            .send((message_id.to_string(), DispatchOperation::Retry))
            .await
            .map_err(|_| DispatchError::TransportUnavailable("channel closed".to_string()))
    }

    async fn next(&self) -> Result<Option<(String, DispatchOperation)>, DispatchError> {
        let mut receiver = self.receiver.lock().await;
        Ok(receiver.recv().await)
    }
}
