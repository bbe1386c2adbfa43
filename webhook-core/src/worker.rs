use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{info, instrument, warn};

use crate::backoff::{self, ResponseHint};
use crate::config::EngineConfig;
use crate::dispatcher::DispatchOperation;
use crate::store::Store;
use crate::types::{DeliveryAttempt, Message, WebhookConfig};

/// Status codes that are retriable even though they are not in the 5xx
/// range (per §4.5 step 8).
const RETRIABLE_4XX_LIKE: &[u16] = &[408, 423, 425, 429, 449];

fn now_ms() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as f64
}

/// Consumes message ids from the events or retries channel: loads the
/// message and its config, POSTs to the target, classifies the outcome, and
/// materializes the result as a terminal or scheduled state transition.
/// Errors never escape past that transition — there is no error return path
/// out of `handle`.
pub struct DeliveryWorker {
    store: Arc<dyn Store>,
    client: Arc<reqwest::Client>,
    config: Arc<EngineConfig>,
    node_identifier: Option<String>,
}

impl DeliveryWorker {
    pub fn new(store: Arc<dyn Store>, client: Arc<reqwest::Client>, config: Arc<EngineConfig>) -> Self {
        let node_identifier = config.node_identifier.clone();
        Self { store, client, config, node_identifier }
    }

    #[instrument(skip(self), fields(message_id = %message_id))]
    pub async fn handle(&self, message_id: &str, op: DispatchOperation) {
        let started = Instant::now();

        let message = match self.store.get_message(message_id).await {
            Ok(m) => m,
            Err(_) => {
                warn!("message not found, dropping");
                return;
            }
        };

        let config = match self.store.get_config(&message.webhook_config_id).await {
            Ok(c) => c,
            Err(_) => {
                warn!("webhook config not found, dropping");
                return;
            }
        };

        if !config.active {
            let _ = self.store.cancel_message(message_id).await;
            return;
        }

        let rows_changed = match self.store.mark_processing(message_id).await {
            Ok(n) => n,
            Err(_) => return,
        };
        if rows_changed == 0 {
            // Another worker already owns this message (or it is no longer
            // claimable); this is the expected outcome under contention, not
            // an error.
            return;
        }

        if matches!(op, DispatchOperation::Retry) {
            let _ = self.store.increment_retry_count(message_id).await;
        }

        // Re-load after the increment so retry_count/created_at reflect the
        // up-to-date row for the exhaustion/expiry check below.
        let message = match self.store.get_message(message_id).await {
            Ok(m) => m,
            Err(_) => return,
        };

        let now = now_ms();
        let expired = message.created_at + (config.max_age_s as f64 * 1000.0) < now;
        let exhausted = message.retry_count > config.max_retries;
        if expired || exhausted {
            let reason = if expired { "expired" } else { "exhausted" };
            let _ = self.store.mark_failed(message_id, reason, None).await;
            let _ = self.store.record_failure(&config.id, reason).await;
            return;
        }

        self.deliver(&message, &config, started).await;
    }

    async fn deliver(&self, message: &Message, config: &WebhookConfig, started: Instant) {
        let mut request = self
            .client
            .post(&message.target_url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", &message.signature)
            .header("X-Webhook-ID", &message.id)
            .timeout(Duration::from_millis(self.config.read_timeout_ms));

        if message.retry_count > 0 {
            request = request.header("X-Webhook-Retry-Count", message.retry_count.to_string());
        }
        if let Some(ref headers) = config.headers {
            for (k, v) in headers {
                request = request.header(k, v);
            }
        }

        let outcome = request.body(message.payload.clone()).send().await;
        let duration_ms = started.elapsed().as_millis() as u64;
        let attempt_number = message.retry_count + 1;

        let (status_code, response_body, response_headers, error) = match outcome {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let headers: std::collections::HashMap<String, String> = resp
                    .headers()
                    .iter()
                    .take(32)
                    .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                    .collect();
                let body = resp.text().await.unwrap_or_default();
                let truncated = crate::types::truncate_utf8(&body, self.config.max_response_log_length);
                (Some(status), Some(truncated), Some(headers), None)
            }
            Err(e) => (None, None, None, Some(e.to_string())),
        };

        let attempt = DeliveryAttempt {
            id: ulid::Ulid::new().to_string(),
            message_id: message.id.clone(),
            attempt_number,
            timestamp: now_ms(),
            target_url: message.target_url.clone(),
            status_code,
            response_body,
            response_headers,
            request_duration_ms: duration_ms,
            error: error.clone(),
            processing_node: self.node_identifier.clone(),
        };
        let _ = self.store.append_attempt(attempt).await;

        if duration_ms >= self.config.critical_execution_threshold_ms {
            warn!(duration_ms, "delivery cycle exceeded critical execution threshold");
        } else if duration_ms >= self.config.slow_execution_threshold_ms {
            warn!(duration_ms, "delivery cycle exceeded slow execution threshold");
        }

        match classify(status_code, error.as_deref()) {
            Classification::Success => {
                let _ = self.store.mark_delivered(&message.id).await;
                let _ = self.store.record_success(&config.id, duration_ms as f64).await;
                info!(status_code, duration_ms, "delivered");
            }
            Classification::Permanent(reason) => {
                let _ = self.store.mark_failed(&message.id, &reason, None).await;
                let _ = self.store.record_failure(&config.id, &reason).await;
            }
            Classification::Retriable(reason) => {
                self.schedule_retry(message, config, &reason).await;
            }
        }
    }

    async fn schedule_retry(&self, message: &Message, config: &WebhookConfig, reason: &str) {
        if message.retry_count >= config.max_retries {
            let _ = self.store.mark_failed(&message.id, "exhausted", None).await;
            let _ = self.store.record_failure(&config.id, "exhausted").await;
            return;
        }

        let hint = reason
            .split_whitespace()
            .find_map(|tok| tok.parse::<u16>().ok())
            .map(ResponseHint::from_status)
            .unwrap_or(ResponseHint::Other);

        let delay_s = backoff::delay(
            config.backoff_strategy,
            config.initial_interval_s,
            config.backoff_factor,
            config.max_interval_s,
            message.retry_count,
            hint,
        );
        let next_retry = now_ms() + (delay_s as f64 * 1000.0);

        let _ = self.store.mark_failed(&message.id, reason, Some(next_retry)).await;
        let _ = self.store.record_failure(&config.id, reason).await;
    }
}

enum Classification {
    Success,
    Permanent(String),
    Retriable(String),
}

fn classify(status_code: Option<u16>, error: Option<&str>) -> Classification {
    if let Some(status) = status_code {
        if (200..300).contains(&status) {
            return Classification::Success;
        }
        if (500..600).contains(&status) || RETRIABLE_4XX_LIKE.contains(&status) {
            return Classification::Retriable(format!("HTTP {status}"));
        }
        return Classification::Permanent(format!("HTTP {status}"));
    }

    let reason = error.unwrap_or("unknown error").to_string();
    if is_connection_class_error(&reason) {
        Classification::Retriable(reason)
    } else {
        Classification::Permanent(reason)
    }
}

fn is_connection_class_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["timed out", "timeout", "connect", "connection", "dns", "socket", "reset"]
        .iter()
        .any(|needle| lower.contains(needle))
}
