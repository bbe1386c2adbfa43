use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─── Message status ─────────────────────────────────────────────────────────

/// Canonical status representation: a single typed enum, never a parallel
/// string field. Textual storage backends round-trip through `Display`/`FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
    Cancelled,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Processing => "processing",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Failed => "failed",
            MessageStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "processing" => Ok(MessageStatus::Processing),
            "delivered" => Ok(MessageStatus::Delivered),
            "failed" => Ok(MessageStatus::Failed),
            "cancelled" => Ok(MessageStatus::Cancelled),
            other => Err(format!("unknown message status: {other}")),
        }
    }
}

// ─── Backoff strategy ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
}

// ─── WebhookConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub id: String,
    pub name: String,
    pub target_url: String,
    pub secret: String,
    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_strategy")]
    pub backoff_strategy: BackoffStrategy,
    #[serde(default = "default_initial_interval_s")]
    pub initial_interval_s: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_interval_s")]
    pub max_interval_s: u64,
    #[serde(default = "default_max_age_s")]
    pub max_age_s: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    pub created_at: f64,
    pub updated_at: f64,
}

fn default_true() -> bool {
    true
}
fn default_max_retries() -> u32 {
    5
}
fn default_backoff_strategy() -> BackoffStrategy {
    BackoffStrategy::Exponential
}
fn default_initial_interval_s() -> u64 {
    1
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_max_interval_s() -> u64 {
    3_600
}
fn default_max_age_s() -> u64 {
    86_400
}

/// Matches `WebhookConfig.name` against the required pattern
/// `[A-Za-z0-9_.\-]{1,64}`.
pub fn is_valid_webhook_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    name.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

// ─── Message ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub webhook_config_id: String,
    pub payload: String,
    pub target_url: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    pub status: MessageStatus,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: f64,
    pub updated_at: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_node: Option<String>,
}

impl Message {
    /// A message is terminal when no further worker-driven transition can
    /// occur: DELIVERED, CANCELLED, or FAILED with no retry scheduled.
    pub fn is_terminal(&self) -> bool {
        match self.status {
            MessageStatus::Delivered | MessageStatus::Cancelled => true,
            MessageStatus::Failed => self.next_retry.is_none(),
            MessageStatus::Pending | MessageStatus::Processing => false,
        }
    }
}

// ─── DeliveryAttempt ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAttempt {
    pub id: String,
    pub message_id: String,
    pub attempt_number: u32,
    pub timestamp: f64,
    pub target_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<HashMap<String, String>>,
    pub request_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_node: Option<String>,
}

/// Truncate `s` to at most `max_len` bytes on a UTF-8 boundary.
pub fn truncate_utf8(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

// ─── WebhookHealthStats ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookHealthStats {
    pub webhook_config_id: String,
    pub webhook_name: String,
    #[serde(default)]
    pub total_sent: u64,
    #[serde(default)]
    pub total_delivered: u64,
    #[serde(default)]
    pub total_failed: u64,
    #[serde(default)]
    pub avg_response_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub updated_at: f64,
}

impl WebhookHealthStats {
    pub fn new(webhook_config_id: impl Into<String>, webhook_name: impl Into<String>, now: f64) -> Self {
        Self {
            webhook_config_id: webhook_config_id.into(),
            webhook_name: webhook_name.into(),
            total_sent: 0,
            total_delivered: 0,
            total_failed: 0,
            avg_response_time_ms: 0.0,
            last_success_time: None,
            last_error_time: None,
            last_error: None,
            updated_at: now,
        }
    }

    /// `success_rate` is a percentage in `[0, 100]`; undefined (returned as
    /// `None`) when `total_sent == 0`.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_sent == 0 {
            return None;
        }
        Some((self.total_delivered as f64 / self.total_sent as f64) * 100.0)
    }
}

// ─── Search / pagination ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_config_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_after: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default = "default_page_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_page_limit() -> u32 {
    50
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: default_page_limit(), offset: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_webhook_names() {
        assert!(is_valid_webhook_name("order.created"));
        assert!(is_valid_webhook_name("order_created-v2"));
        assert!(is_valid_webhook_name("A"));
    }

    #[test]
    fn invalid_webhook_names() {
        assert!(!is_valid_webhook_name(""));
        assert!(!is_valid_webhook_name("has space"));
        assert!(!is_valid_webhook_name("has/slash"));
        assert!(!is_valid_webhook_name(&"a".repeat(65)));
    }

    #[test]
    fn message_terminal_states() {
        let mut msg = base_message();
        msg.status = MessageStatus::Delivered;
        assert!(msg.is_terminal());

        msg.status = MessageStatus::Cancelled;
        assert!(msg.is_terminal());

        msg.status = MessageStatus::Failed;
        msg.next_retry = None;
        assert!(msg.is_terminal());

        msg.next_retry = Some(123.0);
        assert!(!msg.is_terminal());

        msg.status = MessageStatus::Pending;
        assert!(!msg.is_terminal());
    }

    #[test]
    fn success_rate_undefined_when_no_sends() {
        let stats = WebhookHealthStats::new("cfg_1", "n", 0.0);
        assert_eq!(stats.success_rate(), None);
    }

    #[test]
    fn success_rate_computed() {
        let mut stats = WebhookHealthStats::new("cfg_1", "n", 0.0);
        stats.total_sent = 4;
        stats.total_delivered = 3;
        assert_eq!(stats.success_rate(), Some(75.0));
    }

    #[test]
    fn truncate_utf8_within_limit_unchanged() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
    }

    #[test]
    fn truncate_utf8_respects_char_boundary() {
        let s = "héllo"; // 'é' is 2 bytes in UTF-8
        let truncated = truncate_utf8(s, 2);
        assert!(s.as_bytes().len() >= truncated.as_bytes().len());
        assert!(std::str::from_utf8(truncated.as_bytes()).is_ok());
    }

    fn base_message() -> Message {
        Message {
            id: "msg_1".to_string(),
            webhook_config_id: "cfg_1".to_string(),
            payload: "{}".to_string(),
            target_url: "http://example.test".to_string(),
            signature: "sha256=deadbeef".to_string(),
            headers: None,
            status: MessageStatus::Pending,
            retry_count: 0,
            next_retry: None,
            last_error: None,
            created_at: 0.0,
            updated_at: 0.0,
            processing_node: None,
        }
    }
}
