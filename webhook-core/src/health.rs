use serde::{Deserialize, Serialize};

use crate::types::WebhookHealthStats;

/// EWMA smoothing factor applied to new latency samples (`alpha` in the
/// design notes).
pub const EWMA_ALPHA: f64 = 0.3;

/// `avg' = avg == 0 ? latency : (1 - alpha) * avg + alpha * latency`.
pub fn ewma_update(current_avg: f64, new_sample: f64) -> f64 {
    if current_avg == 0.0 {
        new_sample
    } else {
        (1.0 - EWMA_ALPHA) * current_avg + EWMA_ALPHA * new_sample
    }
}

/// `total_sent >= min_sent && success_rate < min_rate` (rate is a
/// percentage in `[0, 100]`, matching `WebhookHealthStats::success_rate`).
pub fn unhealthy(stats: &WebhookHealthStats, min_sent: u64, min_rate: f64) -> bool {
    if stats.total_sent < min_sent {
        return false;
    }
    match stats.success_rate() {
        Some(rate) => rate < min_rate,
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceHealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: ServiceHealthStatus,
    pub pending_messages: u64,
    pub unhealthy_webhooks: u64,
    pub broker_available: Option<bool>,
}

/// Classify overall service health from: the pending-messages backlog, the
/// count of unhealthy webhooks, and broker availability (only meaningful in
/// broker mode; `None` in direct mode).
///
/// - `Unhealthy`: broker unavailable when one is expected, or more than half
///   of observed webhooks (at least one) are unhealthy.
/// - `Degraded`: any unhealthy webhook, or a pending backlog above
///   `pending_warn_threshold`.
/// - `Healthy`: otherwise.
pub fn service_health(
    pending_messages: u64,
    unhealthy_webhooks: u64,
    total_webhooks: u64,
    broker_available: Option<bool>,
    pending_warn_threshold: u64,
) -> ServiceHealth {
    let status = if broker_available == Some(false) {
        ServiceHealthStatus::Unhealthy
    } else if total_webhooks > 0 && unhealthy_webhooks * 2 >= total_webhooks {
        ServiceHealthStatus::Unhealthy
    } else if unhealthy_webhooks > 0 || pending_messages > pending_warn_threshold {
        ServiceHealthStatus::Degraded
    } else {
        ServiceHealthStatus::Healthy
    };

    ServiceHealth { status, pending_messages, unhealthy_webhooks, broker_available }
}
