use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::store::Store;

fn now_ms() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as f64
}

/// Periodically scans for messages whose `next_retry` has elapsed and
/// re-publishes them onto the retries channel. Overlapping ticks are safe:
/// the publish is at-least-once and the Delivery Worker's `mark_processing`
/// CAS is what actually prevents double delivery.
pub struct RetryScheduler {
    store: Arc<dyn Store>,
    dispatcher: Arc<dyn Dispatcher>,
    config: Arc<EngineConfig>,
}

impl RetryScheduler {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<dyn Dispatcher>, config: Arc<EngineConfig>) -> Self {
        Self { store, dispatcher, config }
    }

    pub async fn run(&self) {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.retry_scheduler_interval_ms));
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    #[instrument(skip(self))]
    pub async fn tick(&self) {
        let ids = match self
            .store
            .find_messages_for_retry(now_ms(), self.config.retry_batch_size)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "failed to query due retries");
                return;
            }
        };

        if ids.is_empty() {
            return;
        }
        debug!(count = ids.len(), "publishing due retries");

        for id in ids {
            if let Err(e) = self.dispatcher.publish_retry(&id).await {
                // One message's publish failure must never abort the batch;
                // it remains due and is picked up again next tick.
                warn!(message_id = %id, error = %e, "failed to publish retry");
            }
        }
    }
}
