use crate::store::OfferStore;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// One shared periodic tick for every offer in a store.
pub struct CountdownScheduler {
    interval: Duration,
}

impl CountdownScheduler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms.max(1)),
        }
    }

    /// Start ticking `store`. The tick keeps running while the queue is empty
    /// so offers ingested between ticks are picked up on the next one.
    pub fn start(&self, store: OfferStore) -> CountdownHandle {
        let period = self.interval;
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let report = store.tick().await;
                if !report.expired.is_empty() {
                    debug!(expired = report.expired.len(), pending = report.pending, "Countdown pruned offers");
                }
            }
        });

        CountdownHandle { task: Some(task) }
    }
}

impl Default for CountdownScheduler {
    fn default() -> Self {
        Self::new(1_000)
    }
}

/// Stops the countdown when dropped.
pub struct CountdownHandle {
    task: Option<JoinHandle<()>>,
}

impl CountdownHandle {
    pub fn stop(mut self) {
        self.abort();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OfferKey;
    use crate::store::testing::{harness, AckBehavior};
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_expires_offer_ingested_while_idle() {
        let h = harness(AckBehavior::Reply(json!({ "ok": true })));
        let handle = CountdownScheduler::new(1_000).start(h.store.clone());

        // Several idle ticks before anything arrives.
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        h.store.ingest(json!({ "jobId": "J1", "slaSeconds": 2 })).await;

        h.clock.set(1_000);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(h.store.get(&OfferKey::new("J1", 0)).await.unwrap().remaining_seconds, 1);

        h.clock.set(2_000);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert!(h.store.is_empty().await);
        assert!(handle.is_running());

        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_ticks() {
        let h = harness(AckBehavior::Reply(json!({ "ok": true })));
        h.store.ingest(json!({ "jobId": "J1", "slaSeconds": 1 })).await;

        let handle = CountdownScheduler::new(1_000).start(h.store.clone());
        tokio::task::yield_now().await;
        drop(handle);

        h.clock.set(5_000);
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(h.store.len().await, 1);
    }
}
