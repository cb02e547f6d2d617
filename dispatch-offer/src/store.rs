use crate::alerts::{AlertSink, Notice};
use crate::models::{Offer, OfferKey};
use crate::queue::{IngestOutcome, OfferQueue, QueueError, RevertOutcome, TickReport};
use dispatch_core::{Clock, CoreError, EventChannel, KeyValueStorage, SystemClock};
use dispatch_shared::events::{Decision, JobAlertExpiredEvent, JobResponseAck, JOB_RESPONSE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

pub const STORAGE_NAMESPACE: &str = "mechanic_requests_v1";

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub namespace: String,
    pub default_sla_seconds: u64,
    pub decision_ack_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            namespace: STORAGE_NAMESPACE.to_string(),
            default_sla_seconds: 120,
            decision_ack_timeout: Duration::from_secs(10),
        }
    }
}

/// How a `decide` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// The server answered. The offer is gone either way; `ok` says whether the decision was honoured.
    Acknowledged { ok: bool, message: Option<String> },
    /// No acknowledgement in time. The offer is pending again.
    TimedOut,
    /// The transport refused or lost the message. The offer is pending again.
    Undelivered(String),
    /// Unknown key or a decision already in flight. Nothing was sent.
    Skipped,
}

/// Single owner of the mechanic's offer queue.
///
/// Cheap to clone; all clones share one queue. Every mutation is written back
/// to storage while the queue lock is held, so writes are serialized. The lock
/// is never held across a decision acknowledgement.
#[derive(Clone)]
pub struct OfferStore {
    inner: Arc<Inner>,
}

struct Inner {
    queue: Mutex<OfferQueue>,
    channel: Arc<dyn EventChannel>,
    storage: Arc<dyn KeyValueStorage>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    settings: StoreSettings,
    snapshot_tx: watch::Sender<Vec<Offer>>,
    storage_degraded: AtomicBool,
}

impl OfferStore {
    pub fn new(
        channel: Arc<dyn EventChannel>,
        storage: Arc<dyn KeyValueStorage>,
        alerts: Arc<dyn AlertSink>,
        settings: StoreSettings,
    ) -> Self {
        Self::with_clock(channel, storage, alerts, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        channel: Arc<dyn EventChannel>,
        storage: Arc<dyn KeyValueStorage>,
        alerts: Arc<dyn AlertSink>,
        settings: StoreSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(OfferQueue::new(settings.default_sla_seconds)),
                channel,
                storage,
                alerts,
                clock,
                settings,
                snapshot_tx,
                storage_degraded: AtomicBool::new(false),
            }),
        }
    }

    /// Visible offers, republished after every mutation and every tick.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Offer>> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    /// Load the persisted queue, discarding offers whose deadline has passed.
    pub async fn restore(&self) -> usize {
        let now = self.now_ms();
        let persisted = match self.inner.storage.load(&self.inner.settings.namespace).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Offer>>(&raw) {
                Ok(offers) => offers,
                Err(e) => {
                    warn!(namespace = %self.inner.settings.namespace, "Discarding unreadable offer state: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                self.storage_failed(&e);
                Vec::new()
            }
        };

        let mut queue = self.inner.queue.lock().await;
        let report = queue.restore(persisted, now);
        info!(kept = report.kept, dropped = report.dropped, "Restored offer queue");

        self.persist(&queue).await;
        self.publish(&queue);
        if !queue.is_empty() {
            self.inner.alerts.start_ring();
        }
        report.kept
    }

    /// Handle a `job_alert` payload.
    pub async fn ingest(&self, payload: serde_json::Value) -> IngestOutcome {
        let now = self.now_ms();
        let mut queue = self.inner.queue.lock().await;
        let was_empty = queue.is_empty();

        let outcome = queue.ingest_payload(&payload, now);
        match &outcome {
            IngestOutcome::Inserted(key) => {
                info!(job_id = %key.job_id, attempt = key.attempt_index, "New job offer");
                self.persist(&queue).await;
                self.publish(&queue);
                if was_empty {
                    self.inner.alerts.start_ring();
                }
            }
            IngestOutcome::Duplicate(key) => {
                debug!(job_id = %key.job_id, attempt = key.attempt_index, "Ignoring redelivered offer");
            }
            IngestOutcome::Malformed(reason) => {
                warn!("Dropping malformed job_alert: {}", reason);
            }
        }
        outcome
    }

    /// Handle a `job_alert_expired` payload.
    pub async fn expire_payload(&self, payload: serde_json::Value) -> bool {
        match serde_json::from_value::<JobAlertExpiredEvent>(payload) {
            Ok(event) => self.expire(&OfferKey::from(&event)).await,
            Err(e) => {
                warn!("Dropping malformed job_alert_expired: {}", e);
                false
            }
        }
    }

    /// Server-side expiry. Removes the offer whatever its countdown says.
    pub async fn expire(&self, key: &OfferKey) -> bool {
        let mut queue = self.inner.queue.lock().await;
        if queue.expire(key).is_none() {
            debug!(job_id = %key.job_id, attempt = key.attempt_index, "Expiry for unknown offer");
            return false;
        }

        info!(job_id = %key.job_id, attempt = key.attempt_index, "Offer expired by server");
        self.persist(&queue).await;
        self.publish(&queue);
        if queue.is_empty() {
            self.inner.alerts.stop_ring();
        }
        true
    }

    pub async fn tick(&self) -> TickReport {
        let now = self.now_ms();
        self.tick_at(now).await
    }

    pub async fn tick_at(&self, now_ms: i64) -> TickReport {
        let mut queue = self.inner.queue.lock().await;
        let report = queue.tick(now_ms);

        if !report.expired.is_empty() {
            for key in &report.expired {
                info!(job_id = %key.job_id, attempt = key.attempt_index, "Offer timed out locally");
            }
            self.persist(&queue).await;
            if queue.is_empty() {
                self.inner.alerts.stop_ring();
            }
        }
        self.publish(&queue);
        report
    }

    /// Submit the mechanic's decision.
    ///
    /// At most one submission per offer is in flight; a second call while
    /// submitting, or a call for an offer that is already gone, sends nothing.
    pub async fn decide(&self, key: &OfferKey, decision: Decision) -> DecisionOutcome {
        let request = {
            let now = self.now_ms();
            let mut queue = self.inner.queue.lock().await;
            match queue.begin_decision(key, decision, now) {
                Ok(request) => {
                    self.persist(&queue).await;
                    self.publish(&queue);
                    request
                }
                Err(QueueError::NotFound(_)) => {
                    debug!(job_id = %key.job_id, attempt = key.attempt_index, "Decision for unknown offer ignored");
                    return DecisionOutcome::Skipped;
                }
                Err(e) => {
                    debug!("Decision ignored: {}", e);
                    return DecisionOutcome::Skipped;
                }
            }
        };

        let payload = match serde_json::to_value(&request) {
            Ok(payload) => payload,
            Err(e) => {
                let reason = e.to_string();
                self.revert(
                    key,
                    Notice::DecisionUndelivered {
                        key: key.clone(),
                        decision,
                        reason: reason.clone(),
                    },
                )
                .await;
                return DecisionOutcome::Undelivered(reason);
            }
        };

        info!(job_id = %key.job_id, attempt = key.attempt_index, %decision, "Submitting job response");
        let ack_timeout = self.inner.settings.decision_ack_timeout;
        let sent = tokio::time::timeout(
            ack_timeout,
            self.inner.channel.emit_with_ack(JOB_RESPONSE, payload, ack_timeout),
        )
        .await
        .unwrap_or_else(|_| {
            Err(CoreError::AckTimeout {
                event: JOB_RESPONSE.to_string(),
                timeout: ack_timeout,
            })
        });

        match sent {
            Ok(ack) => {
                let ack: JobResponseAck = serde_json::from_value(ack).unwrap_or_default();
                self.resolve(key).await;
                if ack.ok {
                    info!(job_id = %key.job_id, %decision, "Job response acknowledged");
                } else {
                    warn!(job_id = %key.job_id, %decision, message = ?ack.message, "Job response declined by server");
                }
                self.inner.alerts.notify(Notice::DecisionAcknowledged {
                    key: key.clone(),
                    decision,
                    ok: ack.ok,
                    message: ack.message.clone(),
                });
                DecisionOutcome::Acknowledged {
                    ok: ack.ok,
                    message: ack.message,
                }
            }
            Err(CoreError::AckTimeout { .. }) => {
                warn!(job_id = %key.job_id, %decision, "Job response not acknowledged within {:?}", ack_timeout);
                self.revert(
                    key,
                    Notice::DecisionTimedOut {
                        key: key.clone(),
                        decision,
                    },
                )
                .await;
                DecisionOutcome::TimedOut
            }
            Err(e) => {
                warn!(job_id = %key.job_id, %decision, "Job response not delivered: {}", e);
                let reason = e.to_string();
                self.revert(
                    key,
                    Notice::DecisionUndelivered {
                        key: key.clone(),
                        decision,
                        reason: reason.clone(),
                    },
                )
                .await;
                DecisionOutcome::Undelivered(reason)
            }
        }
    }

    /// Every offer currently held, including in-flight ones.
    pub async fn offers(&self) -> Vec<Offer> {
        self.inner.queue.lock().await.offers().cloned().collect()
    }

    pub async fn get(&self, key: &OfferKey) -> Option<Offer> {
        self.inner.queue.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.queue.lock().await.is_empty()
    }

    pub fn storage_degraded(&self) -> bool {
        self.inner.storage_degraded.load(Ordering::Relaxed)
    }

    async fn resolve(&self, key: &OfferKey) {
        let mut queue = self.inner.queue.lock().await;
        if queue.complete_decision(key).is_some() {
            self.persist(&queue).await;
            self.publish(&queue);
            if queue.is_empty() {
                self.inner.alerts.stop_ring();
            }
        }
    }

    /// Undo a submission that got no answer. Notifies only when the offer is actionable again.
    async fn revert(&self, key: &OfferKey, notice: Notice) {
        let now = self.now_ms();
        let mut queue = self.inner.queue.lock().await;
        match queue.revert_decision(key, now) {
            RevertOutcome::Pending => {
                self.persist(&queue).await;
                self.publish(&queue);
                self.inner.alerts.notify(notice);
            }
            RevertOutcome::Expired => {
                info!(job_id = %key.job_id, attempt = key.attempt_index, "Offer expired while awaiting acknowledgement");
                self.persist(&queue).await;
                self.publish(&queue);
                if queue.is_empty() {
                    self.inner.alerts.stop_ring();
                }
            }
            RevertOutcome::Missing => {}
        }
    }

    async fn persist(&self, queue: &OfferQueue) {
        let offers: Vec<&Offer> = queue.offers().collect();
        let raw = match serde_json::to_string(&offers) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode offer queue: {}", e);
                return;
            }
        };

        match self.inner.storage.save(&self.inner.settings.namespace, &raw).await {
            Ok(()) => {
                if self.inner.storage_degraded.swap(false, Ordering::Relaxed) {
                    info!("Offer storage available again");
                }
            }
            Err(e) => self.storage_failed(&e),
        }
    }

    fn storage_failed(&self, err: &CoreError) {
        if self.inner.storage_degraded.swap(true, Ordering::Relaxed) {
            debug!("Offer storage still unavailable: {}", err);
        } else {
            warn!("Offer storage unavailable, continuing in memory: {}", err);
        }
    }

    fn publish(&self, queue: &OfferQueue) {
        self.inner.snapshot_tx.send_replace(queue.visible());
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::OfferStatus;
    use serde_json::json;

    #[tokio::test]
    async fn test_redelivered_alert_yields_one_offer() {
        let h = harness(AckBehavior::Reply(json!({ "ok": true })));
        let alert = json!({ "jobId": "J2", "attemptIndex": 0, "issue": "No start" });

        h.store.ingest(alert.clone()).await;
        let second = h.store.ingest(alert).await;

        assert_eq!(second, IngestOutcome::Duplicate(OfferKey::new("J2", 0)));
        assert_eq!(h.store.len().await, 1);
        assert_eq!(h.alerts.started(), 1);
    }

    #[tokio::test]
    async fn test_ring_follows_queue_occupancy() {
        let h = harness(AckBehavior::Reply(json!({ "ok": true })));

        h.store.ingest(json!({ "jobId": "J1" })).await;
        h.store.ingest(json!({ "jobId": "J2" })).await;
        assert_eq!(h.alerts.started(), 1);

        h.store.expire(&OfferKey::new("J1", 0)).await;
        assert_eq!(h.alerts.stopped(), 0);
        h.store.expire(&OfferKey::new("J2", 0)).await;
        assert_eq!(h.alerts.stopped(), 1);

        h.store.ingest(json!({ "jobId": "J3" })).await;
        assert_eq!(h.alerts.started(), 2);
    }

    #[tokio::test]
    async fn test_reject_scenario_empties_queue_and_notifies() {
        let h = harness(AckBehavior::Reply(json!({ "ok": true })));
        h.store.ingest(json!({ "jobId": "J1", "attemptIndex": 0 })).await;

        let key: OfferKey = "J1:0".parse().unwrap();
        let outcome = h.store.decide(&key, Decision::Reject).await;

        assert_eq!(outcome, DecisionOutcome::Acknowledged { ok: true, message: None });
        assert!(h.store.is_empty().await);
        assert_eq!(h.alerts.stopped(), 1);
        assert_eq!(
            h.alerts.notices(),
            vec![Notice::DecisionAcknowledged {
                key,
                decision: Decision::Reject,
                ok: true,
                message: None,
            }]
        );

        let sent = h.channel.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, JOB_RESPONSE);
        assert_eq!(sent[0].1, json!({ "jobId": "J1", "attemptIndex": 0, "response": "reject" }));
    }

    #[tokio::test]
    async fn test_negative_ack_still_removes_offer() {
        let h = harness(AckBehavior::Reply(json!({ "ok": false, "message": "Job already assigned" })));
        h.store.ingest(json!({ "jobId": "J1" })).await;

        let outcome = h.store.decide(&OfferKey::new("J1", 0), Decision::Accept).await;

        assert_eq!(
            outcome,
            DecisionOutcome::Acknowledged {
                ok: false,
                message: Some("Job already assigned".into())
            }
        );
        assert!(h.store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_tap_sends_one_response() {
        let h = harness(AckBehavior::ReplyAfter(Duration::from_secs(2), json!({ "ok": true })));
        h.store.ingest(json!({ "jobId": "J1" })).await;
        let key = OfferKey::new("J1", 0);

        let first = {
            let store = h.store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.decide(&key, Decision::Accept).await })
        };
        tokio::task::yield_now().await;
        while h.channel.sent_count(JOB_RESPONSE) == 0 {
            tokio::task::yield_now().await;
        }

        let second = h.store.decide(&key, Decision::Accept).await;
        assert_eq!(second, DecisionOutcome::Skipped);
        assert_eq!(h.store.get(&key).await.unwrap().status, OfferStatus::Submitting);

        let first = first.await.unwrap();
        assert_eq!(first, DecisionOutcome::Acknowledged { ok: true, message: None });
        assert_eq!(h.channel.sent_count(JOB_RESPONSE), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_ack_reverts_to_pending() {
        let h = harness(AckBehavior::Never);
        h.store.ingest(json!({ "jobId": "J1", "slaSeconds": 120 })).await;
        let key = OfferKey::new("J1", 0);

        let outcome = h.store.decide(&key, Decision::Accept).await;

        assert_eq!(outcome, DecisionOutcome::TimedOut);
        assert_eq!(h.store.get(&key).await.unwrap().status, OfferStatus::Pending);
        assert!(matches!(h.alerts.notices()[0], Notice::DecisionTimedOut { .. }));

        h.channel.set_behavior(AckBehavior::Reply(json!({ "ok": true })));
        let retry = h.store.decide(&key, Decision::Accept).await;
        assert_eq!(retry, DecisionOutcome::Acknowledged { ok: true, message: None });
        assert_eq!(h.channel.sent_count(JOB_RESPONSE), 2);
    }

    #[tokio::test]
    async fn test_disconnected_transport_reverts_to_pending() {
        let h = harness(AckBehavior::Disconnected);
        h.store.ingest(json!({ "jobId": "J1" })).await;
        let key = OfferKey::new("J1", 0);

        let outcome = h.store.decide(&key, Decision::Reject).await;

        assert!(matches!(outcome, DecisionOutcome::Undelivered(_)));
        assert!(h.store.get(&key).await.unwrap().is_pending());
        assert_eq!(h.channel.sent_count(JOB_RESPONSE), 0);
    }

    #[tokio::test]
    async fn test_decide_after_expiry_is_noop() {
        let h = harness(AckBehavior::Reply(json!({ "ok": true })));
        h.store.ingest(json!({ "jobId": "J1" })).await;
        h.store.expire_payload(json!({ "jobId": "J1", "attemptIndex": 0 })).await;

        let outcome = h.store.decide(&OfferKey::new("J1", 0), Decision::Accept).await;

        assert_eq!(outcome, DecisionOutcome::Skipped);
        assert_eq!(h.channel.sent_count(JOB_RESPONSE), 0);
        assert!(h.store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_during_submission_is_not_resurrected() {
        let h = harness(AckBehavior::ReplyAfter(Duration::from_secs(1), json!({ "ok": true })));
        h.store.ingest(json!({ "jobId": "J1" })).await;
        let key = OfferKey::new("J1", 0);

        let pending = {
            let store = h.store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.decide(&key, Decision::Accept).await })
        };
        while h.channel.sent_count(JOB_RESPONSE) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(h.store.expire(&key).await);

        let outcome = pending.await.unwrap();
        assert_eq!(outcome, DecisionOutcome::Acknowledged { ok: true, message: None });
        assert!(h.store.get(&key).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_ack_after_deadline_drops_offer() {
        let h = harness(AckBehavior::Never);
        h.store.ingest(json!({ "jobId": "J1", "slaSeconds": 5 })).await;
        let key = OfferKey::new("J1", 0);
        let mut snapshots = h.store.subscribe();

        let pending = {
            let store = h.store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.decide(&key, Decision::Accept).await })
        };
        while h.channel.sent_count(JOB_RESPONSE) == 0 {
            tokio::task::yield_now().await;
        }
        h.clock.set(11_000);

        assert_eq!(pending.await.unwrap(), DecisionOutcome::TimedOut);
        assert!(h.store.get(&key).await.is_none());
        assert!(snapshots.borrow_and_update().is_empty());
        assert!(h.alerts.notices().is_empty());
        assert_eq!(h.alerts.stopped(), 1);

        assert_eq!(h.store.decide(&key, Decision::Accept).await, DecisionOutcome::Skipped);
        assert_eq!(h.channel.sent_count(JOB_RESPONSE), 1);
    }

    #[tokio::test]
    async fn test_decide_past_deadline_sends_nothing() {
        let h = harness(AckBehavior::Reply(json!({ "ok": true })));
        h.store.ingest(json!({ "jobId": "J1", "slaSeconds": 5 })).await;
        h.clock.set(5_000);

        let outcome = h.store.decide(&OfferKey::new("J1", 0), Decision::Accept).await;

        assert_eq!(outcome, DecisionOutcome::Skipped);
        assert_eq!(h.channel.sent_count(JOB_RESPONSE), 0);
        assert!(h.alerts.notices().is_empty());
    }

    #[tokio::test]
    async fn test_server_expiry_beats_running_countdown() {
        let h = harness(AckBehavior::Reply(json!({ "ok": true })));
        h.store.ingest(json!({ "jobId": "J1", "slaSeconds": 120 })).await;
        h.clock.set(10_000);
        h.store.tick().await;
        assert_eq!(h.store.get(&OfferKey::new("J1", 0)).await.unwrap().remaining_seconds, 110);

        assert!(h.store.expire(&OfferKey::new("J1", 0)).await);
        assert!(!h.store.expire(&OfferKey::new("J1", 0)).await);
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_local_expiry_without_server_event() {
        let h = harness(AckBehavior::Reply(json!({ "ok": true })));
        h.store.ingest(json!({ "jobId": "J1", "attemptIndex": 0, "slaSeconds": 120 })).await;
        let mut snapshots = h.store.subscribe();
        assert_eq!(snapshots.borrow_and_update()[0].remaining_seconds, 120);

        h.clock.set(121_000);
        let report = h.store.tick().await;

        assert_eq!(report.expired, vec![OfferKey::new("J1", 0)]);
        assert!(h.store.is_empty().await);
        assert!(snapshots.borrow_and_update().is_empty());
        assert_eq!(h.alerts.stopped(), 1);
    }

    #[tokio::test]
    async fn test_ticks_keep_deadline_fixed() {
        let h = harness(AckBehavior::Reply(json!({ "ok": true })));
        h.store.ingest(json!({ "jobId": "J1", "slaSeconds": 60 })).await;
        let key = OfferKey::new("J1", 0);
        let deadline = h.store.get(&key).await.unwrap().deadline();

        for now in (1..=5).map(|s| s * 1_000) {
            h.clock.set(now);
            h.store.tick().await;
            let offer = h.store.get(&key).await.unwrap();
            assert_eq!(offer.deadline(), deadline);
            assert_eq!(offer.remaining_seconds, (60 - now / 1_000) as u64);
        }
    }

    #[tokio::test]
    async fn test_restore_keeps_only_live_offers() {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(dispatch_store::MemoryStorage::new());
        let first = harness_with(AckBehavior::Reply(json!({ "ok": true })), storage.clone());
        first.store.ingest(json!({ "jobId": "expired", "slaSeconds": 5 })).await;
        first.store.ingest(json!({ "jobId": "live", "slaSeconds": 600 })).await;

        let second = harness_with(AckBehavior::Reply(json!({ "ok": true })), storage.clone());
        second.clock.set(30_000);
        let kept = second.store.restore().await;

        assert_eq!(kept, 1);
        let offers = second.store.offers().await;
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].job_id, "live");
        assert_eq!(offers[0].remaining_seconds, 570);
        assert_eq!(second.alerts.started(), 1);

        let raw = storage.load(STORAGE_NAMESPACE).await.unwrap().unwrap();
        let persisted: Vec<Offer> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_storage_starts_empty() {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(dispatch_store::MemoryStorage::new());
        storage.save(STORAGE_NAMESPACE, "{not json").await.unwrap();

        let h = harness_with(AckBehavior::Reply(json!({ "ok": true })), storage);
        assert_eq!(h.store.restore().await, 0);
        assert_eq!(h.alerts.started(), 0);
    }

    #[tokio::test]
    async fn test_broken_storage_degrades_to_memory() {
        let h = harness_with(AckBehavior::Reply(json!({ "ok": true })), Arc::new(BrokenStorage));

        assert_eq!(h.store.restore().await, 0);
        h.store.ingest(json!({ "jobId": "J1" })).await;

        assert!(h.store.storage_degraded());
        assert_eq!(h.store.len().await, 1);
        let outcome = h.store.decide(&OfferKey::new("J1", 0), Decision::Accept).await;
        assert_eq!(outcome, DecisionOutcome::Acknowledged { ok: true, message: None });
    }

    #[tokio::test]
    async fn test_malformed_alert_is_dropped() {
        let h = harness(AckBehavior::Reply(json!({ "ok": true })));
        let outcome = h.store.ingest(json!({ "attemptIndex": 0, "issue": "Overheating" })).await;

        assert!(matches!(outcome, IngestOutcome::Malformed(_)));
        assert!(h.store.is_empty().await);
        assert_eq!(h.alerts.started(), 0);
        assert!(!h.store.expire_payload(json!({ "attemptIndex": 0 })).await);
    }
}
