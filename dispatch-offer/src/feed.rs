use crate::store::OfferStore;
use dispatch_core::{EventChannel, SubscriptionId};
use dispatch_shared::events::{JOB_ALERT, JOB_ALERT_EXPIRED};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

enum FeedEvent {
    Alert(Value),
    Expired(Value),
}

/// Connects transport pushes to an [`OfferStore`].
///
/// Handlers only enqueue; a single pump task applies events to the store in
/// the order the transport delivered them.
pub struct OfferFeed {
    channel: Arc<dyn EventChannel>,
    alert_sub: SubscriptionId,
    expired_sub: SubscriptionId,
    pump: JoinHandle<()>,
}

impl OfferFeed {
    pub fn attach(store: OfferStore, channel: Arc<dyn EventChannel>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<FeedEvent>();

        let alert_tx = tx.clone();
        let alert_sub = channel.subscribe(
            JOB_ALERT,
            Arc::new(move |payload| {
                let _ = alert_tx.send(FeedEvent::Alert(payload));
            }),
        );
        let expired_sub = channel.subscribe(
            JOB_ALERT_EXPIRED,
            Arc::new(move |payload| {
                let _ = tx.send(FeedEvent::Expired(payload));
            }),
        );

        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    FeedEvent::Alert(payload) => {
                        store.ingest(payload).await;
                    }
                    FeedEvent::Expired(payload) => {
                        store.expire_payload(payload).await;
                    }
                }
            }
            debug!("Offer feed closed");
        });

        info!("Offer feed attached");
        Self {
            channel,
            alert_sub,
            expired_sub,
            pump,
        }
    }

    /// Unsubscribe from the transport and stop applying events.
    pub fn detach(self) {
        self.channel.unsubscribe(JOB_ALERT, self.alert_sub);
        self.channel.unsubscribe(JOB_ALERT_EXPIRED, self.expired_sub);
        self.pump.abort();
        info!("Offer feed detached");
    }
}
