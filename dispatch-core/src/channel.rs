use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::CoreResult;

/// Callback invoked with the payload of a pushed event.
///
/// Handlers run on the transport's read loop and must not block; anything
/// heavier than forwarding into a channel belongs in a separate task.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Duplex named-event channel as seen by the offer store.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Register a handler for `event`. Several handlers may share one event name.
    fn subscribe(&self, event: &str, handler: EventHandler) -> SubscriptionId;

    /// Remove a handler. Returns false if it was not registered.
    fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool;

    /// Fire-and-forget.
    async fn emit(&self, event: &str, payload: Value) -> CoreResult<()>;

    /// Send and wait for the single acknowledgement the server returns.
    async fn emit_with_ack(&self, event: &str, payload: Value, timeout: Duration) -> CoreResult<Value>;
}
