use async_trait::async_trait;
use dispatch_core::{CoreError, CoreResult, EventChannel, EventHandler, SubscriptionId};
use dispatch_shared::events::{MechanicRegister, RegisterAck, MECHANIC_REGISTER};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::backoff::reconnect_delay;
use crate::frame::Frame;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: String,
    pub mechanic_id: String,
    pub register_ack_timeout: Duration,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>, mechanic_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mechanic_id: mechanic_id.into(),
            register_ack_timeout: Duration::from_secs(5),
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Result of the identity handshake. Never an error: a missing ack is `ok: false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub ok: bool,
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The process-wide socket connection.
///
/// Constructed once by the application and shared by `Arc` or `clone`; all
/// clones drive the same connection. The connection is re-established with
/// backoff whenever it drops and the mechanic is re-registered each time.
/// Dropping the last clone stops the connection as `shutdown()` does.
#[derive(Clone)]
pub struct SocketClient {
    shared: Arc<Shared>,
}

struct Shared {
    config: TransportConfig,
    subscribers: RwLock<HashMap<String, Vec<(SubscriptionId, EventHandler)>>>,
    next_subscription: AtomicU64,
    next_ack: AtomicU64,
    pending_acks: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<WsMessage>>>,
    state_tx: watch::Sender<ConnectionState>,
    registration_tx: watch::Sender<Option<Registration>>,
    started: AtomicBool,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl SocketClient {
    pub fn new(config: TransportConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (registration_tx, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                config,
                subscribers: RwLock::new(HashMap::new()),
                next_subscription: AtomicU64::new(0),
                next_ack: AtomicU64::new(0),
                pending_acks: Mutex::new(HashMap::new()),
                outbound: Mutex::new(None),
                state_tx,
                registration_tx,
                started: AtomicBool::new(false),
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Start the connection. Calling it again is a no-op.
    pub fn connect(&self) {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            debug!("Socket already started");
            return;
        }

        let task = tokio::spawn(supervise(Arc::downgrade(&self.shared)));
        if let Ok(mut slot) = self.shared.supervisor.lock() {
            *slot = Some(task);
        }
    }

    /// Stop reconnecting and drop the current connection.
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.shared.supervisor.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
        self.shared.close_session();
        self.shared.state_tx.send_replace(ConnectionState::Disconnected);
        info!("Socket shut down");
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Outcome of the most recent handshake, `None` before the first one finished.
    pub fn watch_registration(&self) -> watch::Receiver<Option<Registration>> {
        self.shared.registration_tx.subscribe()
    }

    /// Send the mechanic's identity and wait (bounded) for the server's ack.
    pub async fn register(&self) -> Registration {
        self.shared.register().await
    }
}

#[async_trait]
impl EventChannel for SocketClient {
    fn subscribe(&self, event: &str, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.shared.next_subscription.fetch_add(1, Ordering::Relaxed) + 1);
        match self.shared.subscribers.write() {
            Ok(mut subscribers) => subscribers.entry(event.to_string()).or_default().push((id, handler)),
            Err(_) => error!(event, "Subscriber table poisoned"),
        }
        debug!(event, subscription = %id, "Subscribed");
        id
    }

    fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        let Ok(mut subscribers) = self.shared.subscribers.write() else {
            return false;
        };
        let Some(handlers) = subscribers.get_mut(event) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            subscribers.remove(event);
        }
        removed
    }

    async fn emit(&self, event: &str, payload: Value) -> CoreResult<()> {
        self.shared.send_frame(&Frame::event(event, payload))
    }

    async fn emit_with_ack(&self, event: &str, payload: Value, timeout: Duration) -> CoreResult<Value> {
        self.shared.emit_with_ack(event, payload, timeout).await
    }
}

impl Shared {
    async fn emit_with_ack(&self, event: &str, payload: Value, timeout: Duration) -> CoreResult<Value> {
        let id = self.next_ack.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending().insert(id, tx);

        if let Err(e) = self.send_frame(&Frame::event_with_ack(event, payload, id)) {
            self.pending().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(_)) => Err(CoreError::ConnectionLost(event.to_string())),
            Err(_) => {
                self.pending().remove(&id);
                Err(CoreError::AckTimeout {
                    event: event.to_string(),
                    timeout,
                })
            }
        }
    }

    async fn register(&self) -> Registration {
        let payload = match serde_json::to_value(MechanicRegister {
            mechanic_id: self.config.mechanic_id.clone(),
        }) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode registration: {}", e);
                return Registration { ok: false };
            }
        };

        let registration = match self
            .emit_with_ack(MECHANIC_REGISTER, payload, self.config.register_ack_timeout)
            .await
        {
            Ok(ack) => {
                let ack: RegisterAck = serde_json::from_value(ack).unwrap_or_default();
                if ack.ok {
                    info!(mechanic_id = %self.config.mechanic_id, "Mechanic registered");
                } else {
                    warn!(mechanic_id = %self.config.mechanic_id, "Registration rejected by server");
                }
                Registration { ok: ack.ok }
            }
            Err(e) => {
                warn!(mechanic_id = %self.config.mechanic_id, "Registration not acknowledged: {}", e);
                Registration { ok: false }
            }
        };

        self.registration_tx.send_replace(Some(registration));
        registration
    }

    fn send_frame(&self, frame: &Frame) -> CoreResult<()> {
        let text = frame.encode().map_err(|e| CoreError::Encode(e.to_string()))?;
        let outbound = self.outbound.lock().map_err(|_| CoreError::NotConnected)?;
        match outbound.as_ref() {
            Some(tx) => tx.send(WsMessage::Text(text)).map_err(|_| CoreError::NotConnected),
            None => Err(CoreError::NotConnected),
        }
    }

    fn handle_text(&self, text: &str) {
        match Frame::decode(text) {
            Ok(Frame::Ack { id, data }) => match self.pending().remove(&id) {
                Some(tx) => {
                    let _ = tx.send(data);
                }
                None => debug!(ack_id = id, "Late or unknown ack dropped"),
            },
            Ok(Frame::Event { event, data, id }) => {
                self.dispatch(&event, data);
                // The server occasionally asks for delivery receipts; answer with an empty ack.
                if let Some(id) = id {
                    if let Err(e) = self.send_frame(&Frame::Ack { id, data: Value::Null }) {
                        debug!(ack_id = id, "Could not ack server event: {}", e);
                    }
                }
            }
            Err(e) => warn!("Ignoring unreadable frame: {}", e),
        }
    }

    fn dispatch(&self, event: &str, data: Value) {
        let handlers: Vec<EventHandler> = match self.subscribers.read() {
            Ok(subscribers) => subscribers
                .get(event)
                .map(|hs| hs.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default(),
            Err(_) => return,
        };

        if handlers.is_empty() {
            debug!(event, "No subscribers for event");
            return;
        }
        for handler in handlers {
            handler(data.clone());
        }
    }

    fn close_session(&self) {
        if let Ok(mut outbound) = self.outbound.lock() {
            *outbound = None;
        }
        // Dropping the senders wakes every waiter with ConnectionLost.
        self.pending().clear();
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Value>>> {
        self.pending_acks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.supervisor.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

/// Holds only a weak handle between steps so the client can be dropped while connected.
async fn supervise(weak: Weak<Shared>) {
    let mut attempt: u32 = 0;

    loop {
        let url = {
            let Some(shared) = weak.upgrade() else { return };
            shared.state_tx.send_replace(ConnectionState::Connecting);
            info!(url = %shared.config.url, attempt, "Connecting to dispatch socket");
            shared.config.url.clone()
        };

        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                attempt = 0;
                run_session(&weak, socket).await;
                warn!("Dispatch socket disconnected");
            }
            Err(e) => warn!(attempt, "Dispatch socket connect failed: {}", e),
        }

        let delay = {
            let Some(shared) = weak.upgrade() else { return };
            shared.close_session();
            shared.state_tx.send_replace(ConnectionState::Disconnected);
            reconnect_delay(
                attempt,
                shared.config.reconnect_initial_ms,
                shared.config.reconnect_max_ms,
            )
        };
        attempt = attempt.saturating_add(1);
        debug!(?delay, "Reconnecting after delay");
        tokio::time::sleep(delay).await;
    }
}

async fn run_session(weak: &Weak<Shared>, socket: Socket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    // The handshake waits on an ack that arrives through the read loop below.
    let registration = {
        let Some(shared) = weak.upgrade() else { return };
        if let Ok(mut outbound) = shared.outbound.lock() {
            *outbound = Some(tx);
        }
        shared.state_tx.send_replace(ConnectionState::Connected);
        info!("Dispatch socket connected");

        tokio::spawn(async move {
            shared.register().await;
        })
    };

    let writer = async {
        while let Some(message) = rx.recv().await {
            if let Err(e) = sink.send(message).await {
                warn!("Socket write failed: {}", e);
                break;
            }
        }
    };

    let reader = async {
        while let Some(message) = stream.next().await {
            match message {
                Ok(WsMessage::Text(text)) => match weak.upgrade() {
                    Some(shared) => shared.handle_text(&text),
                    None => break,
                },
                Ok(WsMessage::Close(frame)) => {
                    debug!(?frame, "Server closed the socket");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Socket read failed: {}", e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }

    registration.abort();
}
