pub mod channel;
pub mod clock;
pub mod storage;

pub use channel::{EventChannel, EventHandler, SubscriptionId};
pub use clock::{Clock, SystemClock};
pub use storage::KeyValueStorage;

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Transport is not connected")]
    NotConnected,
    #[error("No acknowledgement for {event} within {timeout:?}")]
    AckTimeout { event: String, timeout: Duration },
    #[error("Connection lost before acknowledgement of {0}")]
    ConnectionLost(String),
    #[error("Payload encoding failed: {0}")]
    Encode(String),
    #[error("Storage unavailable: {0}")]
    Storage(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
