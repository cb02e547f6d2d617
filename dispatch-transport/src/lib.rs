pub mod backoff;
pub mod client;
pub mod frame;

pub use client::{ConnectionState, Registration, SocketClient, TransportConfig};
pub use frame::Frame;
