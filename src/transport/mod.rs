//! Transport layer abstraction.
//!
//! The session core never touches sockets. It talks to a [`Transport`] that
//! supplies a persistent framed duplex stream and reports lifecycle events
//! from a non-blocking [`Transport::poll`]. Reconnection and transport-level
//! keepalive belong to the transport; the session only reacts to the events.
//!
//! # Backends
//!
//! - [`WebSocketTransport`]: ws/wss via tungstenite, fixed-interval
//!   reconnect, WebSocket ping/pong keepalive
//! - [`LoopbackTransport`]: in-memory, scripted by the caller (tests, demos)
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Client::tick()               │
//! └──────────────────┬──────────────────────┘
//!                    │ poll() / send() / close()
//!          ┌────────┴────────┐
//!          ▼                 ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │ WebSocket (wss) │ │    Loopback     │
//! └─────────────────┘ └─────────────────┘
//! ```

mod config;
mod loopback;
mod websocket;

pub use config::{Endpoint, WebSocketConfig};
pub use loopback::LoopbackTransport;
pub use websocket::WebSocketTransport;

use crate::error::Result;

/// Lifecycle events surfaced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Link established
    LinkUp,
    /// Link lost or closed
    LinkDown,
    /// One inbound frame
    Frame(Vec<u8>),
    /// Transport-level fault that did not by itself drop the link
    Error(String),
}

/// Persistent framed duplex stream to the coordinator.
///
/// Implementations must not block in [`poll`](Transport::poll) beyond a
/// bounded connect attempt.
pub trait Transport {
    /// Start connecting to `endpoint`. The link is reported up later through
    /// [`TransportEvent::LinkUp`]; the transport keeps reconnecting after link
    /// loss until it is dropped.
    fn open(&mut self, endpoint: &Endpoint) -> Result<()>;

    /// Pump the transport and return the events that are ready, in delivery
    /// order.
    fn poll(&mut self) -> Vec<TransportEvent>;

    /// Send one text frame. Fire-and-forget: delivery is not confirmed.
    fn send(&mut self, frame: &str) -> Result<()>;

    /// Drop the current link. A [`TransportEvent::LinkDown`] follows if a link
    /// was up; the reconnect policy stays active.
    fn close(&mut self);

    /// Whether a link is currently up.
    fn is_connected(&self) -> bool;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;
}
