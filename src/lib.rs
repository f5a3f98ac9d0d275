//! # Fieldlink - Device-to-Coordinator Session Core
//!
//! Keeps an embedded device connected to a remote coordinator over a
//! persistent WebSocket link: authenticates on every link-up, proves liveness
//! with heartbeats, resets half-open links with a watchdog, executes a small
//! set of built-in commands and hands everything else to the host.
//!
//! ## Protocol Overview
//!
//! One JSON object per text frame, discriminated by its `type` field.
//!
//! ```text
//! Device                              Coordinator
//!    |                                     |
//!    |------- auth ---------------------->|
//!    |<------ auth_success / auth_error --|
//!    |------- heartbeat (every 25 s) ---->|
//!    |<------ command --------------------|
//!    |------- ack ----------------------->|
//!    |------- sensor_data / custom ------>|
//! ```
//!
//! ### Message Types
//!
//! | Type           | Direction          | Purpose                          |
//! |----------------|--------------------|----------------------------------|
//! | `auth`         | Device→Coordinator | Present api key and secret       |
//! | `auth_success` | Coordinator→Device | Session trusted                  |
//! | `auth_error`   | Coordinator→Device | Credentials rejected             |
//! | `command`      | Coordinator→Device | Remote directive with id         |
//! | `ack`          | Device→Coordinator | Command outcome                  |
//! | `heartbeat`    | Device→Coordinator | Liveness proof                   |
//! | `sensor_data`  | Device→Coordinator | Telemetry report                 |
//! | *custom*       | Device→Coordinator | Application-defined report       |
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldlink::{Client, Credentials, LoopbackTransport, ManualClock, SimulatedDevice};
//!
//! let clock = ManualClock::new();
//! let mut client = Client::builder(LoopbackTransport::new(), SimulatedDevice::new())
//!     .credentials(Credentials::new("device-key", "device-secret"))
//!     .clock(clock.clone())
//!     .build()
//!     .unwrap();
//!
//! client.connect().unwrap();
//! client.transport_mut().link_up();
//! client.transport_mut().deliver(r#"{"type":"auth_success"}"#);
//! client.tick();
//! assert!(client.is_authenticated());
//!
//! client.transport_mut().deliver(r#"{"type":"command","id":"1","payload":"LED_ON"}"#);
//! client.tick();
//! assert!(client.device().indicator());
//! assert_eq!(client.transport().sent_of_kind("ack").len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`client`]: Host-facing driver and builder
//! - [`protocol`]: Messages, codec, session state machine, liveness, dispatch
//! - [`transport`]: Transport trait, WebSocket and loopback backends
//! - [`device`]: Device trait, host and simulated devices
//! - [`clock`]: Time sources
//! - [`config`]: Configuration management and credentials
//! - [`error`]: Error types and result aliases

pub mod client;
pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use client::{Client, ClientBuilder, StatusHandler};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, Credentials, Secret};
pub use device::{Device, HostDevice, Reading, SimulatedDevice};
pub use error::{LinkError, Result};
pub use protocol::{
    AckStatus, Codec, JsonCodec, LinkStatus, Message, PendingCommand, Session, SessionConfig,
    SessionState,
};
pub use transport::{
    Endpoint, LoopbackTransport, Transport, TransportEvent, WebSocketConfig, WebSocketTransport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
