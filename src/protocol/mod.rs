//! Device-to-coordinator session protocol.
//!
//! Implements the authentication handshake, liveness tracking and command
//! dispatch layered over a persistent bidirectional stream.
//!
//! # Message Flow
//!
//! ```text
//! Device                              Coordinator
//!    |                                     |
//!    |------- auth (apiKey, secret) ----->|  Sent on every link-up
//!    |<------ auth_success --------------|  Session trusted
//!    |     or auth_error                  |  Link stays up, not trusted
//!    |                                     |
//!    |------- heartbeat ----------------->|  Every 25 s while authenticated
//!    |<------ command (id, payload) ------|
//!    |------- ack (commandId, status) --->|  At most one per id
//!    |------- sensor_data / custom ------>|
//! ```
//!
//! # State Machine
//!
//! | State              | Description                              | Transitions              |
//! |--------------------|------------------------------------------|--------------------------|
//! | `Disconnected`     | No link                                  | → LinkEstablishing, AuthPending |
//! | `LinkEstablishing` | Transport opening                        | → AuthPending, Disconnected |
//! | `AuthPending`      | Auth sent, awaiting verdict              | → Authenticated, Unauthenticated, Disconnected |
//! | `Unauthenticated`  | Link up, auth rejected                   | → Disconnected           |
//! | `Authenticated`    | Commands accepted, heartbeats flowing    | → Unauthenticated, Disconnected |
//!
//! Link loss, or more than 60 s without inbound traffic, returns any state
//! to `Disconnected`. The transport's reconnect policy brings the link back
//! and the next link-up re-runs the handshake.
//!
//! # Built-in Commands
//!
//! | Payload   | Effect                         | Ack        |
//! |-----------|--------------------------------|------------|
//! | `LED_ON`  | Indicator on                   | `executed` |
//! | `LED_OFF` | Indicator off                  | `executed` |
//! | `STATUS`  | Telemetry report               | `executed` |
//! | `RESTART` | Device reboot                  | none       |

mod codec;
mod dispatch;
mod heartbeat;
mod message;
mod session;

pub use codec::{Codec, JsonCodec};
pub use dispatch::{BuiltinCommand, CommandHandler, DispatchAction, Dispatcher, PendingCommand};
pub use heartbeat::Liveness;
pub use message::{AckStatus, Message, SensorPayload, RESERVED_KINDS};
pub use session::{AuthState, LinkStatus, Session, SessionAction, SessionConfig, SessionState};

/// Default heartbeat cadence (25 seconds)
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 25;

/// Default inbound silence before the link is reset (60 seconds)
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 60;
