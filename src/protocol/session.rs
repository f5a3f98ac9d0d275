//! Session state machine.
//!
//! Owns link and authentication state for the single device-to-coordinator
//! session. It performs no I/O: every method takes the current time and
//! returns the [`SessionAction`]s the driver must execute, in order.

use std::fmt;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::codec::{Codec, JsonCodec};
use super::dispatch::PendingCommand;
use super::heartbeat::Liveness;
use super::message::Message;
use super::{DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_HEARTBEAT_INTERVAL_SECS};
use crate::config::Credentials;
use crate::error::{LinkError, Result};
use crate::transport::TransportEvent;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No link
    Disconnected,
    /// Transport asked to open, waiting for link-up
    LinkEstablishing,
    /// Link up, authentication failed or not attempted
    Unauthenticated,
    /// Link up, auth request sent, waiting for the verdict
    AuthPending,
    /// Link up and trusted by the coordinator
    Authenticated,
}

impl SessionState {
    /// Whether the transport link is up in this state
    pub fn is_link_up(self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::AuthPending | Self::Authenticated
        )
    }

    /// Authentication component of this state
    pub fn auth_state(self) -> AuthState {
        match self {
            Self::AuthPending => AuthState::AuthPending,
            Self::Authenticated => AuthState::Authenticated,
            _ => AuthState::Unauthenticated,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::LinkEstablishing => "link-establishing",
            Self::Unauthenticated => "unauthenticated",
            Self::AuthPending => "auth-pending",
            Self::Authenticated => "authenticated",
        };
        f.write_str(name)
    }
}

/// Authentication state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Not authenticated
    Unauthenticated,
    /// Auth request in flight
    AuthPending,
    /// Authenticated
    Authenticated,
}

/// Connectivity reported to the status callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    /// Transport link is up
    pub connected: bool,
    /// Coordinator accepted the credentials
    pub authenticated: bool,
}

impl LinkStatus {
    /// Create a status value
    pub const fn new(connected: bool, authenticated: bool) -> Self {
        Self {
            connected,
            authenticated,
        }
    }
}

/// Session timing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Heartbeat cadence while authenticated
    pub heartbeat_interval: Duration,
    /// Inbound silence tolerated before the link is reset
    pub connection_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            connection_timeout: Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
        }
    }
}

impl SessionConfig {
    /// Check the timers make sense together.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval.is_zero() || self.connection_timeout.is_zero() {
            return Err(LinkError::Config(
                "heartbeat interval and connection timeout must be non-zero".to_string(),
            ));
        }
        if self.heartbeat_interval >= self.connection_timeout {
            return Err(LinkError::Config(format!(
                "heartbeat interval ({:?}) must be shorter than connection timeout ({:?})",
                self.heartbeat_interval, self.connection_timeout
            )));
        }
        Ok(())
    }
}

/// Effects returned by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Encode and send this message
    Send(Message),
    /// Ask the transport to drop the link
    Close {
        /// Why the link is being dropped
        reason: String,
    },
    /// Drive the indicator ("ready" when on)
    SetIndicator(bool),
    /// Notify the status callback
    StatusChanged(LinkStatus),
    /// Hand a command to the dispatcher
    Dispatch(PendingCommand),
}

/// Device-to-coordinator session
pub struct Session {
    state: SessionState,
    credentials: Credentials,
    codec: Box<dyn Codec>,
    liveness: Liveness,
    started: Instant,
    link_id: Option<Uuid>,
}

impl Session {
    /// Create a disconnected session. `now` is the session's time origin for
    /// outbound timestamps.
    pub fn new(credentials: Credentials, config: &SessionConfig, now: Instant) -> Self {
        Self {
            state: SessionState::Disconnected,
            credentials,
            codec: Box::new(JsonCodec),
            liveness: Liveness::new(config, now),
            started: now,
            link_id: None,
        }
    }

    /// Replace the message codec
    pub fn with_codec(mut self, codec: Box<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get authentication state
    pub fn auth_state(&self) -> AuthState {
        self.state.auth_state()
    }

    /// Check if the transport link is up
    pub fn is_link_up(&self) -> bool {
        self.state.is_link_up()
    }

    /// Check if the session is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Current status as reported to the status callback
    pub fn status(&self) -> LinkStatus {
        LinkStatus::new(self.is_link_up(), self.is_authenticated())
    }

    /// Id of the current link (assigned at link-up, for log correlation)
    pub fn link_id(&self) -> Option<Uuid> {
        self.link_id
    }

    /// Time of the last inbound activity
    pub fn last_inbound_activity(&self) -> Instant {
        self.liveness.last_inbound()
    }

    /// Time the last heartbeat was sent
    pub fn last_heartbeat_sent(&self) -> Instant {
        self.liveness.last_heartbeat()
    }

    /// Milliseconds since the session was created
    pub fn uptime_ms(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.started).as_millis() as u64
    }

    /// Encode an outbound message with the session's codec
    pub fn encode(&self, message: &Message) -> Result<String> {
        self.codec.encode(message)
    }

    /// Note that the transport has been asked to open.
    ///
    /// Returns `false` (and changes nothing) unless the session was
    /// disconnected.
    pub fn begin_connect(&mut self, now: Instant) -> bool {
        if self.state != SessionState::Disconnected {
            return false;
        }
        self.state = SessionState::LinkEstablishing;
        self.liveness.record_inbound(now);
        true
    }

    /// Process one transport event.
    pub fn handle_event(&mut self, event: TransportEvent, now: Instant) -> Vec<SessionAction> {
        // Any event counts as activity, before it is interpreted
        self.liveness.record_inbound(now);

        match event {
            TransportEvent::LinkUp => self.on_link_up(),
            TransportEvent::LinkDown => self.on_link_down(),
            TransportEvent::Frame(frame) => self.on_frame(&frame, now),
            TransportEvent::Error(message) => {
                tracing::warn!(state = %self.state, "Transport error: {}", message);
                Vec::new()
            },
        }
    }

    /// Run the watchdog and heartbeat timers.
    ///
    /// Call once per tick, after the tick's transport events.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionAction> {
        if self.state == SessionState::Disconnected {
            return Vec::new();
        }

        if let Some(silence) = self.liveness.check_timeout(now) {
            tracing::warn!(
                state = %self.state,
                "No inbound activity for {:?}, resetting link",
                silence
            );
            return self.reset_link(format!("no inbound activity for {silence:?}"), now);
        }

        if self.is_authenticated() && self.liveness.poll_heartbeat(now) {
            tracing::debug!("Sending heartbeat");
            return vec![SessionAction::Send(Message::heartbeat(self.uptime_ms(now)))];
        }

        Vec::new()
    }

    /// Drop the link from the device side.
    ///
    /// Used by the watchdog and by the host. Restarts the activity clock so the
    /// next link gets a full timeout window. When the link never came up
    /// only the close is emitted; the host already sees `(false, false)`.
    pub fn reset_link(&mut self, reason: String, now: Instant) -> Vec<SessionAction> {
        let was_up = self.is_link_up();
        self.state = SessionState::Disconnected;
        self.link_id = None;
        self.liveness.record_inbound(now);

        if !was_up {
            return vec![SessionAction::Close { reason }];
        }
        vec![
            SessionAction::Close { reason },
            SessionAction::SetIndicator(false),
            SessionAction::StatusChanged(LinkStatus::new(false, false)),
        ]
    }

    fn on_link_up(&mut self) -> Vec<SessionAction> {
        if self.is_link_up() {
            tracing::warn!(state = %self.state, "Link-up while link already up; ignoring");
            return Vec::new();
        }

        let link_id = Uuid::new_v4();
        self.link_id = Some(link_id);
        self.state = SessionState::AuthPending;
        tracing::info!(link = %link_id, "Link up, authenticating");

        vec![
            SessionAction::Send(Message::auth(&self.credentials)),
            SessionAction::StatusChanged(LinkStatus::new(true, false)),
        ]
    }

    fn on_link_down(&mut self) -> Vec<SessionAction> {
        if self.state == SessionState::Disconnected {
            tracing::debug!("Link-down while already disconnected");
            return Vec::new();
        }

        tracing::info!(state = %self.state, "Link down");
        self.state = SessionState::Disconnected;
        self.link_id = None;

        vec![
            SessionAction::SetIndicator(false),
            SessionAction::StatusChanged(LinkStatus::new(false, false)),
        ]
    }

    fn on_frame(&mut self, frame: &[u8], now: Instant) -> Vec<SessionAction> {
        let message = match self.codec.decode(frame) {
            Ok(message) => message,
            Err(LinkError::UnknownKind(kind)) => {
                tracing::warn!(kind = %kind, "Dropping frame of unknown kind");
                return Vec::new();
            },
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {}", e);
                return Vec::new();
            },
        };

        match message {
            Message::AuthSuccess if self.state == SessionState::AuthPending => {
                self.state = SessionState::Authenticated;
                self.liveness.restart_heartbeat(now);
                tracing::info!(link = ?self.link_id, "Authenticated");

                vec![
                    SessionAction::SetIndicator(true),
                    SessionAction::StatusChanged(LinkStatus::new(true, true)),
                ]
            },
            Message::AuthError if self.is_link_up() => {
                self.state = SessionState::Unauthenticated;
                tracing::warn!(link = ?self.link_id, "Authentication rejected by coordinator");

                vec![
                    SessionAction::SetIndicator(false),
                    SessionAction::StatusChanged(LinkStatus::new(true, false)),
                ]
            },
            Message::Command { id, payload } if self.is_authenticated() => {
                vec![SessionAction::Dispatch(PendingCommand { id, payload })]
            },
            Message::Command { id, .. } => {
                tracing::debug!(id = %id, state = %self.state, "Dropping command on unauthenticated session");
                Vec::new()
            },
            other => {
                tracing::debug!(
                    kind = other.kind(),
                    state = %self.state,
                    "Ignoring unexpected message"
                );
                Vec::new()
            },
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("credentials", &self.credentials)
            .field("liveness", &self.liveness)
            .field("link_id", &self.link_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::AckStatus;

    fn frame(json: &str) -> TransportEvent {
        TransportEvent::Frame(json.as_bytes().to_vec())
    }

    fn session(t0: Instant) -> Session {
        Session::new(
            Credentials::new("key", "secret"),
            &SessionConfig::default(),
            t0,
        )
    }

    fn authenticated(t0: Instant) -> Session {
        let mut s = session(t0);
        s.handle_event(TransportEvent::LinkUp, t0);
        s.handle_event(frame(r#"{"type":"auth_success"}"#), t0);
        assert_eq!(s.state(), SessionState::Authenticated);
        s
    }

    #[test]
    fn test_link_up_sends_auth() {
        let t0 = Instant::now();
        let mut s = session(t0);
        assert!(s.begin_connect(t0));
        assert_eq!(s.state(), SessionState::LinkEstablishing);

        let actions = s.handle_event(TransportEvent::LinkUp, t0);
        assert_eq!(s.state(), SessionState::AuthPending);
        assert!(s.link_id().is_some());
        assert_eq!(
            actions,
            vec![
                SessionAction::Send(Message::auth(&Credentials::new("key", "secret"))),
                SessionAction::StatusChanged(LinkStatus::new(true, false)),
            ]
        );
    }

    #[test]
    fn test_second_link_up_does_not_reauthenticate() {
        let t0 = Instant::now();
        let mut s = session(t0);
        s.handle_event(TransportEvent::LinkUp, t0);

        let actions = s.handle_event(TransportEvent::LinkUp, t0);
        assert!(actions.is_empty());
        assert_eq!(s.state(), SessionState::AuthPending);
    }

    #[test]
    fn test_auth_success() {
        let t0 = Instant::now();
        let mut s = session(t0);
        s.handle_event(TransportEvent::LinkUp, t0);

        let t1 = t0 + Duration::from_secs(2);
        let actions = s.handle_event(frame(r#"{"type":"auth_success"}"#), t1);
        assert!(s.is_authenticated());
        assert_eq!(s.last_heartbeat_sent(), t1);
        assert_eq!(
            actions,
            vec![
                SessionAction::SetIndicator(true),
                SessionAction::StatusChanged(LinkStatus::new(true, true)),
            ]
        );
    }

    #[test]
    fn test_auth_success_outside_pending_is_ignored() {
        let t0 = Instant::now();
        let mut s = session(t0);
        assert!(s.handle_event(frame(r#"{"type":"auth_success"}"#), t0).is_empty());
        assert_eq!(s.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_auth_error_keeps_link_up() {
        let t0 = Instant::now();
        let mut s = session(t0);
        s.handle_event(TransportEvent::LinkUp, t0);

        let actions = s.handle_event(frame(r#"{"type":"auth_error"}"#), t0);
        assert_eq!(s.state(), SessionState::Unauthenticated);
        assert!(s.is_link_up());
        assert_eq!(
            actions,
            vec![
                SessionAction::SetIndicator(false),
                SessionAction::StatusChanged(LinkStatus::new(true, false)),
            ]
        );
    }

    #[test]
    fn test_link_down_from_authenticated() {
        let t0 = Instant::now();
        let mut s = authenticated(t0);

        let actions = s.handle_event(TransportEvent::LinkDown, t0);
        assert_eq!(s.state(), SessionState::Disconnected);
        assert_eq!(s.auth_state(), AuthState::Unauthenticated);
        assert_eq!(
            actions,
            vec![
                SessionAction::SetIndicator(false),
                SessionAction::StatusChanged(LinkStatus::new(false, false)),
            ]
        );

        // Repeated link-down is not a transition
        assert!(s.handle_event(TransportEvent::LinkDown, t0).is_empty());
    }

    #[test]
    fn test_command_dispatched_only_when_authenticated() {
        let t0 = Instant::now();
        let mut s = session(t0);
        s.handle_event(TransportEvent::LinkUp, t0);

        let cmd = r#"{"type":"command","id":"1","payload":"LED_ON"}"#;
        assert!(s.handle_event(frame(cmd), t0).is_empty());

        s.handle_event(frame(r#"{"type":"auth_success"}"#), t0);
        assert_eq!(
            s.handle_event(frame(cmd), t0),
            vec![SessionAction::Dispatch(PendingCommand::new("1", "LED_ON"))]
        );
    }

    #[test]
    fn test_malformed_frames_are_dropped_but_count_as_activity() {
        let t0 = Instant::now();
        let mut s = authenticated(t0);

        let t1 = t0 + Duration::from_secs(50);
        assert!(s.handle_event(frame("{not json"), t1).is_empty());
        assert!(s.handle_event(frame(r#"{"type":"mystery"}"#), t1).is_empty());
        assert_eq!(s.last_inbound_activity(), t1);
        assert!(s.is_authenticated());
    }

    #[test]
    fn test_heartbeat_only_when_authenticated() {
        let t0 = Instant::now();
        let mut s = session(t0);
        s.handle_event(TransportEvent::LinkUp, t0);

        // Keep the link alive but never authenticate
        let t1 = t0 + Duration::from_secs(30);
        s.handle_event(TransportEvent::Error("noise".to_string()), t1);
        assert!(s.tick(t1).is_empty());

        s.handle_event(frame(r#"{"type":"auth_success"}"#), t1);
        assert!(s.tick(t1 + Duration::from_secs(24)).is_empty());

        let t2 = t1 + Duration::from_secs(25);
        s.handle_event(TransportEvent::Error("noise".to_string()), t2);
        assert_eq!(
            s.tick(t2),
            vec![SessionAction::Send(Message::heartbeat(s.uptime_ms(t2)))]
        );
    }

    #[test]
    fn test_watchdog_resets_authenticated_session() {
        let t0 = Instant::now();
        let mut s = authenticated(t0);

        let t1 = t0 + Duration::from_secs(61);
        let actions = s.tick(t1);
        assert_eq!(s.state(), SessionState::Disconnected);
        assert_eq!(s.last_inbound_activity(), t1);
        assert!(matches!(actions[0], SessionAction::Close { .. }));
        assert_eq!(
            actions[1..],
            [
                SessionAction::SetIndicator(false),
                SessionAction::StatusChanged(LinkStatus::new(false, false)),
            ]
        );
    }

    #[test]
    fn test_fresh_activity_wins_over_timeout() {
        let t0 = Instant::now();
        let mut s = authenticated(t0);

        let t1 = t0 + Duration::from_secs(61);
        s.handle_event(frame(r#"{"type":"command","id":"1","payload":"X"}"#), t1);
        let actions = s.tick(t1);
        assert!(s.is_authenticated());
        assert!(!actions
            .iter()
            .any(|a| matches!(a, SessionAction::Close { .. })));
    }

    #[test]
    fn test_watchdog_idle_when_disconnected() {
        let t0 = Instant::now();
        let mut s = session(t0);
        assert!(s.tick(t0 + Duration::from_secs(3600)).is_empty());
    }

    #[test]
    fn test_watchdog_covers_stalled_handshake() {
        let t0 = Instant::now();
        let mut s = session(t0);
        s.handle_event(TransportEvent::LinkUp, t0);

        let actions = s.tick(t0 + Duration::from_secs(61));
        assert_eq!(s.state(), SessionState::Disconnected);
        assert!(matches!(actions[0], SessionAction::Close { .. }));
    }

    #[test]
    fn test_watchdog_before_link_up_only_closes() {
        let t0 = Instant::now();
        let mut s = session(t0);
        assert!(s.begin_connect(t0));

        let actions = s.tick(t0 + Duration::from_secs(61));
        assert_eq!(s.state(), SessionState::Disconnected);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], SessionAction::Close { .. }));
    }

    #[test]
    fn test_outbound_messages_are_ignored_inbound() {
        let t0 = Instant::now();
        let mut s = authenticated(t0);
        let echo = s
            .encode(&Message::ack("1", AckStatus::Executed, 5))
            .unwrap();
        assert!(s.handle_event(frame(&echo), t0).is_empty());
    }

    #[test]
    fn test_config_validation() {
        assert!(SessionConfig::default().validate().is_ok());

        let inverted = SessionConfig {
            heartbeat_interval: Duration::from_secs(60),
            connection_timeout: Duration::from_secs(25),
        };
        assert!(matches!(inverted.validate(), Err(LinkError::Config(_))));

        let zero = SessionConfig {
            heartbeat_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let s = session(Instant::now());
        let debug = format!("{s:?}");
        assert!(!debug.contains("\"secret\""));
        assert!(!debug.contains("\"key\""));
        assert!(debug.contains("REDACTED"));
    }
}
