//! Host-facing client.
//!
//! [`Client`] owns the session state machine, the command dispatcher, the
//! transport and the device, and executes the actions the state machine
//! returns. Everything runs on the caller's thread from [`Client::tick`].
//!
//! # Example
//!
//! ```no_run
//! use fieldlink::{Client, Credentials, Endpoint, SimulatedDevice, WebSocketTransport};
//!
//! # fn main() -> fieldlink::Result<()> {
//! let mut client = Client::builder(WebSocketTransport::default(), SimulatedDevice::new())
//!     .credentials(Credentials::new("device-key", "device-secret"))
//!     .endpoint(Endpoint::new("coordinator.local", 443, "/ws"))
//!     .on_status_change(|status| println!("status: {status:?}"))
//!     .build()?;
//!
//! client.connect()?;
//! loop {
//!     client.tick();
//!     std::thread::sleep(std::time::Duration::from_millis(50));
//! }
//! # }
//! ```

use std::fmt;
use std::ops::ControlFlow;
use std::time::Instant;

use serde_json::{Map, Value};

use crate::clock::{Clock, SystemClock};
use crate::config::Credentials;
use crate::device::{Device, Reading};
use crate::error::{LinkError, Result};
use crate::protocol::{
    AckStatus, Codec, CommandHandler, DispatchAction, Dispatcher, LinkStatus, Message,
    PendingCommand, Session, SessionAction, SessionConfig, SessionState,
};
use crate::transport::{Endpoint, Transport};

/// Host callback for connectivity changes.
pub type StatusHandler = Box<dyn FnMut(LinkStatus)>;

/// Builder for [`Client`].
pub struct ClientBuilder<T, D> {
    transport: T,
    device: D,
    credentials: Option<Credentials>,
    endpoint: Endpoint,
    session_config: SessionConfig,
    codec: Option<Box<dyn Codec>>,
    clock: Option<Box<dyn Clock>>,
    command_handler: Option<CommandHandler>,
    status_handler: Option<StatusHandler>,
}

impl<T: Transport, D: Device> ClientBuilder<T, D> {
    /// Credentials presented on every link-up (required)
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Coordinator address
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Heartbeat and watchdog timing
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Message codec (JSON by default)
    pub fn codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Some(Box::new(codec));
        self
    }

    /// Time source ([`SystemClock`] by default)
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Handler for commands outside the built-in set
    pub fn on_command(mut self, handler: impl FnMut(&PendingCommand) + 'static) -> Self {
        self.command_handler = Some(Box::new(handler));
        self
    }

    /// Handler for connectivity changes
    pub fn on_status_change(mut self, handler: impl FnMut(LinkStatus) + 'static) -> Self {
        self.status_handler = Some(Box::new(handler));
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> Result<Client<T, D>> {
        let credentials = self
            .credentials
            .ok_or_else(|| LinkError::Config("credentials are required".to_string()))?;
        if credentials.is_incomplete() {
            return Err(LinkError::Config(
                "api key and secret must both be set".to_string(),
            ));
        }
        self.session_config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Box::new(SystemClock));
        let mut session = Session::new(credentials, &self.session_config, clock.now());
        if let Some(codec) = self.codec {
            session = session.with_codec(codec);
        }

        let mut dispatcher = Dispatcher::new();
        if let Some(handler) = self.command_handler {
            dispatcher.set_handler(handler);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            transport = self.transport.name(),
            "Client configured"
        );

        Ok(Client {
            session,
            dispatcher,
            transport: self.transport,
            device: self.device,
            clock,
            endpoint: self.endpoint,
            status_handler: self.status_handler,
        })
    }
}

/// Device-side client for one coordinator session.
pub struct Client<T, D> {
    session: Session,
    dispatcher: Dispatcher,
    transport: T,
    device: D,
    clock: Box<dyn Clock>,
    endpoint: Endpoint,
    status_handler: Option<StatusHandler>,
}

impl<T: Transport, D: Device> Client<T, D> {
    /// Start building a client around a transport and a device.
    pub fn builder(transport: T, device: D) -> ClientBuilder<T, D> {
        ClientBuilder {
            transport,
            device,
            credentials: None,
            endpoint: Endpoint::default(),
            session_config: SessionConfig::default(),
            codec: None,
            clock: None,
            command_handler: None,
            status_handler: None,
        }
    }

    /// Ask the transport to open the link.
    ///
    /// Does nothing unless the session is disconnected. The link comes up
    /// later, during [`tick`](Self::tick).
    pub fn connect(&mut self) -> Result<()> {
        if self.session.state() != SessionState::Disconnected {
            tracing::debug!(state = %self.session.state(), "Connect ignored");
            return Ok(());
        }
        self.transport.open(&self.endpoint)?;
        self.session.begin_connect(self.clock.now());
        Ok(())
    }

    /// Run one cooperative step: drain transport events, then run timers.
    pub fn tick(&mut self) {
        let now = self.clock.now();

        for event in self.transport.poll() {
            let actions = self.session.handle_event(event, now);
            if self.execute(actions, now).is_break() {
                return;
            }
        }

        let actions = self.session.tick(now);
        let _ = self.execute(actions, now);
    }

    /// Check if the transport link is up
    pub fn is_link_up(&self) -> bool {
        self.session.is_link_up()
    }

    /// Check if the session is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Current connectivity
    pub fn status(&self) -> LinkStatus {
        self.session.status()
    }

    /// Send a telemetry report with `reading`.
    pub fn send_telemetry(&mut self, reading: Reading) -> Result<()> {
        self.require_authenticated()?;
        let now = self.clock.now();
        let message = self.telemetry(reading, now);
        self.send(&message)
    }

    /// Send an application-defined report.
    ///
    /// `kind` must not be empty or one of the protocol's own message kinds.
    pub fn send_custom_report(&mut self, kind: &str, payload: Map<String, Value>) -> Result<()> {
        self.require_authenticated()?;
        let timestamp = self.session.uptime_ms(self.clock.now());
        self.send(&Message::custom(kind, payload, timestamp))
    }

    /// Acknowledge a command that was delegated to the command handler.
    ///
    /// Each delegated id can be acknowledged once; later calls fail with
    /// [`LinkError::UnknownCommand`].
    pub fn acknowledge_command(&mut self, command_id: &str, status: AckStatus) -> Result<()> {
        self.require_authenticated()?;
        self.dispatcher.settle(command_id)?;
        let timestamp = self.session.uptime_ms(self.clock.now());
        self.send(&Message::ack(command_id, status, timestamp))
    }

    /// Register the handler for non-built-in commands, replacing any previous
    /// one.
    pub fn on_command(&mut self, handler: impl FnMut(&PendingCommand) + 'static) {
        self.dispatcher.set_handler(Box::new(handler));
    }

    /// Register the connectivity handler, replacing any previous one.
    pub fn on_status_change(&mut self, handler: impl FnMut(LinkStatus) + 'static) {
        self.status_handler = Some(Box::new(handler));
    }

    /// Reboot the device.
    ///
    /// If the device's reboot returns (simulated hardware), the link is reset
    /// as if the device had come back up.
    pub fn restart(&mut self) {
        let now = self.clock.now();
        self.reboot(now);
    }

    /// Drop the current link from the device side.
    ///
    /// The transport's reconnect policy still applies, so the link comes back
    /// and re-authenticates on a later tick.
    pub fn disconnect(&mut self) {
        let now = self.clock.now();
        if self.session.state() == SessionState::Disconnected {
            return;
        }
        let actions = self.session.reset_link("disconnect requested by host".to_string(), now);
        let _ = self.execute(actions, now);
    }

    /// Number of delegated commands awaiting acknowledgement
    pub fn outstanding_commands(&self) -> usize {
        self.dispatcher.outstanding()
    }

    /// Get the session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Get the coordinator address
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get the transport mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Get the device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Get the device mutably
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn require_authenticated(&self) -> Result<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(LinkError::NotAuthenticated)
        }
    }

    fn telemetry(&mut self, reading: Reading, now: Instant) -> Message {
        Message::sensor_data(
            reading,
            self.device.free_memory(),
            self.device.link_signal_strength(),
            self.session.uptime_ms(now),
        )
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        let frame = self.session.encode(message)?;
        self.transport.send(&frame)
    }

    /// Send from inside a tick, where failures are only logged.
    fn send_logged(&mut self, message: &Message) {
        if let Err(e) = self.send(message) {
            tracing::warn!(kind = message.kind(), "Send failed: {}", e);
        }
    }

    fn execute(&mut self, actions: Vec<SessionAction>, now: Instant) -> ControlFlow<()> {
        for action in actions {
            match action {
                SessionAction::Send(message) => self.send_logged(&message),
                SessionAction::Close { reason } => {
                    tracing::info!(transport = self.transport.name(), "Closing link: {}", reason);
                    self.transport.close();
                },
                SessionAction::SetIndicator(on) => self.device.set_indicator(on),
                SessionAction::StatusChanged(status) => {
                    if !status.authenticated {
                        self.dispatcher.reset();
                    }
                    if let Some(handler) = self.status_handler.as_mut() {
                        handler(status);
                    }
                },
                SessionAction::Dispatch(command) => {
                    for effect in self.dispatcher.dispatch(command) {
                        match effect {
                            DispatchAction::SetIndicator(on) => self.device.set_indicator(on),
                            DispatchAction::ReportStatus => {
                                let reading = self.device.sample();
                                let message = self.telemetry(reading, now);
                                self.send_logged(&message);
                            },
                            DispatchAction::Acknowledge { command_id, status } => {
                                let timestamp = self.session.uptime_ms(now);
                                self.send_logged(&Message::ack(&command_id, status, timestamp));
                            },
                            DispatchAction::Reboot => {
                                self.reboot(now);
                                return ControlFlow::Break(());
                            },
                        }
                    }
                },
            }
        }
        ControlFlow::Continue(())
    }

    fn reboot(&mut self, now: Instant) {
        self.device.reboot();

        // Only reached when the device survives its own reboot
        if self.session.state() != SessionState::Disconnected {
            let actions = self.session.reset_link("device restarted".to_string(), now);
            let _ = self.execute(actions, now);
        }
    }
}

impl<T, D> fmt::Debug for Client<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("dispatcher", &self.dispatcher)
            .field("endpoint", &self.endpoint)
            .field("has_status_handler", &self.status_handler.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::device::SimulatedDevice;
    use crate::transport::LoopbackTransport;

    fn client(clock: &ManualClock) -> Client<LoopbackTransport, SimulatedDevice> {
        Client::builder(LoopbackTransport::new(), SimulatedDevice::new())
            .credentials(Credentials::new("key", "secret"))
            .clock(clock.clone())
            .build()
            .unwrap()
    }

    fn authenticate(client: &mut Client<LoopbackTransport, SimulatedDevice>) {
        client.connect().unwrap();
        client.transport_mut().link_up();
        client.transport_mut().deliver(r#"{"type":"auth_success"}"#);
        client.tick();
        assert!(client.is_authenticated());
    }

    #[test]
    fn test_build_requires_credentials() {
        let missing = Client::builder(LoopbackTransport::new(), SimulatedDevice::new()).build();
        assert!(matches!(missing, Err(LinkError::Config(_))));

        let empty = Client::builder(LoopbackTransport::new(), SimulatedDevice::new())
            .credentials(Credentials::new("", "secret"))
            .build();
        assert!(matches!(empty, Err(LinkError::Config(_))));
    }

    #[test]
    fn test_build_rejects_bad_timers() {
        let result = Client::builder(LoopbackTransport::new(), SimulatedDevice::new())
            .credentials(Credentials::new("key", "secret"))
            .session_config(SessionConfig {
                heartbeat_interval: Duration::from_secs(90),
                connection_timeout: Duration::from_secs(60),
            })
            .build();
        assert!(matches!(result, Err(LinkError::Config(_))));
    }

    #[test]
    fn test_connect_opens_endpoint_once() {
        let clock = ManualClock::new();
        let mut client = client(&clock);
        client.connect().unwrap();
        client.connect().unwrap();

        assert_eq!(client.state(), SessionState::LinkEstablishing);
        assert_eq!(client.transport().opened(), &[Endpoint::default()]);
    }

    #[test]
    fn test_sends_require_authentication() {
        let clock = ManualClock::new();
        let mut client = client(&clock);

        assert!(matches!(
            client.send_telemetry(Reading::default()),
            Err(LinkError::NotAuthenticated)
        ));
        assert!(matches!(
            client.send_custom_report("door", Map::new()),
            Err(LinkError::NotAuthenticated)
        ));
        assert!(matches!(
            client.acknowledge_command("1", AckStatus::Executed),
            Err(LinkError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_telemetry_carries_device_health() {
        let clock = ManualClock::new();
        let mut client = Client::builder(
            LoopbackTransport::new(),
            SimulatedDevice::new()
                .with_free_memory(4096)
                .with_signal_strength(-71),
        )
        .credentials(Credentials::new("key", "secret"))
        .clock(clock.clone())
        .build()
        .unwrap();
        authenticate(&mut client);

        clock.advance(Duration::from_millis(1500));
        client.send_telemetry(Reading::new(19.5, 45.0)).unwrap();

        let reports = client.transport().sent_of_kind("sensor_data");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0]["payload"]["temperature"], 19.5);
        assert_eq!(reports[0]["payload"]["free_heap"], 4096);
        assert_eq!(reports[0]["payload"]["wifi_rssi"], -71);
        assert_eq!(reports[0]["timestamp"], 1500);
    }

    #[test]
    fn test_custom_report_rejects_reserved_kind() {
        let clock = ManualClock::new();
        let mut client = client(&clock);
        authenticate(&mut client);

        assert!(matches!(
            client.send_custom_report("heartbeat", Map::new()),
            Err(LinkError::InvalidMessage(_))
        ));

        let mut payload = Map::new();
        payload.insert("open".to_string(), Value::Bool(true));
        client.send_custom_report("door", payload).unwrap();
        let sent = client.transport().sent_of_kind("door");
        assert_eq!(sent[0]["payload"]["open"], true);
    }

    #[test]
    fn test_disconnect_closes_transport() {
        let clock = ManualClock::new();
        let mut client = client(&clock);
        authenticate(&mut client);

        client.disconnect();
        assert_eq!(client.state(), SessionState::Disconnected);
        assert_eq!(client.transport().close_requests(), 1);
        assert!(!client.device().indicator());

        // The transport's link-down arrives on the next tick and is absorbed
        client.tick();
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_restart_reboots_device() {
        let clock = ManualClock::new();
        let mut client = client(&clock);
        authenticate(&mut client);

        client.restart();
        assert_eq!(client.device().reboots(), 1);
        assert_eq!(client.state(), SessionState::Disconnected);
    }
}
