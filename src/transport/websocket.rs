//! WebSocket transport (ws/wss) built on tungstenite.
//!
//! The socket is switched to non-blocking mode after the handshake, so
//! [`poll`](Transport::poll) only blocks while a connect attempt is in
//! progress, and that is bounded by `connect_timeout`. After link loss the
//! transport retries every `reconnect_interval` until it is dropped.

use std::io::ErrorKind;
use std::mem;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Instant;

use tungstenite::protocol::Message as WsMessage;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::WebSocket;

use super::{Endpoint, Transport, TransportEvent, WebSocketConfig};
use crate::error::{LinkError, Result};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// WebSocket-ping bookkeeping for the current link.
#[derive(Debug, Clone, Copy)]
struct Keepalive {
    last_ping: Instant,
    awaiting_pong: Option<Instant>,
    missed: u32,
}

impl Keepalive {
    fn new(now: Instant) -> Self {
        Self {
            last_ping: now,
            awaiting_pong: None,
            missed: 0,
        }
    }
}

/// WebSocket client transport with fixed-interval reconnect.
pub struct WebSocketTransport {
    config: WebSocketConfig,
    endpoint: Option<Endpoint>,
    socket: Option<Socket>,
    next_attempt: Option<Instant>,
    keepalive: Keepalive,
    pending: Vec<TransportEvent>,
}

impl WebSocketTransport {
    /// Create a transport; nothing happens until [`open`](Transport::open).
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            config,
            endpoint: None,
            socket: None,
            next_attempt: None,
            keepalive: Keepalive::new(Instant::now()),
            pending: Vec::new(),
        }
    }

    /// Close the link and stop reconnecting.
    pub fn shutdown(&mut self) {
        self.close();
        self.endpoint = None;
        self.next_attempt = None;
    }

    fn connect(&self, endpoint: &Endpoint) -> Result<Socket> {
        let url = endpoint.url();
        let addr = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| LinkError::Transport(format!("{} did not resolve", endpoint.host)))?;

        let stream = TcpStream::connect_timeout(&addr, self.config.connect_timeout)?;
        stream.set_nodelay(true)?;
        // Bound the handshake; the socket goes non-blocking afterwards
        stream.set_read_timeout(Some(self.config.connect_timeout))?;
        stream.set_write_timeout(Some(self.config.connect_timeout))?;

        let (mut socket, response) = tungstenite::client_tls(url.as_str(), stream)
            .map_err(|e| LinkError::Transport(format!("handshake with {url} failed: {e}")))?;
        set_nonblocking(&mut socket)?;

        tracing::info!(url = %url, status = %response.status(), "WebSocket connected");
        Ok(socket)
    }

    fn try_connect(&mut self, now: Instant) {
        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };
        if self.next_attempt.is_some_and(|at| now < at) {
            return;
        }

        match self.connect(&endpoint) {
            Ok(socket) => {
                self.socket = Some(socket);
                self.next_attempt = None;
                self.keepalive = Keepalive::new(now);
                self.pending.push(TransportEvent::LinkUp);
            },
            Err(e) => {
                tracing::debug!(url = %endpoint, "Connect attempt failed: {}", e);
                self.next_attempt = Some(now + self.config.reconnect_interval);
                self.pending.push(TransportEvent::Error(e.to_string()));
            },
        }
    }

    fn drop_link(&mut self, reason: &str) {
        if self.socket.take().is_some() {
            tracing::info!("WebSocket link lost: {}", reason);
            self.next_attempt = Some(Instant::now() + self.config.reconnect_interval);
            self.pending.push(TransportEvent::LinkDown);
        }
    }

    fn read_frames(&mut self) {
        loop {
            let Some(socket) = self.socket.as_mut() else {
                return;
            };

            match socket.read() {
                Ok(WsMessage::Text(text)) => self.pending.push(TransportEvent::Frame(text.into_bytes())),
                Ok(WsMessage::Binary(data)) => self.pending.push(TransportEvent::Frame(data)),
                Ok(WsMessage::Pong(_)) => {
                    self.keepalive.awaiting_pong = None;
                    self.keepalive.missed = 0;
                },
                // Pings are answered by tungstenite on the next write/flush;
                // a Close is followed by ConnectionClosed on the next read
                Ok(WsMessage::Ping(_) | WsMessage::Close(_) | WsMessage::Frame(_)) => {},
                Err(tungstenite::Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => return,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    self.drop_link("closed by peer");
                    return;
                },
                Err(e) => {
                    self.pending.push(TransportEvent::Error(e.to_string()));
                    self.drop_link("read error");
                    return;
                },
            }
        }
    }

    fn keep_alive(&mut self, now: Instant) {
        if self.config.ping_interval.is_zero() {
            return;
        }

        if let Some(sent) = self.keepalive.awaiting_pong {
            if now.saturating_duration_since(sent) >= self.config.pong_timeout {
                self.keepalive.awaiting_pong = None;
                self.keepalive.missed += 1;
                tracing::debug!(missed = self.keepalive.missed, "WebSocket pong overdue");

                if self.keepalive.missed >= self.config.max_missed_pongs {
                    self.pending.push(TransportEvent::Error(format!(
                        "{} pongs missed",
                        self.keepalive.missed
                    )));
                    self.drop_link("keepalive failed");
                    return;
                }
            }
        }

        if self.keepalive.awaiting_pong.is_none()
            && now.saturating_duration_since(self.keepalive.last_ping) >= self.config.ping_interval
        {
            let Some(socket) = self.socket.as_mut() else {
                return;
            };
            self.keepalive.last_ping = now;
            self.keepalive.awaiting_pong = Some(now);
            match socket.send(WsMessage::Ping(Vec::new())) {
                Ok(()) => {},
                Err(tungstenite::Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => {},
                Err(e) => {
                    self.pending.push(TransportEvent::Error(e.to_string()));
                    self.drop_link("ping failed");
                },
            }
        }
    }

    fn flush(&mut self) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        match socket.flush() {
            Ok(()) => {},
            Err(tungstenite::Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => {},
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                self.drop_link("closed while flushing");
            },
            Err(e) => {
                self.pending.push(TransportEvent::Error(e.to_string()));
                self.drop_link("write error");
            },
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(WebSocketConfig::default())
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self, endpoint: &Endpoint) -> Result<()> {
        tracing::info!(url = %endpoint, "Opening WebSocket transport");
        self.endpoint = Some(endpoint.clone());
        self.next_attempt = None;
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let now = Instant::now();

        if self.socket.is_none() {
            self.try_connect(now);
        }
        if self.socket.is_some() {
            self.read_frames();
        }
        if self.socket.is_some() {
            self.keep_alive(now);
            self.flush();
        }

        mem::take(&mut self.pending)
    }

    fn send(&mut self, frame: &str) -> Result<()> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(LinkError::Transport("not connected".to_string()));
        };

        match socket.send(WsMessage::Text(frame.to_string())) {
            Ok(()) => Ok(()),
            // Queued in the write buffer; flushed on the next poll
            Err(tungstenite::Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => {
                let err = LinkError::from(e);
                self.pending.push(TransportEvent::Error(err.to_string()));
                self.drop_link("send failed");
                Err(err)
            },
        }
    }

    fn close(&mut self) {
        if let Some(socket) = self.socket.as_mut() {
            // Best effort: the peer may already be gone
            let _ = socket.close(None);
            let _ = socket.flush();
        }
        self.drop_link("closed locally");
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn name(&self) -> &'static str {
        "WebSocket"
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn set_nonblocking(socket: &mut Socket) -> std::io::Result<()> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_nonblocking(true),
        MaybeTlsStream::Rustls(stream) => stream.get_mut().set_nonblocking(true),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_poll_before_open_is_idle() {
        let mut transport = WebSocketTransport::default();
        assert!(transport.poll().is_empty());
        assert!(!transport.is_connected());
        assert_eq!(transport.name(), "WebSocket");
    }

    #[test]
    fn test_send_without_link_fails() {
        let mut transport = WebSocketTransport::default();
        assert!(matches!(
            transport.send("{}"),
            Err(LinkError::Transport(_))
        ));
    }

    #[test]
    fn test_failed_connect_reports_error_and_backs_off() {
        // Grab a free port, then release it so nothing is listening
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let config = WebSocketConfig {
            reconnect_interval: Duration::from_secs(60),
            connect_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let mut transport = WebSocketTransport::new(config);
        transport
            .open(&Endpoint::new("127.0.0.1", port, "/ws").without_tls())
            .unwrap();

        let events = transport.poll();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], TransportEvent::Error(_)));

        // Next attempt is a minute away
        assert!(transport.poll().is_empty());
    }
}
