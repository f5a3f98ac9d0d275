//! Transport configuration: where to connect and how to keep the link alive.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Default coordinator host.
pub const DEFAULT_HOST: &str = "api.scify-tech.com";

/// Coordinator address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// WebSocket path
    pub path: String,
    /// Use TLS (`wss://`)
    pub tls: bool,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 443,
            path: "/ws".to_string(),
            tls: true,
        }
    }
}

impl Endpoint {
    /// Create a TLS endpoint.
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
            tls: true,
        }
    }

    /// Use plain `ws://` instead of TLS.
    pub fn without_tls(mut self) -> Self {
        self.tls = false;
        self
    }

    /// Full WebSocket URL.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}:{}{}", scheme, self.host, self.port, path)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// WebSocket transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketConfig {
    /// Wait between reconnect attempts
    pub reconnect_interval: Duration,
    /// Bound on TCP connect and handshake
    pub connect_timeout: Duration,
    /// WebSocket ping cadence (zero disables keepalive)
    pub ping_interval: Duration,
    /// How long to wait for each pong
    pub pong_timeout: Duration,
    /// Missed pongs before the link is dropped
    pub max_missed_pongs: u32,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_millis(5000),
            connect_timeout: Duration::from_millis(5000),
            ping_interval: Duration::from_millis(15000),
            pong_timeout: Duration::from_millis(3000),
            max_missed_pongs: 2,
        }
    }
}

impl WebSocketConfig {
    /// Reject settings the transport cannot run with.
    ///
    /// A zero connect timeout makes every connect attempt fail. With pings
    /// enabled, a zero pong timeout or miss budget drops a healthy link.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(LinkError::Config(
                "connect timeout must be non-zero".to_string(),
            ));
        }
        if !self.ping_interval.is_zero() {
            if self.pong_timeout.is_zero() {
                return Err(LinkError::Config(
                    "pong timeout must be non-zero when pings are enabled".to_string(),
                ));
            }
            if self.max_missed_pongs == 0 {
                return Err(LinkError::Config(
                    "max missed pongs must be at least 1 when pings are enabled".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_url() {
        assert_eq!(Endpoint::default().url(), "wss://api.scify-tech.com:443/ws");
    }

    #[test]
    fn test_plain_endpoint_url() {
        let endpoint = Endpoint::new("127.0.0.1", 8080, "socket").without_tls();
        assert_eq!(endpoint.url(), "ws://127.0.0.1:8080/socket");
        assert_eq!(endpoint.to_string(), endpoint.url());
    }

    #[test]
    fn test_keepalive_defaults() {
        let config = WebSocketConfig::default();
        assert_eq!(config.reconnect_interval, Duration::from_secs(5));
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert_eq!(config.pong_timeout, Duration::from_secs(3));
        assert_eq!(config.max_missed_pongs, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeouts() {
        let zero_connect = WebSocketConfig {
            connect_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(zero_connect.validate(), Err(LinkError::Config(_))));

        let zero_pong = WebSocketConfig {
            pong_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_pong.validate().is_err());

        let no_misses = WebSocketConfig {
            max_missed_pongs: 0,
            ..Default::default()
        };
        assert!(no_misses.validate().is_err());

        let pings_off = WebSocketConfig {
            ping_interval: Duration::ZERO,
            pong_timeout: Duration::ZERO,
            max_missed_pongs: 0,
            ..Default::default()
        };
        assert!(pings_off.validate().is_ok());
    }
}
