//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`FIELDLINK_*`)
//! - CLI arguments (for the agent binary)

mod credentials;

pub use credentials::{Credentials, Secret};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::protocol::{
    SessionConfig, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_HEARTBEAT_INTERVAL_SECS,
};
use crate::transport::{Endpoint, WebSocketConfig};

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Coordinator address
    #[serde(default)]
    pub server: ServerConfig,

    /// Device identity
    #[serde(default)]
    pub device: DeviceConfig,

    /// Session timers
    #[serde(default)]
    pub session: SessionTimers,

    /// WebSocket transport tuning
    #[serde(default)]
    pub transport: TransportConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Config {
    /// Default config file location (`<config dir>/fieldlink/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fieldlink").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LinkError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        toml::from_str(&content)
            .map_err(|e| LinkError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server settings
        if let Ok(host) = std::env::var("FIELDLINK_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_parse("FIELDLINK_PORT") {
            config.server.port = port;
        }
        if let Ok(path) = std::env::var("FIELDLINK_PATH") {
            config.server.path = path;
        }
        if let Some(tls) = env_parse("FIELDLINK_TLS") {
            config.server.tls = tls;
        }

        // Device identity
        if let Ok(api_key) = std::env::var("FIELDLINK_API_KEY") {
            config.device.api_key = Secret::new(api_key);
        }
        if let Ok(secret) = std::env::var("FIELDLINK_SECRET") {
            config.device.secret = Secret::new(secret);
        }

        // Session timers
        if let Some(secs) = env_parse("FIELDLINK_HEARTBEAT_INTERVAL_SECS") {
            config.session.heartbeat_interval_secs = secs;
        }
        if let Some(secs) = env_parse("FIELDLINK_CONNECTION_TIMEOUT_SECS") {
            config.session.connection_timeout_secs = secs;
        }

        config
    }

    /// Merge with another config (other takes precedence where it differs
    /// from the defaults)
    pub fn merge(self, other: Self) -> Self {
        let server = ServerConfig::default();
        let session = SessionTimers::default();

        Self {
            server: ServerConfig {
                host: pick(self.server.host, other.server.host, server.host),
                port: pick(self.server.port, other.server.port, server.port),
                path: pick(self.server.path, other.server.path, server.path),
                tls: pick(self.server.tls, other.server.tls, server.tls),
            },
            device: DeviceConfig {
                api_key: pick(self.device.api_key, other.device.api_key, Secret::default()),
                secret: pick(self.device.secret, other.device.secret, Secret::default()),
            },
            session: SessionTimers {
                heartbeat_interval_secs: pick(
                    self.session.heartbeat_interval_secs,
                    other.session.heartbeat_interval_secs,
                    session.heartbeat_interval_secs,
                ),
                connection_timeout_secs: pick(
                    self.session.connection_timeout_secs,
                    other.session.connection_timeout_secs,
                    session.connection_timeout_secs,
                ),
            },
            transport: if other.transport != TransportConfig::default() {
                other.transport
            } else {
                self.transport
            },
            agent: if other.agent != AgentConfig::default() {
                other.agent
            } else {
                self.agent
            },
        }
    }

    /// Device credentials
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.device.api_key.clone(), self.device.secret.clone())
    }

    /// Coordinator endpoint
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.server.host.clone(),
            port: self.server.port,
            path: self.server.path.clone(),
            tls: self.server.tls,
        }
    }

    /// Session timing
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            heartbeat_interval: Duration::from_secs(self.session.heartbeat_interval_secs),
            connection_timeout: Duration::from_secs(self.session.connection_timeout_secs),
        }
    }

    /// WebSocket transport settings
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            reconnect_interval: Duration::from_millis(self.transport.reconnect_interval_ms),
            connect_timeout: Duration::from_millis(self.transport.connect_timeout_ms),
            ping_interval: Duration::from_millis(self.transport.ping_interval_ms),
            pong_timeout: Duration::from_millis(self.transport.pong_timeout_ms),
            max_missed_pongs: self.transport.max_missed_pongs,
        }
    }

    /// Check the config is usable for a live session
    pub fn validate(&self) -> Result<()> {
        if self.credentials().is_incomplete() {
            return Err(LinkError::Config(
                "device.api_key and device.secret must both be set".to_string(),
            ));
        }
        if self.server.host.is_empty() {
            return Err(LinkError::Config("server.host must be set".to_string()));
        }
        if self.agent.tick_interval_ms == 0 {
            return Err(LinkError::Config(
                "agent.tick_interval_ms must be non-zero".to_string(),
            ));
        }
        self.session_config().validate()?;
        self.websocket_config().validate()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn pick<T: PartialEq>(base: T, other: T, default: T) -> T {
    if other != default {
        other
    } else {
        base
    }
}

/// Coordinator address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name or IP address
    pub host: String,

    /// TCP port
    pub port: u16,

    /// WebSocket path
    pub path: String,

    /// Use TLS (wss)
    pub tls: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let endpoint = Endpoint::default();
        Self {
            host: endpoint.host,
            port: endpoint.port,
            path: endpoint.path,
            tls: endpoint.tls,
        }
    }
}

/// Device identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Api key presented at authentication
    #[serde(skip_serializing)]
    pub api_key: Secret,

    /// Shared secret presented at authentication
    #[serde(skip_serializing)]
    pub secret: Secret,
}

/// Session timer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTimers {
    /// Heartbeat cadence while authenticated
    pub heartbeat_interval_secs: u64,

    /// Inbound silence before the link is reset
    pub connection_timeout_secs: u64,
}

impl Default for SessionTimers {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
        }
    }
}

/// WebSocket transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Wait between reconnect attempts
    pub reconnect_interval_ms: u64,

    /// Bound on TCP connect and handshake
    pub connect_timeout_ms: u64,

    /// WebSocket ping cadence (0 disables)
    pub ping_interval_ms: u64,

    /// Pong wait per ping
    pub pong_timeout_ms: u64,

    /// Missed pongs before the link is dropped
    pub max_missed_pongs: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: 5000,
            connect_timeout_ms: 5000,
            ping_interval_ms: 15000,
            pong_timeout_ms: 3000,
            max_missed_pongs: 2,
        }
    }
}

/// Agent loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// How often the client is ticked
    pub tick_interval_ms: u64,

    /// Periodic telemetry cadence (0 disables)
    pub telemetry_interval_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            telemetry_interval_secs: 30,
        }
    }
}
