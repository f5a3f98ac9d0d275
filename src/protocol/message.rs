//! Protocol messages exchanged with the coordinator.
//!
//! Every frame is one JSON object whose `type` field selects the variant.
//! Custom reports carry a caller-chosen `type`, so they are encoded by the
//! codec directly rather than through the derived tag.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Credentials;
use crate::device::Reading;

/// Wire `type` values defined by the protocol.
pub const RESERVED_KINDS: [&str; 7] = [
    "auth",
    "auth_success",
    "auth_error",
    "command",
    "ack",
    "heartbeat",
    "sensor_data",
];

/// Protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Authentication request (device → coordinator)
    Auth {
        /// Api key and secret
        #[serde(flatten)]
        credentials: Credentials,
    },
    /// Handshake accepted
    AuthSuccess,
    /// Handshake rejected
    AuthError,
    /// Remote command
    Command {
        /// Correlation token echoed in the acknowledgement
        #[serde(deserialize_with = "string_or_number")]
        id: String,
        /// Command text
        payload: String,
    },
    /// Command acknowledgement
    Ack {
        /// Id of the acknowledged command
        #[serde(rename = "commandId")]
        command_id: String,
        /// Outcome
        status: AckStatus,
        /// Milliseconds since session start
        timestamp: u64,
    },
    /// Application-level keepalive
    Heartbeat {
        /// Milliseconds since session start
        timestamp: u64,
    },
    /// Telemetry report
    SensorData {
        /// Sampled values
        payload: SensorPayload,
        /// Milliseconds since session start
        timestamp: u64,
    },
    /// Report with a caller-supplied kind
    #[serde(skip)]
    Custom {
        /// Wire `type`
        kind: String,
        /// Caller-supplied object
        payload: Map<String, Value>,
        /// Milliseconds since session start
        timestamp: u64,
    },
}

/// Outcome reported in an acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    /// Command was carried out
    Executed,
    /// Command was not recognised or could not be carried out
    Failed,
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executed => write!(f, "executed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Telemetry payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPayload {
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity, percent
    pub humidity: f32,
    /// Milliseconds since session start
    pub uptime: u64,
    /// Free memory in bytes
    #[serde(rename = "free_heap")]
    pub free_memory: u64,
    /// Link signal strength in dBm
    #[serde(rename = "wifi_rssi")]
    pub link_signal_strength: i32,
}

impl Message {
    /// Create an authentication request
    pub fn auth(credentials: &Credentials) -> Self {
        Self::Auth {
            credentials: credentials.clone(),
        }
    }

    /// Create an acknowledgement
    pub fn ack(command_id: &str, status: AckStatus, timestamp: u64) -> Self {
        Self::Ack {
            command_id: command_id.to_string(),
            status,
            timestamp,
        }
    }

    /// Create a heartbeat
    pub fn heartbeat(timestamp: u64) -> Self {
        Self::Heartbeat { timestamp }
    }

    /// Create a telemetry report
    pub fn sensor_data(
        reading: Reading,
        free_memory: u64,
        link_signal_strength: i32,
        timestamp: u64,
    ) -> Self {
        Self::SensorData {
            payload: SensorPayload {
                temperature: reading.temperature,
                humidity: reading.humidity,
                uptime: timestamp,
                free_memory,
                link_signal_strength,
            },
            timestamp,
        }
    }

    /// Create a custom report
    pub fn custom(kind: &str, payload: Map<String, Value>, timestamp: u64) -> Self {
        Self::Custom {
            kind: kind.to_string(),
            payload,
            timestamp,
        }
    }

    /// Wire `type` of this message
    pub fn kind(&self) -> &str {
        match self {
            Self::Auth { .. } => "auth",
            Self::AuthSuccess => "auth_success",
            Self::AuthError => "auth_error",
            Self::Command { .. } => "command",
            Self::Ack { .. } => "ack",
            Self::Heartbeat { .. } => "heartbeat",
            Self::SensorData { .. } => "sensor_data",
            Self::Custom { kind, .. } => kind,
        }
    }

    /// Check whether `kind` is one of the protocol's own message types
    pub fn is_reserved_kind(kind: &str) -> bool {
        RESERVED_KINDS.contains(&kind)
    }
}

/// Coordinators send command ids either as strings or integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "command id must be a string or number, got {other}"
        ))),
    }
}
