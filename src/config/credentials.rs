//! Device credentials with redacted Debug output.
//!
//! The api key and shared secret travel to the coordinator exactly once per
//! link, inside the `auth` frame. Everywhere else (logs, debug output, config
//! dumps) they print as `[REDACTED]`, and their memory is wiped on drop.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// A credential string that never exposes its value in logs or debug output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret {
    inner: String,
}

impl Secret {
    /// Wrap a credential value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Get the actual value for transmission.
    ///
    /// Only call this when building the authentication frame.
    #[inline]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Length of the value (safe to log).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the value is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED], len={})", self.inner.len())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// Serializes the raw value for the auth frame. `DeviceConfig` marks its
// secret fields `skip_serializing`, so config dumps never include them.
impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.inner)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Identity key and shared secret presented during the authentication
/// handshake. Immutable once built.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "apiKey")]
    api_key: Secret,
    secret: Secret,
}

impl Credentials {
    /// Create credentials from an api key and shared secret.
    pub fn new(api_key: impl Into<Secret>, secret: impl Into<Secret>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
        }
    }

    /// Api key used as the device identity.
    pub fn api_key(&self) -> &Secret {
        &self.api_key
    }

    /// Shared secret.
    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// True if either half is missing.
    pub fn is_incomplete(&self) -> bool {
        self.api_key.is_empty() || self.secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret", &self.secret)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_shows_values() {
        let creds = Credentials::new("device-key-123", "hunter2");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("device-key-123"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
        assert_eq!(format!("{}", creds.secret()), "[REDACTED]");
    }

    #[test]
    fn test_serializes_wire_field_names() {
        let creds = Credentials::new("k", "s");
        let json = serde_json::to_value(&creds).unwrap();
        assert_eq!(json["apiKey"], "k");
        assert_eq!(json["secret"], "s");
    }

    #[test]
    fn test_incomplete() {
        assert!(Credentials::new("", "s").is_incomplete());
        assert!(Credentials::new("k", "").is_incomplete());
        assert!(!Credentials::new("k", "s").is_incomplete());
    }
}
