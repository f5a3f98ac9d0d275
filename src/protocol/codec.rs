//! Message codec.
//!
//! Converts [`Message`] values to and from the text frames carried by the
//! transport.

use serde_json::{json, Value};

use super::message::Message;
use crate::error::{LinkError, Result};

/// Serializes protocol messages to wire text and back.
pub trait Codec {
    /// Encode a message into one text frame.
    fn encode(&self, message: &Message) -> Result<String>;

    /// Decode one inbound frame.
    fn decode(&self, frame: &[u8]) -> Result<Message>;
}

/// JSON codec: one JSON object per frame, kind in the `type` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, message: &Message) -> Result<String> {
        match message {
            Message::Custom {
                kind,
                payload,
                timestamp,
            } => {
                if kind.is_empty() || Message::is_reserved_kind(kind) {
                    return Err(LinkError::InvalidMessage(format!(
                        "custom report kind {kind:?} is empty or reserved"
                    )));
                }
                let frame = json!({
                    "type": kind,
                    "payload": payload,
                    "timestamp": timestamp,
                });
                Ok(serde_json::to_string(&frame)?)
            },
            other => Ok(serde_json::to_string(other)?),
        }
    }

    fn decode(&self, frame: &[u8]) -> Result<Message> {
        let value: Value = serde_json::from_slice(frame)
            .map_err(|e| LinkError::InvalidMessage(format!("not a JSON frame: {e}")))?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| LinkError::InvalidMessage("frame has no string `type`".to_string()))?;

        if !Message::is_reserved_kind(kind) {
            return Err(LinkError::UnknownKind(kind.to_string()));
        }

        serde_json::from_value(value).map_err(|e| LinkError::InvalidMessage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::protocol::AckStatus;

    #[test]
    fn test_decode_command() {
        let msg = JsonCodec
            .decode(br#"{"type":"command","id":"9","payload":"LED_OFF"}"#)
            .unwrap();
        assert_eq!(
            msg,
            Message::Command {
                id: "9".to_string(),
                payload: "LED_OFF".to_string()
            }
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            JsonCodec.decode(b"not json"),
            Err(LinkError::InvalidMessage(_))
        ));
        assert!(matches!(
            JsonCodec.decode(br#"{"id":"1"}"#),
            Err(LinkError::InvalidMessage(_))
        ));
        assert!(matches!(
            JsonCodec.decode(&[0xff, 0xfe, 0x00]),
            Err(LinkError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_decode_unknown_kind() {
        match JsonCodec.decode(br#"{"type":"firmware_update","url":"x"}"#) {
            Err(LinkError::UnknownKind(kind)) => assert_eq!(kind, "firmware_update"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_command_missing_payload() {
        assert!(matches!(
            JsonCodec.decode(br#"{"type":"command","id":"1"}"#),
            Err(LinkError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_encode_ack() {
        let text = JsonCodec
            .encode(&Message::ack("3", AckStatus::Failed, 10))
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"type": "ack", "commandId": "3", "status": "failed", "timestamp": 10})
        );
    }

    #[test]
    fn test_encode_custom() {
        let mut payload = Map::new();
        payload.insert("open".to_string(), Value::Bool(true));
        let text = JsonCodec
            .encode(&Message::custom("door_state", payload, 77))
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"type": "door_state", "payload": {"open": true}, "timestamp": 77})
        );
    }

    #[test]
    fn test_encode_custom_rejects_reserved_kind() {
        for kind in ["", "ack", "auth"] {
            let result = JsonCodec.encode(&Message::custom(kind, Map::new(), 0));
            assert!(matches!(result, Err(LinkError::InvalidMessage(_))));
        }
    }
}
