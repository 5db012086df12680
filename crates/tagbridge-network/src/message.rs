//! JSON wire messages exchanged with browser peers.
//!
//! Every frame is a JSON object tagged by a `type` field:
//!
//! | Direction | `type` | Fields |
//! |-----------|--------|--------|
//! | → peer | `connected` | `message`, `readers` |
//! | → peer | `nfc_detected` | `serialNumber`, `timestamp`, `reader` |
//! | → peer | `nfc_removed` | `timestamp` |
//! | → peer | `pong` | |
//! | → peer | `readers_list` | `readers` |
//! | → peer | `write_result` | `success`, `message`, `request_id`, `bytes_written`, `pages_written` |
//! | ← peer | `ping` | |
//! | ← peer | `get_readers` | |
//! | ← peer | `write_tag` | `data`, `request_id` |

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tagbridge_core::{PresenceEvent, PresenceKind, ReaderDescriptor, WriteResult};

/// Message sent to peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent once after the handshake.
    Connected {
        message: String,
        readers: Vec<ReaderDescriptor>,
    },

    /// A tag arrived on a reader.
    NfcDetected {
        #[serde(rename = "serialNumber")]
        serial_number: String,
        timestamp: String,
        reader: String,
    },

    /// The tag left the reader.
    NfcRemoved { timestamp: String },

    Pong,

    ReadersList { readers: Vec<ReaderDescriptor> },

    /// Outcome of a `write_tag` request.
    WriteResult {
        success: bool,
        message: String,
        request_id: Option<Value>,
        bytes_written: usize,
        pages_written: usize,
    },
}

impl ServerMessage {
    /// Wire form of a presence transition.
    ///
    /// Returns `None` for a detection that carries no serial number.
    pub fn from_presence(event: &PresenceEvent) -> Option<Self> {
        let timestamp = iso_timestamp(&event.timestamp);
        match event.kind {
            PresenceKind::Detected => Some(Self::NfcDetected {
                serial_number: event.serial_number.as_ref()?.to_string(),
                timestamp,
                reader: event.reader.clone().unwrap_or_default(),
            }),
            PresenceKind::Removed => Some(Self::NfcRemoved { timestamp }),
        }
    }

    /// Reply to a `write_tag`, echoing the peer's `request_id` as sent.
    pub fn write_result(result: WriteResult, request_id: Option<Value>) -> Self {
        Self::WriteResult {
            success: result.success,
            message: result.message,
            request_id,
            bytes_written: result.bytes_written,
            pages_written: result.pages_written,
        }
    }

    /// Value of the `type` tag, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::NfcDetected { .. } => "nfc_detected",
            Self::NfcRemoved { .. } => "nfc_removed",
            Self::Pong => "pong",
            Self::ReadersList { .. } => "readers_list",
            Self::WriteResult { .. } => "write_result",
        }
    }
}

/// Message received from peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,

    GetReaders,

    /// Write `data` (any JSON value) to the tag on the reader.
    ///
    /// `request_id` may be any JSON value; it is returned untouched.
    WriteTag {
        #[serde(default)]
        data: Value,
        #[serde(default)]
        request_id: Option<Value>,
    },
}

/// Text form of a peer's `request_id` for logs and [`WriteResult`].
pub fn correlation_label(request_id: &Value) -> String {
    match request_id {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Local time as ISO-8601 with microseconds and no offset.
pub fn iso_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;
    use tagbridge_core::{TagCapability, TagSerial};

    #[test]
    fn test_detected_wire_shape() {
        let serial = TagSerial::from_bytes(&[0x04, 0xA1, 0xB2]).unwrap();
        let event = PresenceEvent::detected(serial, "Reader 0");
        let message = ServerMessage::from_presence(&event).unwrap();

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "nfc_detected");
        assert_eq!(value["serialNumber"], "04:A1:B2");
        assert_eq!(value["reader"], "Reader 0");
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_removed_wire_shape() {
        let message = ServerMessage::from_presence(&PresenceEvent::removed()).unwrap();
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "nfc_removed");
        assert!(value.get("serialNumber").is_none());
    }

    #[test]
    fn test_pong_is_type_only() {
        let json = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_write_result_fields() {
        let result = WriteResult::success(
            &TagCapability::ntag(0x0F, "4.2"),
            11,
            6,
            Some("r1".to_string()),
        );
        let message = ServerMessage::write_result(result, Some(json!("r1")));
        let value = serde_json::to_value(message).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "write_result",
                "success": true,
                "message": "Tag NTAG written (11 bytes)",
                "request_id": "r1",
                "bytes_written": 11,
                "pages_written": 6,
            })
        );
    }

    #[test]
    fn test_connected_lists_readers() {
        let message = ServerMessage::Connected {
            message: "hi".to_string(),
            readers: vec![ReaderDescriptor::new("Reader 0", 0)],
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["readers"], json!([{"name": "Reader 0", "index": 0}]));
    }

    #[rstest]
    #[case(r#"{"type":"ping"}"#, ClientMessage::Ping)]
    #[case(r#"{"type":"get_readers"}"#, ClientMessage::GetReaders)]
    #[case(
        r#"{"type":"write_tag","data":{"id":"x1"},"request_id":"r1"}"#,
        ClientMessage::WriteTag { data: json!({"id": "x1"}), request_id: Some(json!("r1")) }
    )]
    #[case(
        r#"{"type":"write_tag","data":"x","request_id":7}"#,
        ClientMessage::WriteTag { data: json!("x"), request_id: Some(json!(7)) }
    )]
    #[case(
        r#"{"type":"write_tag","data":1,"request_id":{"seq":[1,2]}}"#,
        ClientMessage::WriteTag { data: json!(1), request_id: Some(json!({"seq": [1, 2]})) }
    )]
    #[case(
        r#"{"type":"write_tag"}"#,
        ClientMessage::WriteTag { data: Value::Null, request_id: None }
    )]
    fn test_parse_client_message(#[case] raw: &str, #[case] expected: ClientMessage) {
        assert_eq!(serde_json::from_str::<ClientMessage>(raw).unwrap(), expected);
    }

    #[rstest]
    #[case(r#"{"type":"unknown_cmd"}"#)]
    #[case(r#"{"no_type":true}"#)]
    #[case("not json")]
    fn test_reject_unknown(#[case] raw: &str) {
        assert!(serde_json::from_str::<ClientMessage>(raw).is_err());
    }

    #[test]
    fn test_numeric_request_id_echoed_as_number() {
        let result = WriteResult::failure("no tag", None, Some("42".to_string()));
        let message = ServerMessage::write_result(result, Some(json!(42)));
        let value = serde_json::to_value(message).unwrap();
        assert_eq!(value["request_id"], json!(42));
        assert_eq!(value["success"], false);
    }

    #[rstest]
    #[case(json!("r1"), "r1")]
    #[case(json!(42), "42")]
    #[case(json!({"seq": 1}), r#"{"seq":1}"#)]
    fn test_correlation_label(#[case] id: Value, #[case] expected: &str) {
        assert_eq!(correlation_label(&id), expected);
    }

    #[test]
    fn test_iso_timestamp() {
        let ts = Local.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(iso_timestamp(&ts), "2025-03-09T14:05:07.000000");
    }

    #[test]
    fn test_kind_matches_tag() {
        let message = ServerMessage::ReadersList { readers: vec![] };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], message.kind());
    }
}
