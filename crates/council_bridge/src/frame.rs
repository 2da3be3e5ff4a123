//! Wire frames exchanged with the UI host.
//!
//! # Invariants
//! - A response echoes the request `id`; malformed requests answer with the
//!   `id` when it can be recovered, otherwise `null`.
//! - Envelope fields are flattened into the response frame.

use council_core::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{"id": 7, "command": "has-api-key", "payload": {"service": "openai"}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    #[serde(default)]
    pub id: Option<u64>,
    pub command: String,
    #[serde(default)]
    pub payload: Value,
}

/// `{"id": 7, "success": true, "data": {"hasKey": false}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub id: Option<u64>,
    #[serde(flatten)]
    pub envelope: Envelope<Value>,
}

impl BridgeResponse {
    pub fn new(id: Option<u64>, envelope: Envelope<Value>) -> Self {
        Self { id, envelope }
    }
}

/// Strips the line terminator from one raw frame.
///
/// A frame that is not UTF-8 yields the error frame to send back instead.
pub fn decode_line(raw: &[u8]) -> Result<&str, BridgeResponse> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    std::str::from_utf8(raw).map_err(|err| {
        BridgeResponse::new(None, Envelope::err(format!("malformed frame: {err}")))
    })
}

/// Parses one request line.
///
/// On failure returns the error frame to send back instead.
pub fn parse_request(line: &str) -> Result<BridgeRequest, BridgeResponse> {
    let value: Value = serde_json::from_str(line).map_err(|err| {
        BridgeResponse::new(None, Envelope::err(format!("malformed frame: {err}")))
    })?;
    let id = value.get("id").and_then(Value::as_u64);
    serde_json::from_value(value).map_err(|err| {
        BridgeResponse::new(id, Envelope::err(format!("malformed frame: {err}")))
    })
}

#[cfg(test)]
mod tests {
    use super::{decode_line, parse_request, BridgeResponse};
    use council_core::Envelope;
    use serde_json::{json, Value};

    #[test]
    fn request_payload_defaults_to_null() {
        let request = parse_request(r#"{"id":3,"command":"get-app-info"}"#).expect("parse");
        assert_eq!(request.id, Some(3));
        assert_eq!(request.command, "get-app-info");
        assert_eq!(request.payload, Value::Null);
    }

    #[test]
    fn malformed_frames_keep_recoverable_id() {
        let missing_command = parse_request(r#"{"id":9,"payload":{}}"#).expect_err("no command");
        assert_eq!(missing_command.id, Some(9));
        assert!(!missing_command.envelope.is_success());

        let garbage = parse_request("{not json").expect_err("garbage");
        assert_eq!(garbage.id, None);
        assert!(garbage
            .envelope
            .error()
            .is_some_and(|error| error.starts_with("malformed frame:")));
    }

    #[test]
    fn decode_line_strips_terminator_and_rejects_invalid_utf8() {
        assert_eq!(decode_line(b"{\"id\":1}\r\n").expect("utf-8"), "{\"id\":1}");
        assert_eq!(decode_line(b"tail").expect("utf-8"), "tail");

        let invalid = decode_line(b"\xff\xfe\n").expect_err("not utf-8");
        assert_eq!(invalid.id, None);
        assert!(invalid
            .envelope
            .error()
            .is_some_and(|error| error.starts_with("malformed frame:")));
    }

    #[test]
    fn response_flattens_envelope() {
        let response = BridgeResponse::new(Some(4), Envelope::ok(json!({"hasKey": true})));
        assert_eq!(
            serde_json::to_value(&response).expect("serialize"),
            json!({"id": 4, "success": true, "data": {"hasKey": true}})
        );

        let failure = BridgeResponse::new(None, Envelope::err("boom"));
        assert_eq!(
            serde_json::to_value(&failure).expect("serialize"),
            json!({"id": null, "success": false, "error": "boom"})
        );
    }
}
