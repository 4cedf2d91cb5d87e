//! Feed message parser
//!
//! Decodes the JSON envelope `{"type": ..., "data": ...}` and routes by type.

use serde::Deserialize;
use serde_json::Value;

/// Message type carrying a vehicle position/status report
pub const VEHICLE_UPDATE: &str = "vehicle_update";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Result of decoding one inbound text message
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// A `vehicle_update`; the payload is `null` when `data` was absent
    VehicleUpdate(Value),
    /// Well-formed envelope of some other type
    Other(String),
    /// Not JSON, or not shaped like an envelope
    Malformed(String),
}

/// Decode a raw text frame
pub fn parse_message(text: &str) -> FeedMessage {
    match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) if envelope.kind == VEHICLE_UPDATE => {
            FeedMessage::VehicleUpdate(envelope.data)
        }
        Ok(envelope) => FeedMessage::Other(envelope.kind),
        Err(e) => FeedMessage::Malformed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_vehicle_update() {
        let text = r#"{"type":"vehicle_update","data":{"id":"V1","lat":10,"lng":20}}"#;
        assert_eq!(
            parse_message(text),
            FeedMessage::VehicleUpdate(json!({"id": "V1", "lat": 10, "lng": 20}))
        );
    }

    #[test]
    fn test_other_type_is_not_forwarded() {
        assert_eq!(
            parse_message(r#"{"type":"ping"}"#),
            FeedMessage::Other("ping".to_string())
        );
    }

    #[test]
    fn test_missing_data_is_null_payload() {
        assert_eq!(
            parse_message(r#"{"type":"vehicle_update"}"#),
            FeedMessage::VehicleUpdate(Value::Null)
        );
    }

    #[test]
    fn test_malformed_inputs() {
        for text in ["not json", "[1,2,3]", r#"{"data":{}}"#, r#"{"type":42}"#, ""] {
            assert!(
                matches!(parse_message(text), FeedMessage::Malformed(_)),
                "{text:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_type_is_case_sensitive() {
        assert_eq!(
            parse_message(r#"{"type":"Vehicle_Update","data":{}}"#),
            FeedMessage::Other("Vehicle_Update".to_string())
        );
    }
}
