//! Wire envelope
//!
//! One JSON object per frame:
//!
//! ```text
//! { "message_type": "<category>",
//!   "data": { "emitter": "<identity>",
//!             "receiver": "<identity|ALL|SERVER|\"\">",
//!             "value": <string|array|object>,
//!             "ack": true } }                      // optional, SEND.* only
//! ```
//!
//! Only the `value`/`receiver` key scheme is accepted.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::category::Category;
use crate::error::MalformedMessage;

/// Reserved receiver addressing every regular session
pub const ALL: &str = "ALL";

/// Reserved identity of the relay itself
pub const SERVER: &str = "SERVER";

/// Decoded envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_type: String,
    pub data: EnvelopeData,
}

/// Envelope `data` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeData {
    pub emitter: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub value: Value,
    /// Sender asks for a `SYSTEM "VU"` once the message is queued
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ack: bool,
}

// Lenient shape used to report exactly which required field is absent.
#[derive(Deserialize)]
struct RawEnvelope {
    message_type: Option<String>,
    data: Option<RawData>,
}

#[derive(Deserialize)]
struct RawData {
    emitter: Option<String>,
    receiver: Option<String>,
    value: Option<Value>,
    ack: Option<bool>,
}

impl Envelope {
    /// Create an envelope for a category
    pub fn new(
        category: Category,
        emitter: impl Into<String>,
        receiver: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            message_type: category.to_string(),
            data: EnvelopeData {
                emitter: emitter.into(),
                receiver: receiver.into(),
                value: value.into(),
                ack: false,
            },
        }
    }

    /// Set the acknowledgment request flag
    pub fn with_ack(mut self, ack: bool) -> Self {
        self.data.ack = ack;
        self
    }

    /// Decode a text frame
    ///
    /// Fails when the frame is not JSON, or when `message_type`, `data` or
    /// `data.emitter` is absent. A null or missing `receiver` decodes as `""`.
    pub fn decode(text: &str) -> Result<Self, MalformedMessage> {
        let raw: RawEnvelope = serde_json::from_str(text)
            .map_err(|e| MalformedMessage::InvalidJson(e.to_string()))?;

        let message_type = raw
            .message_type
            .filter(|t| !t.is_empty())
            .ok_or(MalformedMessage::MissingField("message_type"))?;
        let data = raw.data.ok_or(MalformedMessage::MissingField("data"))?;
        let emitter = data
            .emitter
            .filter(|e| !e.is_empty())
            .ok_or(MalformedMessage::MissingField("data.emitter"))?;

        Ok(Self {
            message_type,
            data: EnvelopeData {
                emitter,
                receiver: data.receiver.unwrap_or_default(),
                value: data.value.unwrap_or(Value::Null),
                ack: data.ack.unwrap_or(false),
            },
        })
    }

    /// Parsed category of this envelope
    pub fn category(&self) -> Result<Category, MalformedMessage> {
        self.message_type.parse()
    }

    /// Encode as a text frame
    pub fn to_frame(&self) -> Bytes {
        match serde_json::to_vec(self) {
            Ok(buf) => Bytes::from(buf),
            Err(e) => {
                tracing::error!(error = %e, message_type = %self.message_type, "Failed to encode envelope");
                Bytes::new()
            }
        }
    }

    /// `value` as a string, if it is one
    pub fn value_str(&self) -> Option<&str> {
        self.data.value.as_str()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::ContentKind;

    #[test]
    fn test_decode_full() {
        let text = r#"{"message_type":"SEND.TEXT","data":{"emitter":"Alice","receiver":"Bob","value":"hi","ack":true}}"#;
        let env = Envelope::decode(text).unwrap();

        assert_eq!(env.category().unwrap(), Category::Send(ContentKind::Text));
        assert_eq!(env.data.emitter, "Alice");
        assert_eq!(env.data.receiver, "Bob");
        assert_eq!(env.value_str(), Some("hi"));
        assert!(env.data.ack);
    }

    #[test]
    fn test_optional_fields_default() {
        let text = r#"{"message_type":"DECLARATION","data":{"emitter":"Alice","receiver":null}}"#;
        let env = Envelope::decode(text).unwrap();

        assert_eq!(env.data.receiver, "");
        assert_eq!(env.data.value, Value::Null);
        assert!(!env.data.ack);
    }

    #[test]
    fn test_missing_required_fields() {
        let cases = [
            (r#"{"data":{"emitter":"A"}}"#, "message_type"),
            (r#"{"message_type":"","data":{"emitter":"A"}}"#, "message_type"),
            (r#"{"message_type":"SYSTEM"}"#, "data"),
            (r#"{"message_type":"SYSTEM","data":{"value":"ping"}}"#, "data.emitter"),
            (r#"{"message_type":"SYSTEM","data":{"emitter":""}}"#, "data.emitter"),
        ];

        for (text, field) in cases {
            assert_eq!(
                Envelope::decode(text),
                Err(MalformedMessage::MissingField(field)),
                "{text}"
            );
        }
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            Envelope::decode("Bienvenue !"),
            Err(MalformedMessage::InvalidJson(_))
        ));
        assert!(matches!(
            Envelope::decode("[1,2,3]"),
            Err(MalformedMessage::InvalidJson(_))
        ));
    }

    #[test]
    fn test_old_key_scheme_is_not_accepted_as_value() {
        // `content`/`dest` keys are ignored; the frame decodes with no value
        let text = r#"{"message_type":"SEND.TEXT","data":{"emitter":"A","dest":"B","content":"x"}}"#;
        let env = Envelope::decode(text).unwrap();
        assert_eq!(env.data.receiver, "");
        assert_eq!(env.data.value, Value::Null);
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let original = Envelope::new(
            Category::ReceiveClientList,
            SERVER,
            ALL,
            json!(["Alice", "Bob"]),
        );
        let frame = original.to_frame();
        let decoded = Envelope::decode(std::str::from_utf8(&frame).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_ack_omitted_when_false() {
        let frame = Envelope::new(Category::System, SERVER, "Alice", "ping").to_frame();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(!text.contains("ack"));

        let frame = Envelope::new(Category::Send(ContentKind::Text), "A", "B", "x")
            .with_ack(true)
            .to_frame();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.contains(r#""ack":true"#));
    }
}
