//! Message classifier
//!
//! Turns a decoded [`Envelope`] into a typed [`Message`]. Validation happens
//! here so that routing only ever sees well-formed messages; anything
//! that does not fit fails closed with [`MalformedMessage`].

use serde_json::Value;

use super::category::{Category, ContentKind};
use super::envelope::{Envelope, ALL, SERVER};
use super::media::MediaPayload;
use crate::error::MalformedMessage;

/// Liveness/acknowledgment value carried by `SYSTEM`
pub const PING: &str = "ping";
pub const PONG: &str = "pong";
pub const ACK: &str = "VU";

/// Addressee of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// Every regular session (`"ALL"`)
    All,
    /// The relay itself (`"SERVER"`)
    Server,
    /// A named participant
    Identity(String),
    /// Empty receiver
    Unset,
}

impl Receiver {
    pub fn parse(receiver: &str) -> Self {
        match receiver {
            "" => Receiver::Unset,
            ALL => Receiver::All,
            SERVER => Receiver::Server,
            identity => Receiver::Identity(identity.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Receiver::All => ALL,
            Receiver::Server => SERVER,
            Receiver::Identity(identity) => identity,
            Receiver::Unset => "",
        }
    }

    /// Relay-addressed: `SERVER` or empty
    pub fn is_relay(&self) -> bool {
        matches!(self, Receiver::Server | Receiver::Unset)
    }
}

/// Chat content payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Media(MediaPayload),
}

impl Payload {
    /// Wire form, unchanged from what the sender sent
    pub fn as_str(&self) -> &str {
        match self {
            Payload::Text(text) => text,
            Payload::Media(media) => media.as_str(),
        }
    }
}

/// `SYSTEM` message value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemSignal {
    Ping,
    Pong,
    /// Delivery confirmation (`"VU"`)
    Ack,
    Other(String),
}

impl SystemSignal {
    pub fn parse(value: &str) -> Self {
        match value {
            PING => SystemSignal::Ping,
            PONG => SystemSignal::Pong,
            ACK => SystemSignal::Ack,
            other => SystemSignal::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SystemSignal::Ping => PING,
            SystemSignal::Pong => PONG,
            SystemSignal::Ack => ACK,
            SystemSignal::Other(value) => value,
        }
    }
}

/// A classified, validated message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Bind the connection to `identity`
    Declaration { identity: String },

    /// `SEND.{TEXT,IMAGE,AUDIO,VIDEO}`
    Content {
        kind: ContentKind,
        emitter: String,
        receiver: Receiver,
        payload: Payload,
        request_ack: bool,
    },

    /// `SEND.CLIENT_LIST`
    DirectoryRequest { emitter: String },

    /// `SYSTEM`
    System {
        emitter: String,
        receiver: Receiver,
        signal: SystemSignal,
    },

    /// `RECEIVE.*` / `ADMIN.*` arriving from a client
    ServerOnly { category: Category, emitter: String },
}

impl Message {
    /// Decode and classify a text frame
    pub fn classify(text: &str) -> Result<Self, MalformedMessage> {
        let envelope = Envelope::decode(text)?;
        Self::from_envelope(envelope)
    }

    /// Classify an already decoded envelope
    pub fn from_envelope(envelope: Envelope) -> Result<Self, MalformedMessage> {
        let category = envelope.category()?;
        let data = envelope.data;

        let message = match category {
            Category::Declaration => Message::Declaration {
                identity: data.emitter,
            },
            Category::SendClientList => Message::DirectoryRequest {
                emitter: data.emitter,
            },
            Category::Send(kind) => {
                let receiver = Receiver::parse(&data.receiver);
                if receiver == Receiver::Unset {
                    return Err(MalformedMessage::MissingField("data.receiver"));
                }
                let value = expect_string(category, data.value)?;
                let payload = if kind.is_media() {
                    Payload::Media(MediaPayload::parse_for(kind, &value)?)
                } else {
                    Payload::Text(value)
                };

                Message::Content {
                    kind,
                    emitter: data.emitter,
                    receiver,
                    payload,
                    request_ack: data.ack,
                }
            }
            Category::System => {
                let value = expect_string(category, data.value)?;
                Message::System {
                    emitter: data.emitter,
                    receiver: Receiver::parse(&data.receiver),
                    signal: SystemSignal::parse(&value),
                }
            }
            Category::Receive(_) | Category::ReceiveClientList | Category::Admin(_) => {
                Message::ServerOnly {
                    category,
                    emitter: data.emitter,
                }
            }
        };

        Ok(message)
    }

    pub fn category(&self) -> Category {
        match self {
            Message::Declaration { .. } => Category::Declaration,
            Message::Content { kind, .. } => Category::Send(*kind),
            Message::DirectoryRequest { .. } => Category::SendClientList,
            Message::System { .. } => Category::System,
            Message::ServerOnly { category, .. } => *category,
        }
    }

    pub fn emitter(&self) -> &str {
        match self {
            Message::Declaration { identity } => identity,
            Message::Content { emitter, .. }
            | Message::DirectoryRequest { emitter }
            | Message::System { emitter, .. }
            | Message::ServerOnly { emitter, .. } => emitter,
        }
    }

    /// Receiver as it appeared on the wire
    pub fn receiver(&self) -> &str {
        match self {
            Message::Content { receiver, .. } | Message::System { receiver, .. } => {
                receiver.as_str()
            }
            Message::DirectoryRequest { .. } => SERVER,
            Message::Declaration { .. } | Message::ServerOnly { .. } => "",
        }
    }

    /// Re-encode as an envelope
    ///
    /// `ServerOnly` messages carry no value and re-encode with null.
    pub fn to_envelope(&self) -> Envelope {
        match self {
            Message::Declaration { identity } => {
                Envelope::new(Category::Declaration, identity.as_str(), "", Value::Null)
            }
            Message::Content {
                kind,
                emitter,
                receiver,
                payload,
                request_ack,
            } => Envelope::new(
                Category::Send(*kind),
                emitter.as_str(),
                receiver.as_str(),
                payload.as_str(),
            )
            .with_ack(*request_ack),
            Message::DirectoryRequest { emitter } => {
                Envelope::new(Category::SendClientList, emitter.as_str(), SERVER, Value::Null)
            }
            Message::System {
                emitter,
                receiver,
                signal,
            } => Envelope::new(
                Category::System,
                emitter.as_str(),
                receiver.as_str(),
                signal.as_str(),
            ),
            Message::ServerOnly { category, emitter } => {
                Envelope::new(*category, emitter.as_str(), "", Value::Null)
            }
        }
    }
}

fn expect_string(category: Category, value: Value) -> Result<String, MalformedMessage> {
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Err(MalformedMessage::MissingField("data.value")),
        _ => Err(MalformedMessage::InvalidValue {
            category,
            reason: "expected a string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use crate::protocol::AdminKind;

    fn frame(message_type: &str, emitter: &str, receiver: &str, value: Value) -> String {
        serde_json::json!({
            "message_type": message_type,
            "data": { "emitter": emitter, "receiver": receiver, "value": value }
        })
        .to_string()
    }

    #[test]
    fn test_classify_declaration() {
        let msg = Message::classify(&frame("DECLARATION", "Alice", "", Value::Null)).unwrap();
        assert_eq!(
            msg,
            Message::Declaration {
                identity: "Alice".into()
            }
        );
        assert_eq!(msg.category(), Category::Declaration);
    }

    #[test]
    fn test_classify_text() {
        let msg = Message::classify(&frame("SEND.TEXT", "Alice", "Bob", "hi".into())).unwrap();
        assert_eq!(
            msg,
            Message::Content {
                kind: ContentKind::Text,
                emitter: "Alice".into(),
                receiver: Receiver::Identity("Bob".into()),
                payload: Payload::Text("hi".into()),
                request_ack: false,
            }
        );
        assert_eq!(msg.receiver(), "Bob");
    }

    #[test]
    fn test_classify_media() {
        let msg = Message::classify(&frame("SEND.IMAGE", "Alice", "ALL", "IMG:AAAA".into())).unwrap();
        match msg {
            Message::Content {
                kind,
                receiver,
                payload: Payload::Media(media),
                ..
            } => {
                assert_eq!(kind, ContentKind::Image);
                assert_eq!(receiver, Receiver::All);
                assert_eq!(media.as_str(), "IMG:AAAA");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_media_kind_mismatch_is_malformed() {
        let err =
            Message::classify(&frame("SEND.VIDEO", "Alice", "Bob", "AUDIO:AAAA".into())).unwrap_err();
        assert_eq!(err, MalformedMessage::InvalidMedia(MediaError::KindMismatch));
    }

    #[test]
    fn test_send_requires_value_and_receiver() {
        assert_eq!(
            Message::classify(&frame("SEND.TEXT", "Alice", "Bob", Value::Null)),
            Err(MalformedMessage::MissingField("data.value"))
        );
        assert_eq!(
            Message::classify(&frame("SEND.TEXT", "Alice", "", "hi".into())),
            Err(MalformedMessage::MissingField("data.receiver"))
        );
        assert!(matches!(
            Message::classify(&frame("SEND.TEXT", "Alice", "Bob", serde_json::json!(["x"]))),
            Err(MalformedMessage::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_classify_system() {
        let msg = Message::classify(&frame("SYSTEM", "Bob", "SERVER", "pong".into())).unwrap();
        assert_eq!(
            msg,
            Message::System {
                emitter: "Bob".into(),
                receiver: Receiver::Server,
                signal: SystemSignal::Pong,
            }
        );

        let msg = Message::classify(&frame("SYSTEM", "Bob", "Alice", "VU".into())).unwrap();
        assert!(matches!(
            msg,
            Message::System {
                signal: SystemSignal::Ack,
                ..
            }
        ));
    }

    #[test]
    fn test_server_only_categories() {
        let msg =
            Message::classify(&frame("ADMIN.ROUTING_LOG", "Mallory", "", Value::Null)).unwrap();
        assert_eq!(
            msg,
            Message::ServerOnly {
                category: Category::Admin(AdminKind::RoutingLog),
                emitter: "Mallory".into()
            }
        );
        assert!(!msg.category().is_client_originated());
    }

    #[test]
    fn test_unknown_category() {
        assert_eq!(
            Message::classify(&frame("envoi", "Alice", "Bob", "x".into())),
            Err(MalformedMessage::UnknownCategory("envoi".into()))
        );
    }

    #[test]
    fn test_reencode_preserves_semantics() {
        let frames = [
            frame("DECLARATION", "Alice", "", Value::Null),
            frame("SEND.TEXT", "Alice", "ALL", "hello".into()),
            frame("SEND.AUDIO", "Alice", "Bob", "AUDIO:UklGRg==".into()),
            frame("SEND.CLIENT_LIST", "Alice", "SERVER", Value::Null),
            frame("SYSTEM", "Bob", "Alice", "pong".into()),
        ];

        for text in frames {
            let msg = Message::classify(&text).unwrap();
            let again = Message::from_envelope(msg.to_envelope()).unwrap();
            assert_eq!(again, msg, "{text}");
        }
    }
}
