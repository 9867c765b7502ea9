//! Message categories
//!
//! Every envelope carries a `message_type` string naming one of these
//! categories. Client-originated categories are `DECLARATION`, `SEND.*` and
//! `SYSTEM`; `RECEIVE.*` and `ADMIN.*` only ever flow from the server.

use std::fmt;
use std::str::FromStr;

use crate::error::MalformedMessage;

/// Kind of chat content carried by `SEND.*` / `RECEIVE.*`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Text,
    Image,
    Audio,
    Video,
}

impl ContentKind {
    fn suffix(self) -> &'static str {
        match self {
            ContentKind::Text => "TEXT",
            ContentKind::Image => "IMAGE",
            ContentKind::Audio => "AUDIO",
            ContentKind::Video => "VIDEO",
        }
    }

    /// Whether the payload is a tagged media blob
    pub fn is_media(self) -> bool {
        !matches!(self, ContentKind::Text)
    }
}

/// Monitor-only event categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminKind {
    /// Summary of one routed message
    RoutingLog,
    /// A regular session declared
    ClientConnected,
    /// A regular session went away
    ClientDisconnected,
    /// Directory with per-session metadata
    ClientListFull,
}

impl AdminKind {
    fn suffix(self) -> &'static str {
        match self {
            AdminKind::RoutingLog => "ROUTING_LOG",
            AdminKind::ClientConnected => "CLIENT_CONNECTED",
            AdminKind::ClientDisconnected => "CLIENT_DISCONNECTED",
            AdminKind::ClientListFull => "CLIENT_LIST_FULL",
        }
    }
}

/// Message category (the envelope's `message_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Identity handshake
    Declaration,
    /// Client → server content
    Send(ContentKind),
    /// Client asks for the directory
    SendClientList,
    /// Server → client content
    Receive(ContentKind),
    /// Server → client directory
    ReceiveClientList,
    /// Ping / pong / acknowledgment
    System,
    /// Server → monitor events
    Admin(AdminKind),
}

impl Category {
    /// Map a `SEND.*` category to the `RECEIVE.*` one delivered to recipients
    pub fn remap(self) -> Self {
        match self {
            Category::Send(kind) => Category::Receive(kind),
            Category::SendClientList => Category::ReceiveClientList,
            other => other,
        }
    }

    /// Whether a client is allowed to originate this category
    pub fn is_client_originated(self) -> bool {
        matches!(
            self,
            Category::Declaration | Category::Send(_) | Category::SendClientList | Category::System
        )
    }

    /// Whether processing this category triggers the monitor mirror
    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            Category::Send(_) | Category::SendClientList | Category::System
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Declaration => f.write_str("DECLARATION"),
            Category::Send(kind) => write!(f, "SEND.{}", kind.suffix()),
            Category::SendClientList => f.write_str("SEND.CLIENT_LIST"),
            Category::Receive(kind) => write!(f, "RECEIVE.{}", kind.suffix()),
            Category::ReceiveClientList => f.write_str("RECEIVE.CLIENT_LIST"),
            Category::System => f.write_str("SYSTEM"),
            Category::Admin(kind) => write!(f, "ADMIN.{}", kind.suffix()),
        }
    }
}

impl FromStr for Category {
    type Err = MalformedMessage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let content = |suffix: &str| match suffix {
            "TEXT" => Some(ContentKind::Text),
            "IMAGE" => Some(ContentKind::Image),
            "AUDIO" => Some(ContentKind::Audio),
            "VIDEO" => Some(ContentKind::Video),
            _ => None,
        };

        let category = match s.split_once('.') {
            None if s == "DECLARATION" => Some(Category::Declaration),
            None if s == "SYSTEM" => Some(Category::System),
            Some(("SEND", "CLIENT_LIST")) => Some(Category::SendClientList),
            Some(("RECEIVE", "CLIENT_LIST")) => Some(Category::ReceiveClientList),
            Some(("SEND", suffix)) => content(suffix).map(Category::Send),
            Some(("RECEIVE", suffix)) => content(suffix).map(Category::Receive),
            Some(("ADMIN", "ROUTING_LOG")) => Some(Category::Admin(AdminKind::RoutingLog)),
            Some(("ADMIN", "CLIENT_CONNECTED")) => Some(Category::Admin(AdminKind::ClientConnected)),
            Some(("ADMIN", "CLIENT_DISCONNECTED")) => {
                Some(Category::Admin(AdminKind::ClientDisconnected))
            }
            Some(("ADMIN", "CLIENT_LIST_FULL")) => Some(Category::Admin(AdminKind::ClientListFull)),
            _ => None,
        };

        category.ok_or_else(|| MalformedMessage::UnknownCategory(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [&str; 16] = [
        "DECLARATION",
        "SEND.TEXT",
        "SEND.IMAGE",
        "SEND.AUDIO",
        "SEND.VIDEO",
        "SEND.CLIENT_LIST",
        "RECEIVE.TEXT",
        "RECEIVE.IMAGE",
        "RECEIVE.AUDIO",
        "RECEIVE.VIDEO",
        "RECEIVE.CLIENT_LIST",
        "SYSTEM",
        "ADMIN.ROUTING_LOG",
        "ADMIN.CLIENT_CONNECTED",
        "ADMIN.CLIENT_DISCONNECTED",
        "ADMIN.CLIENT_LIST_FULL",
    ];

    #[test]
    fn test_every_wire_name_is_recognized() {
        for name in ALL_TYPES {
            let category: Category = name.parse().unwrap();
            assert_eq!(category.to_string(), name);
        }
    }

    #[test]
    fn test_unknown_names_rejected() {
        for name in ["", "SEND", "SEND.", "send.text", "RECEIVE.FILE", "ADMIN.X", "envoi"] {
            assert!(matches!(
                name.parse::<Category>(),
                Err(MalformedMessage::UnknownCategory(_))
            ));
        }
    }

    #[test]
    fn test_remap() {
        assert_eq!(
            Category::Send(ContentKind::Video).remap(),
            Category::Receive(ContentKind::Video)
        );
        assert_eq!(Category::SendClientList.remap(), Category::ReceiveClientList);
        assert_eq!(Category::System.remap(), Category::System);
    }

    #[test]
    fn test_direction() {
        assert!(Category::Declaration.is_client_originated());
        assert!(Category::System.is_client_originated());
        assert!(!Category::Receive(ContentKind::Text).is_client_originated());
        assert!(!Category::Admin(AdminKind::RoutingLog).is_client_originated());

        assert!(Category::Send(ContentKind::Text).is_mirrored());
        assert!(!Category::Declaration.is_mirrored());
    }
}
