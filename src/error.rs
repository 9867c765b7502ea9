//! Error types
//!
//! Routing itself never fails: per-frame results are reported as
//! [`RouteOutcome`](crate::router::RouteOutcome) values. The errors here
//! cover classification, outbound queueing and the transport.

use thiserror::Error;

use crate::protocol::Category;

/// Result alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Frame could not be classified
    #[error("Malformed message: {0}")]
    Malformed(#[from] MalformedMessage),

    /// Frame could not be queued to a connection
    #[error("Send failed: {0}")]
    Send(#[from] SendError),
}

/// A frame that cannot be turned into a typed message.
///
/// The frame is dropped; the connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedMessage {
    /// Not a JSON object of the envelope shape
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// A required envelope field is absent or empty
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// `message_type` is not a recognized category
    #[error("unknown message_type: {0}")]
    UnknownCategory(String),

    /// `value` has the wrong shape for the category
    #[error("invalid value for {category}: {reason}")]
    InvalidValue {
        category: Category,
        reason: &'static str,
    },

    /// Media blob does not parse
    #[error("invalid media payload: {0}")]
    InvalidMedia(#[from] MediaError),
}

/// Media blob (`<KIND>:<base64>`) parse failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MediaError {
    /// No `KIND:` prefix
    #[error("missing kind tag")]
    MissingTag,

    /// Prefix is not IMG, AUDIO or VIDEO
    #[error("unknown media kind")]
    UnknownKind,

    /// Body is not standard base64
    #[error("body is not valid base64")]
    InvalidBase64,

    /// Kind does not match the message category
    #[error("media kind does not match category")]
    KindMismatch,
}

/// Failure to queue a frame on a connection's outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// Queue at capacity (slow consumer)
    #[error("outbound queue full")]
    QueueFull,

    /// Connection writer has gone away
    #[error("connection closed")]
    Closed,
}
