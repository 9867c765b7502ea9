//! Router event sink
//!
//! Presentation layers (dashboards, loggers, metrics exporters) hook into
//! routing through [`RelayObserver`]. Every method has a no-op default, so
//! implementors override only what they need. Callbacks run inline on the
//! connection's task and must not block.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::RouteOutcome;
use crate::error::MalformedMessage;
use crate::protocol::Message;
use crate::session::{ConnectionId, SessionInfo};

/// Summary of one routed message, also sent as `ADMIN.ROUTING_LOG`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingRecord {
    pub emitter: String,
    pub receiver: String,
    pub message_type: String,
    pub timestamp: DateTime<Utc>,
}

impl RoutingRecord {
    /// Record for a message, stamped now
    pub fn new(message: &Message) -> Self {
        Self {
            emitter: message.emitter().to_string(),
            receiver: message.receiver().to_string(),
            message_type: message.category().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// JSON value for the `ADMIN.ROUTING_LOG` payload
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Callbacks for router events
pub trait RelayObserver: Send + Sync + 'static {
    /// A session declared (or re-declared)
    fn on_declared(&self, _session: &SessionInfo) {}

    /// A declared session's connection closed
    fn on_departed(&self, _session: &SessionInfo) {}

    /// A `SEND.*` or `SYSTEM` message was processed
    fn on_routed(&self, _record: &RoutingRecord, _outcome: &RouteOutcome) {}

    /// A frame failed classification and was dropped
    fn on_malformed(&self, _connection: ConnectionId, _error: &MalformedMessage) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RelayObserver for NoopObserver {}
