//! Session information
//!
//! Read-only snapshot of a declared session, handed to observers and sent
//! to monitors as `ADMIN.*` metadata.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::handle::ConnectionId;
use super::state::{Role, SessionState};

/// Snapshot of a declared session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    #[serde(skip)]
    pub connection_id: ConnectionId,

    /// Declared identity
    pub username: String,

    pub role: Role,

    pub connected_at: DateTime<Utc>,

    pub last_activity: DateTime<Utc>,
}

impl SessionInfo {
    /// Snapshot a session; `None` unless it is declared
    pub fn from_state(state: &SessionState) -> Option<Self> {
        let role = state.role()?;
        let username = state.identity.clone()?;

        Some(Self {
            connection_id: state.connection_id,
            username,
            role,
            connected_at: state.connected_at,
            last_activity: state.last_activity,
        })
    }

    /// JSON value for `ADMIN.*` payloads
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
