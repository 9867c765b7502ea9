//! Session state machine
//!
//! Tracks one connection from transport connect to close:
//!
//! ```text
//! Undeclared ──DECLARATION──► Declared(role) ──close──► Closed
//!                   ▲               │
//!                   └─DECLARATION───┘   (re-register, identity/role may change)
//! ```
//!
//! A declared session whose identity is claimed by another connection drops
//! back to `Undeclared`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::handle::ConnectionId;

/// Session role, fixed at declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Chat participant
    Regular,
    /// Privileged observer
    Monitor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Regular => f.write_str("regular"),
            Role::Monitor => f.write_str("monitor"),
        }
    }
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, no identity bound
    Undeclared,
    /// Identity and role bound
    Declared(Role),
    /// Transport closed
    Closed,
}

/// Complete per-connection session state
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Connection this session belongs to
    pub connection_id: ConnectionId,

    /// Declared identity
    pub identity: Option<String>,

    /// Current phase
    pub phase: SessionPhase,

    /// Transport connect time
    pub connected_at: DateTime<Utc>,

    /// Last inbound frame
    pub last_activity: DateTime<Utc>,

    /// Registration sequence, orders the directory
    pub registered_seq: u64,
}

impl SessionState {
    /// Create an undeclared session
    pub fn new(connection_id: ConnectionId) -> Self {
        let now = Utc::now();
        Self {
            connection_id,
            identity: None,
            phase: SessionPhase::Undeclared,
            connected_at: now,
            last_activity: now,
            registered_seq: 0,
        }
    }

    /// Bind an identity and role
    pub fn declare(&mut self, identity: String, role: Role, seq: u64) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        self.identity = Some(identity);
        self.phase = SessionPhase::Declared(role);
        self.registered_seq = seq;
    }

    /// Drop the identity after another connection claimed it
    pub fn evict(&mut self) {
        if matches!(self.phase, SessionPhase::Declared(_)) {
            self.identity = None;
            self.phase = SessionPhase::Undeclared;
        }
    }

    /// Mark the transport closed
    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    /// Record inbound activity
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn role(&self) -> Option<Role> {
        match self.phase {
            SessionPhase::Declared(role) => Some(role),
            _ => None,
        }
    }

    pub fn is_declared(&self) -> bool {
        matches!(self.phase, SessionPhase::Declared(_))
    }

    /// Time since the last inbound frame
    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.last_activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut state = SessionState::new(ConnectionId::new(1));
        assert_eq!(state.phase, SessionPhase::Undeclared);
        assert!(state.role().is_none());

        state.declare("Alice".into(), Role::Regular, 1);
        assert_eq!(state.phase, SessionPhase::Declared(Role::Regular));
        assert_eq!(state.identity.as_deref(), Some("Alice"));

        // Re-declaration may change identity and role
        state.declare("ADMIN_1".into(), Role::Monitor, 2);
        assert_eq!(state.role(), Some(Role::Monitor));
        assert_eq!(state.registered_seq, 2);

        state.close();
        assert_eq!(state.phase, SessionPhase::Closed);

        // No way back from Closed
        state.declare("Alice".into(), Role::Regular, 3);
        assert_eq!(state.phase, SessionPhase::Closed);
    }

    #[test]
    fn test_evict_returns_to_undeclared() {
        let mut state = SessionState::new(ConnectionId::new(7));
        state.declare("Alice".into(), Role::Regular, 1);

        state.evict();
        assert_eq!(state.phase, SessionPhase::Undeclared);
        assert!(state.identity.is_none());
    }

    #[test]
    fn test_touch_updates_activity() {
        let mut state = SessionState::new(ConnectionId::new(1));
        let before = state.last_activity;
        state.touch();
        assert!(state.last_activity >= before);
        assert!(state.idle_for(Utc::now()) >= chrono::Duration::zero());
    }
}
