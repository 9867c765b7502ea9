//! Liveness sub-protocol
//!
//! - the server pings each session with `SYSTEM "ping"` and a WebSocket
//!   ping; any inbound frame (control frames included) counts as activity,
//!   and with an idle timeout set a session silent for longer is closed
//! - a client may ping the server and gets `SYSTEM "pong"` back
//! - `SEND.*` with `ack: true` is confirmed with `SYSTEM "VU"`

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::protocol::{Category, Envelope, ACK, PING, PONG, SERVER};
use crate::registry::SessionRegistry;
use crate::session::ConnectionId;
use crate::stats::RelayStats;

use super::delivery::deliver;

/// Result of one keepalive tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keepalive {
    /// Ping queued
    Pinged,
    /// Silent past the idle timeout; the connection should close
    Expired,
    /// Connection no longer attached or its queue is closed
    Gone,
}

/// `SYSTEM "ping"` from the server
pub fn ping_frame(receiver: &str) -> Bytes {
    Envelope::new(Category::System, SERVER, receiver, PING).to_frame()
}

/// `SYSTEM "pong"` from the server
pub fn pong_frame(receiver: &str) -> Bytes {
    Envelope::new(Category::System, SERVER, receiver, PONG).to_frame()
}

/// `SYSTEM "VU"` confirming that `delivered_to` got a message from `sender`
pub fn ack_frame(delivered_to: &str, sender: &str) -> Bytes {
    Envelope::new(Category::System, delivered_to, sender, ACK).to_frame()
}

/// Server-side keepalive driver
pub struct Liveness {
    registry: Arc<SessionRegistry>,
    stats: Arc<RelayStats>,
}

impl Liveness {
    pub fn new(registry: Arc<SessionRegistry>, stats: Arc<RelayStats>) -> Self {
        Self { registry, stats }
    }

    /// Check a connection's activity and ping it
    ///
    /// `idle_timeout` of `None` never expires a session.
    pub async fn tick(&self, connection: ConnectionId, idle_timeout: Option<Duration>) -> Keepalive {
        let Some(session) = self.registry.session(connection).await else {
            return Keepalive::Gone;
        };
        let Some(handle) = self.registry.handle(connection).await else {
            return Keepalive::Gone;
        };

        if let Some(timeout) = idle_timeout {
            let idle = self
                .registry
                .idle_for(connection)
                .await
                .unwrap_or(Duration::ZERO);
            if idle > timeout {
                tracing::info!(
                    connection_id = %connection,
                    identity = ?session.identity,
                    idle_secs = idle.as_secs(),
                    "Session idle past timeout"
                );
                return Keepalive::Expired;
            }
        }

        let receiver = session.identity.as_deref().unwrap_or("");
        // A full queue drops the ping but keeps the session
        if !deliver(&handle, ping_frame(receiver), &self.stats) && handle.is_closed() {
            Keepalive::Gone
        } else {
            Keepalive::Pinged
        }
    }
}
