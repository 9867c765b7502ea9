//! Statistics for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::registry::RegistryCounts;

/// Relay-wide counters
///
/// Updated with relaxed atomics on the hot path; read via [`snapshot`](Self::snapshot).
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    connections_total: AtomicU64,
    frames_received: AtomicU64,
    malformed_frames: AtomicU64,
    messages_routed: AtomicU64,
    unknown_receivers: AtomicU64,
    send_failures: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            connections_total: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            malformed_frames: AtomicU64::new(0),
            messages_routed: AtomicU64::new(0),
            unknown_receivers: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    pub fn record_connection(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_routed(&self) {
        self.messages_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_receiver(&self) {
        self.unknown_receivers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self, sessions: RegistryCounts) -> StatsSnapshot {
        StatsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            messages_routed: self.messages_routed.load(Ordering::Relaxed),
            unknown_receivers: self.unknown_receivers.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            sessions,
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of the relay counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Connections ever accepted
    pub connections_total: u64,
    /// Inbound frames, valid or not
    pub frames_received: u64,
    /// Frames dropped by the classifier
    pub malformed_frames: u64,
    /// Messages that reached routing
    pub messages_routed: u64,
    /// Targeted sends to identities that were not registered
    pub unknown_receivers: u64,
    /// Frames that could not be queued
    pub send_failures: u64,
    /// Live session counts
    pub sessions: RegistryCounts,
    pub uptime: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = RelayStats::new();
        let snap = stats.snapshot(RegistryCounts::default());
        assert_eq!(snap.connections_total, 0);
        assert_eq!(snap.frames_received, 0);
        assert_eq!(snap.malformed_frames, 0);
        assert_eq!(snap.messages_routed, 0);
        assert_eq!(snap.unknown_receivers, 0);
        assert_eq!(snap.send_failures, 0);
    }

    #[test]
    fn test_stats_record() {
        let stats = RelayStats::new();
        stats.record_connection();
        stats.record_frame();
        stats.record_frame();
        stats.record_malformed();
        stats.record_routed();
        stats.record_unknown_receiver();
        stats.record_send_failure();
        stats.record_send_failure();

        let sessions = RegistryCounts {
            connections: 3,
            regular: 2,
            monitors: 1,
        };
        let snap = stats.snapshot(sessions);

        assert_eq!(snap.connections_total, 1);
        assert_eq!(snap.frames_received, 2);
        assert_eq!(snap.malformed_frames, 1);
        assert_eq!(snap.messages_routed, 1);
        assert_eq!(snap.unknown_receivers, 1);
        assert_eq!(snap.send_failures, 2);
        assert_eq!(snap.sessions, sessions);
    }
}
