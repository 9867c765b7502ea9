//! Best-effort frame delivery
//!
//! A failed queue write is logged and counted, never propagated: one dead
//! or slow connection must not affect delivery to anyone else.

use bytes::Bytes;

use crate::session::ConnectionHandle;
use crate::stats::RelayStats;

/// Queue a frame on one connection; `true` if it was accepted
pub(crate) fn deliver(handle: &ConnectionHandle, frame: Bytes, stats: &RelayStats) -> bool {
    match handle.send(frame) {
        Ok(()) => true,
        Err(e) => {
            stats.record_send_failure();
            tracing::warn!(
                connection_id = %handle.id(),
                error = %e,
                "Failed to queue frame"
            );
            false
        }
    }
}

/// Queue the same frame on every handle; returns how many accepted it
pub(crate) fn deliver_all(handles: &[ConnectionHandle], frame: &Bytes, stats: &RelayStats) -> usize {
    handles
        .iter()
        .filter(|handle| deliver(handle, frame.clone(), stats))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ConnectionId, OverflowPolicy};

    #[test]
    fn test_failed_handle_does_not_stop_others() {
        let stats = RelayStats::new();
        let (dead, dead_queue) =
            ConnectionHandle::channel(ConnectionId::new(1), 4, OverflowPolicy::DropNewest);
        let (live, mut live_queue) =
            ConnectionHandle::channel(ConnectionId::new(2), 4, OverflowPolicy::DropNewest);
        drop(dead_queue);

        let frame = Bytes::from_static(b"{}");
        let delivered = deliver_all(&[dead, live], &frame, &stats);

        assert_eq!(delivered, 1);
        assert_eq!(live_queue.try_next().unwrap(), frame);
        assert_eq!(
            stats
                .snapshot(crate::registry::RegistryCounts::default())
                .send_failures,
            1
        );
    }
}
