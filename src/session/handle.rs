//! Outbound connection handle
//!
//! The router talks to a connection only through a [`ConnectionHandle`]:
//! a bounded queue drained by the connection's writer task. Queueing never
//! blocks, so a slow consumer cannot stall routing for anyone else.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::error::SendError;

/// Opaque per-connection identifier assigned by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to do when a connection's outbound queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the frame being queued, keep the connection
    #[default]
    DropNewest,
    /// Drop the frame and close the connection
    Disconnect,
}

/// Sending half of a connection's outbound queue
///
/// Cheap to clone; the registry hands out clones for delivery.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Bytes>,
    close: CancellationToken,
    policy: OverflowPolicy,
    dropped: Arc<AtomicU64>,
}

impl ConnectionHandle {
    /// Create a handle and the queue its writer drains
    pub fn channel(
        id: ConnectionId,
        capacity: usize,
        policy: OverflowPolicy,
    ) -> (Self, OutboundQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let close = CancellationToken::new();

        let handle = Self {
            id,
            tx,
            close: close.clone(),
            policy,
            dropped: Arc::new(AtomicU64::new(0)),
        };

        (handle, OutboundQueue { rx, close })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame without waiting
    pub fn send(&self, frame: Bytes) -> Result<(), SendError> {
        if self.close.is_cancelled() {
            return Err(SendError::Closed);
        }

        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                if self.policy == OverflowPolicy::Disconnect {
                    tracing::warn!(
                        connection_id = %self.id,
                        "Outbound queue full, disconnecting slow consumer"
                    );
                    self.close.cancel();
                }
                Err(SendError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Ask the transport to close this connection
    pub fn close(&self) {
        self.close.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled() || self.tx.is_closed()
    }

    /// Frames dropped because the queue was full
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Receiving half of a connection's outbound queue
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<Bytes>,
    close: CancellationToken,
}

impl OutboundQueue {
    /// Next frame to write, or `None` once the connection should close
    pub async fn next(&mut self) -> Option<Bytes> {
        tokio::select! {
            biased;
            _ = self.close.cancelled() => None,
            frame = self.rx.recv() => frame,
        }
    }

    /// Non-waiting variant of [`next`](Self::next)
    pub fn try_next(&mut self) -> Option<Bytes> {
        if self.close.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Token cancelled when the connection is asked to close
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn handle(capacity: usize, policy: OverflowPolicy) -> (ConnectionHandle, OutboundQueue) {
        ConnectionHandle::channel(ConnectionId::new(1), capacity, policy)
    }

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let (handle, mut queue) = handle(8, OverflowPolicy::DropNewest);

        assert_ok!(handle.send(Bytes::from_static(b"one")));
        assert_ok!(handle.send(Bytes::from_static(b"two")));

        assert_eq!(queue.next().await.unwrap(), Bytes::from_static(b"one"));
        assert_eq!(queue.next().await.unwrap(), Bytes::from_static(b"two"));
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let (handle, mut queue) = handle(1, OverflowPolicy::DropNewest);

        assert_ok!(handle.send(Bytes::from_static(b"kept")));
        assert_eq!(
            handle.send(Bytes::from_static(b"lost")),
            Err(SendError::QueueFull)
        );
        assert_eq!(handle.dropped_frames(), 1);
        assert!(!handle.is_closed());

        assert_eq!(queue.try_next().unwrap(), Bytes::from_static(b"kept"));
        assert!(queue.try_next().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_disconnects() {
        let (handle, mut queue) = handle(1, OverflowPolicy::Disconnect);

        assert_ok!(handle.send(Bytes::from_static(b"a")));
        assert_err!(handle.send(Bytes::from_static(b"b")));

        assert!(handle.is_closed());
        assert!(queue.next().await.is_none());
        assert_eq!(handle.send(Bytes::from_static(b"c")), Err(SendError::Closed));
    }

    #[test]
    fn test_dropped_receiver_reports_closed() {
        let (handle, queue) = handle(4, OverflowPolicy::DropNewest);
        drop(queue);

        assert!(handle.is_closed());
        assert_eq!(handle.send(Bytes::from_static(b"x")), Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_close_wakes_writer() {
        let (handle, mut queue) = handle(4, OverflowPolicy::DropNewest);
        let token = queue.close_token();

        let writer = tokio::spawn(async move { queue.next().await });
        handle.close();

        assert!(writer.await.unwrap().is_none());
        assert!(token.is_cancelled());
    }
}
