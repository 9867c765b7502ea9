//! Directory broadcaster
//!
//! The directory is never stored: each broadcast recomputes it from the
//! registry. Redundant broadcasts of an unchanged directory are harmless.

use std::sync::Arc;

use serde_json::Value;

use super::delivery::{deliver, deliver_all};
use crate::protocol::{AdminKind, Category, Envelope, ALL, SERVER};
use crate::registry::SessionRegistry;
use crate::session::ConnectionHandle;
use crate::stats::RelayStats;

/// Pushes the participant list to sessions
pub struct DirectoryBroadcaster {
    registry: Arc<SessionRegistry>,
    stats: Arc<RelayStats>,
}

impl DirectoryBroadcaster {
    pub fn new(registry: Arc<SessionRegistry>, stats: Arc<RelayStats>) -> Self {
        Self { registry, stats }
    }

    /// Send `RECEIVE.CLIENT_LIST` to every declared regular and monitor session
    pub async fn broadcast(&self) -> usize {
        let view = self.registry.directory_view().await;
        let frame = Envelope::new(
            Category::ReceiveClientList,
            SERVER,
            ALL,
            Value::from(view.identities.clone()),
        )
        .to_frame();

        let delivered = deliver_all(&view.recipients, &frame, &self.stats);
        tracing::debug!(
            participants = view.identities.len(),
            recipients = delivered,
            "Directory broadcast"
        );
        delivered
    }

    /// Send the current directory to one requester
    pub async fn reply(&self, handle: &ConnectionHandle, requester: &str) -> bool {
        let identities = self.registry.snapshot().await;
        let frame = Envelope::new(
            Category::ReceiveClientList,
            SERVER,
            requester,
            Value::from(identities),
        )
        .to_frame();

        deliver(handle, frame, &self.stats)
    }

    /// Send `ADMIN.CLIENT_LIST_FULL` (directory with metadata) to a monitor
    pub async fn full_snapshot(&self, handle: &ConnectionHandle, monitor: &str) -> bool {
        let sessions: Vec<Value> = self
            .registry
            .detailed_snapshot()
            .await
            .iter()
            .map(|info| info.to_value())
            .collect();

        let frame = Envelope::new(
            Category::Admin(AdminKind::ClientListFull),
            SERVER,
            monitor,
            Value::Array(sessions),
        )
        .to_frame();

        deliver(handle, frame, &self.stats)
    }
}
