//! Monitor mirror
//!
//! Every processed `SEND.*` / `SYSTEM` frame is copied verbatim to each
//! monitor session, followed by an `ADMIN.ROUTING_LOG` summary. Membership
//! events for regular sessions reach monitors as `ADMIN.CLIENT_CONNECTED` /
//! `ADMIN.CLIENT_DISCONNECTED`.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use super::delivery::{deliver, deliver_all};
use super::observer::RoutingRecord;
use crate::protocol::{AdminKind, Category, Envelope, SERVER};
use crate::registry::SessionRegistry;
use crate::stats::RelayStats;

/// Fans traffic and routing events out to monitor sessions
pub struct MonitorMirror {
    registry: Arc<SessionRegistry>,
    stats: Arc<RelayStats>,
}

impl MonitorMirror {
    pub fn new(registry: Arc<SessionRegistry>, stats: Arc<RelayStats>) -> Self {
        Self { registry, stats }
    }

    /// Mirror a raw inbound frame and its routing summary
    ///
    /// Returns the number of monitors that accepted the raw frame.
    pub async fn mirror(&self, raw: &str, record: &RoutingRecord) -> usize {
        let monitors = self.registry.monitors().await;
        if monitors.is_empty() {
            return 0;
        }

        let raw_frame = Bytes::copy_from_slice(raw.as_bytes());
        let log_frame = Envelope::new(
            Category::Admin(AdminKind::RoutingLog),
            SERVER,
            "",
            record.to_value(),
        )
        .to_frame();

        let mut mirrored = 0;
        for monitor in &monitors {
            if deliver(monitor, raw_frame.clone(), &self.stats) {
                mirrored += 1;
            }
            deliver(monitor, log_frame.clone(), &self.stats);
        }

        tracing::debug!(
            emitter = %record.emitter,
            receiver = %record.receiver,
            category = %record.message_type,
            monitors = mirrored,
            "Mirrored to monitors"
        );

        mirrored
    }

    /// Send an `ADMIN.*` event to every monitor
    pub async fn notify(&self, kind: AdminKind, value: Value) -> usize {
        let monitors = self.registry.monitors().await;
        if monitors.is_empty() {
            return 0;
        }

        let frame = Envelope::new(Category::Admin(kind), SERVER, "", value).to_frame();
        deliver_all(&monitors, &frame, &self.stats)
    }
}
