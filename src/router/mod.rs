//! Message routing
//!
//! The [`Router`] is the single logical coordinator shared by all
//! connection tasks. It owns no sockets: every outbound frame is queued on a
//! [`ConnectionHandle`](crate::session::ConnectionHandle) taken from the
//! registry, so routing never blocks on a slow peer.
//!
//! - [`dispatch`]: classification and per-category routing
//! - [`mirror`]: copies of all traffic for monitor sessions
//! - [`directory`]: participant list broadcasts
//! - [`liveness`]: ping/pong keepalive and delivery acknowledgments
//! - [`observer`]: event sink for presentation layers

mod delivery;
pub mod directory;
pub mod dispatch;
pub mod liveness;
pub mod mirror;
pub mod observer;

pub use directory::DirectoryBroadcaster;
pub use dispatch::{DropReason, RouteOutcome, Router};
pub use liveness::{Keepalive, Liveness};
pub use mirror::MonitorMirror;
pub use observer::{NoopObserver, RelayObserver, RoutingRecord};
