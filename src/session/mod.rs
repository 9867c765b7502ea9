//! Per-connection session types
//!
//! - [`state`]: lifecycle phase and role, owned by the registry
//! - [`context`]: read-only [`SessionInfo`] snapshots
//! - [`handle`]: the bounded outbound queue the router delivers through

pub mod context;
pub mod handle;
pub mod state;

pub use context::SessionInfo;
pub use handle::{ConnectionHandle, ConnectionId, OutboundQueue, OverflowPolicy};
pub use state::{Role, SessionPhase, SessionState};
