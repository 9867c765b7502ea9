//! chat-relay: a WebSocket message relay for chat clients
//!
//! Clients connect over WebSocket, declare an identity, then exchange JSON
//! envelopes (text and base64 media) addressed to one participant or to
//! `"ALL"`. Sessions whose identity starts with the monitor prefix
//! (`"ADMIN"` by default) receive a copy of all traffic plus routing and
//! membership events.
//!
//! # Example
//!
//! ```no_run
//! use chat_relay::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> chat_relay::Result<()> {
//!     let server = RelayServer::new(ServerConfig::default());
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await
//! }
//! ```
//!
//! # Layout
//!
//! - [`protocol`]: envelope codec and message classification
//! - [`registry`]: identity to connection mapping and the directory
//! - [`session`]: per-connection state and outbound queues
//! - [`router`]: routing, monitor mirroring, directory broadcasts, liveness
//! - [`server`]: TCP/WebSocket transport
//! - [`stats`]: relay counters

pub mod error;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, MalformedMessage, MediaError, Result, SendError};
pub use protocol::{Category, ContentKind, Envelope, Message, ALL, SERVER};
pub use registry::{RegistryConfig, SessionRegistry};
pub use router::{NoopObserver, RelayObserver, RouteOutcome, Router, RoutingRecord};
pub use server::{RelayServer, ServerConfig};
pub use session::{ConnectionHandle, ConnectionId, OverflowPolicy, Role, SessionInfo};
pub use stats::{RelayStats, StatsSnapshot};
