//! WebSocket transport
//!
//! Accepts TCP connections, upgrades them to WebSocket and runs one
//! reader/writer task pair per connection. All message semantics live in
//! the [`Router`](crate::router::Router).

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::RelayServer;
