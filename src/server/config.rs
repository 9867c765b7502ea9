//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::session::OverflowPolicy;

/// Default listening port
pub const DEFAULT_PORT: u16 = 8765;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Frames buffered per connection before the overflow policy applies
    pub outbound_queue_capacity: usize,

    /// What to do when a connection's outbound queue is full
    pub overflow_policy: OverflowPolicy,

    /// Interval between server pings (`None` disables keepalive)
    pub ping_interval: Option<Duration>,

    /// Idle timeout, checked on each ping (`None` = never expire)
    ///
    /// Inbound WebSocket ping/pong frames count as activity, so a client
    /// whose WebSocket stack answers pings is never considered idle.
    pub idle_timeout: Option<Duration>,

    /// Largest accepted WebSocket message/frame in bytes
    pub max_frame_size: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            outbound_queue_capacity: 256,
            overflow_policy: OverflowPolicy::DropNewest,
            ping_interval: Some(Duration::from_secs(30)),
            idle_timeout: None,
            max_frame_size: 64 * 1024 * 1024, // 64MB, media blobs are inline
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-connection outbound queue capacity (at least 1)
    pub fn outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity.max(1);
        self
    }

    /// Set the overflow policy
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Set the ping interval
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    /// Disable server keepalive pings and idle expiry
    pub fn disable_keepalive(mut self) -> Self {
        self.ping_interval = None;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}
