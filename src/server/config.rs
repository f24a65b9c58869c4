//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default port for the relay's WebSocket listener
pub const DEFAULT_PORT: u16 = 8765;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// WebSocket handshake must complete within this time
    pub handshake_timeout: Duration,

    /// Disconnect if nothing is received for this long (None = never)
    pub idle_timeout: Option<Duration>,

    /// Send a WebSocket ping this often (None = half the idle timeout, if set)
    pub ping_interval: Option<Duration>,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Per-connection outbound queue length; further messages are dropped
    pub outbound_queue_capacity: usize,

    /// Largest accepted inbound WebSocket message in bytes
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: None,
            ping_interval: None,
            tcp_nodelay: true, // Audio chunks are small and latency-sensitive
            outbound_queue_capacity: 256,
            max_message_size: 1024 * 1024, // 1MB
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

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the keep-alive ping interval
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    /// Interval at which the writer pings the peer
    ///
    /// Pongs count as inbound traffic, so a client that only listens keeps
    /// resetting the idle timeout as long as it answers.
    pub fn keepalive_interval(&self) -> Option<Duration> {
        self.ping_interval
            .or_else(|| self.idle_timeout.map(|idle| idle / 2))
            .filter(|interval| !interval.is_zero())
    }

    /// Set the outbound queue capacity (minimum 1)
    pub fn outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity.max(1);
        self
    }

    /// Set the maximum inbound message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}
