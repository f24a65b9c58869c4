//! WebSocket transport for the relay
//!
//! The server owns sockets; the rest of the crate only sees
//! [`ClientHandle`](crate::registry::ClientHandle)s.

pub mod config;
pub(crate) mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::RelayServer;
