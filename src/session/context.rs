//! Per-connection session context
//!
//! Bookkeeping the connection task keeps about its own client: who it is,
//! what role it has announced, and how much it has sent.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::protocol::InboundEvent;
use crate::registry::HandleId;

/// Role a connection has announced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRole {
    /// No registration event seen yet
    Unknown,
    /// Registered as a field client
    Field,
    /// Registered as a monitor
    Monitor,
}

/// Context for one connection
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: HandleId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Announced role
    pub role: ClientRole,

    /// Connection start time
    pub connected_at: Instant,

    /// Inbound events decoded on this connection
    pub events: u64,

    /// Frames that failed to decode
    pub rejected_frames: u64,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: HandleId, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr,
            role: ClientRole::Unknown,
            connected_at: Instant::now(),
            events: 0,
            rejected_frames: 0,
        }
    }

    /// Record a decoded inbound event
    ///
    /// Registration events set the role; a later registration overrides an
    /// earlier one.
    pub fn observe(&mut self, event: &InboundEvent) {
        self.events += 1;
        match event {
            InboundEvent::RegisterField(_) => self.role = ClientRole::Field,
            InboundEvent::RegisterMonitor => self.role = ClientRole::Monitor,
            _ => {}
        }
    }

    /// Record a frame that failed to decode
    pub fn reject(&mut self) {
        self.rejected_frames += 1;
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
