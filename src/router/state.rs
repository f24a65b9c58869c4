//! Shared relay state
//!
//! The registry, subscription table and monitor set are created together and
//! passed explicitly to the router; nothing here is global.

use std::sync::Arc;

use crate::registry::{MonitorSet, RegistryConfig, SessionRegistry, SubscriptionTable};
use crate::stats::{RelayStats, RelayStatsSnapshot};

/// Process-wide mutable state of one relay instance
#[derive(Clone)]
pub struct RelayState {
    pub sessions: Arc<SessionRegistry>,
    pub rooms: Arc<SubscriptionTable>,
    pub monitors: Arc<MonitorSet>,
    pub stats: Arc<RelayStats>,
}

impl RelayState {
    /// Create empty state with default registry configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create empty state with custom registry configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::with_config(config)),
            rooms: Arc::new(SubscriptionTable::new()),
            monitors: Arc::new(MonitorSet::new()),
            stats: Arc::new(RelayStats::new()),
        }
    }

    /// Counters plus live registry gauges
    pub async fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            field_clients: self.sessions.field_count().await,
            rooms: self.rooms.room_count().await,
            monitors: self.monitors.len().await,
            ..self.stats.snapshot()
        }
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}
