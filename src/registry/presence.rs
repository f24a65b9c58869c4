//! Monitor presence
//!
//! Connections that announce themselves as monitors are tracked here for
//! bookkeeping only. Routing never consults this set.

use std::collections::HashSet;

use tokio::sync::RwLock;

use super::handle::{ClientHandle, HandleId};

/// Set of connections that registered as monitors
#[derive(Default)]
pub struct MonitorSet {
    monitors: RwLock<HashSet<HandleId>>,
}

impl MonitorSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `handle` as a monitor
    ///
    /// Returns `false` if it was already marked.
    pub async fn add(&self, handle: &ClientHandle) -> bool {
        self.monitors.write().await.insert(handle.id())
    }

    /// Forget `handle`; returns whether it was a monitor
    pub async fn remove(&self, handle: &ClientHandle) -> bool {
        self.monitors.write().await.remove(&handle.id())
    }

    /// Whether `handle` registered as a monitor
    pub async fn contains(&self, handle: &ClientHandle) -> bool {
        self.monitors.read().await.contains(&handle.id())
    }

    /// Number of connected monitors
    pub async fn len(&self) -> usize {
        self.monitors.read().await.len()
    }

    /// Whether no monitors are connected
    pub async fn is_empty(&self) -> bool {
        self.monitors.read().await.is_empty()
    }
}
