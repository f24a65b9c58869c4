//! In-memory incident log

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use super::notifier::{IncidentError, IncidentNotifier};
use super::record::IncidentRecord;

/// Notifier that keeps records in memory
///
/// Can be switched into a failing mode to simulate an unavailable store.
#[derive(Debug, Default)]
pub struct MemoryIncidentLog {
    records: Mutex<Vec<IncidentRecord>>,
    failing: AtomicBool,
}

impl MemoryIncidentLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `persist` calls fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Copy of all stored records, oldest first
    pub async fn records(&self) -> Vec<IncidentRecord> {
        self.records.lock().await.clone()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether no record has been stored
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

impl IncidentNotifier for MemoryIncidentLog {
    async fn persist(&self, record: &IncidentRecord) -> Result<(), IncidentError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(IncidentError::Unavailable("memory log set to fail".into()));
        }

        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
