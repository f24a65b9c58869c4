//! Incident notifier trait
//!
//! The router hands every panic and auto-dispatch record to an
//! [`IncidentNotifier`] and awaits the outcome. How the record is stored is
//! up to the implementation; the router only needs to know whether it
//! succeeded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::record::IncidentRecord;

/// Error returned by an incident notifier
#[derive(Debug, thiserror::Error)]
pub enum IncidentError {
    /// Storage I/O failed
    #[error("Incident storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Record could not be serialized
    #[error("Failed to serialize incident: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Storage refused or is unreachable
    #[error("Incident storage unavailable: {0}")]
    Unavailable(String),
    /// Storage did not answer in time
    #[error("Incident storage timed out after {0:?}")]
    Timeout(Duration),
}

/// Persistence collaborator for incident records
pub trait IncidentNotifier: Send + Sync + 'static {
    /// Persist one record
    fn persist(
        &self,
        record: &IncidentRecord,
    ) -> impl Future<Output = Result<(), IncidentError>> + Send;
}

impl<N: IncidentNotifier> IncidentNotifier for Arc<N> {
    fn persist(
        &self,
        record: &IncidentRecord,
    ) -> impl Future<Output = Result<(), IncidentError>> + Send {
        (**self).persist(record)
    }
}
