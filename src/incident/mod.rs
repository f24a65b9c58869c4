//! Incident persistence boundary
//!
//! Panic and auto-dispatch alerts are persisted rather than forwarded live.
//! The relay builds an [`IncidentRecord`] and hands it to an
//! [`IncidentNotifier`]; two notifiers ship with the crate:
//!
//! - [`MemoryIncidentLog`] keeps records in memory
//! - [`JsonLinesIncidentLog`] appends records to a file

pub mod file;
pub mod memory;
pub mod notifier;
pub mod record;

pub use file::JsonLinesIncidentLog;
pub use memory::MemoryIncidentLog;
pub use notifier::{IncidentError, IncidentNotifier};
pub use record::{AlertType, IncidentRecord, DEFAULT_SEVERITY};
