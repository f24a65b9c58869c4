//! Incident records handed to the persistence collaborator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::ClientIdentity;

/// Severity used when an alert carries no level
pub const DEFAULT_SEVERITY: &str = "Danger";

/// Kind of alert that produced an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Panic button pressed by the field client
    Panic,
    /// Alert raised automatically on the client side
    AutoDispatch,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::Panic => f.write_str("panic"),
            AlertType::AutoDispatch => f.write_str("auto_dispatch"),
        }
    }
}

/// A panic or auto-dispatch alert to be persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub client_identity: ClientIdentity,
    pub timestamp: DateTime<Utc>,
    pub alert_type: AlertType,
    pub severity_level: String,
    pub auto_dispatch: bool,
}

impl IncidentRecord {
    /// Build a record stamped with the current time
    ///
    /// `auto_dispatch` follows the alert type.
    pub fn new(client_identity: ClientIdentity, alert_type: AlertType, severity_level: String) -> Self {
        Self {
            client_identity,
            timestamp: Utc::now(),
            alert_type,
            severity_level,
            auto_dispatch: alert_type == AlertType::AutoDispatch,
        }
    }

    /// Panic record; severity defaults to [`DEFAULT_SEVERITY`]
    pub fn panic(client_identity: ClientIdentity, level: Option<&str>) -> Self {
        Self::new(
            client_identity,
            AlertType::Panic,
            level.unwrap_or(DEFAULT_SEVERITY).to_string(),
        )
    }

    /// Auto-dispatch record; severity defaults to [`DEFAULT_SEVERITY`]
    pub fn auto_dispatch(client_identity: ClientIdentity, level: Option<&str>) -> Self {
        Self::new(
            client_identity,
            AlertType::AutoDispatch,
            level.unwrap_or(DEFAULT_SEVERITY).to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_record() {
        let record = IncidentRecord::panic(ClientIdentity::new("u1"), Some("High"));

        assert_eq!(record.alert_type, AlertType::Panic);
        assert_eq!(record.severity_level, "High");
        assert!(!record.auto_dispatch);
    }

    #[test]
    fn test_auto_dispatch_record_defaults_severity() {
        let record = IncidentRecord::auto_dispatch(ClientIdentity::new("u1"), None);

        assert_eq!(record.alert_type, AlertType::AutoDispatch);
        assert_eq!(record.severity_level, DEFAULT_SEVERITY);
        assert!(record.auto_dispatch);
    }

    #[test]
    fn test_serialized_field_names() {
        let record = IncidentRecord::panic(ClientIdentity::new("u1"), None);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["client_identity"], "u1");
        assert_eq!(value["alert_type"], "panic");
        assert_eq!(value["severity_level"], "Danger");
        assert_eq!(value["auto_dispatch"], false);
        assert!(value["timestamp"].is_string());
    }
}
