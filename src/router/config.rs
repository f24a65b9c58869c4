//! Router configuration

use std::time::Duration;

use crate::incident::DEFAULT_SEVERITY;

/// Configuration for event routing
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upper bound on one incident notifier call
    pub notifier_timeout: Duration,

    /// Severity recorded when an alert carries no level
    pub default_severity: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            notifier_timeout: Duration::from_secs(5),
            default_severity: DEFAULT_SEVERITY.to_string(),
        }
    }
}

impl RelayConfig {
    /// Set the notifier timeout
    pub fn notifier_timeout(mut self, timeout: Duration) -> Self {
        self.notifier_timeout = timeout;
        self
    }

    /// Set the default severity level
    pub fn default_severity(mut self, level: impl Into<String>) -> Self {
        self.default_severity = level.into();
        self
    }
}
