//! Registry configuration

/// What to do when an identity registers from a new connection while an
/// older connection still holds it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationPolicy {
    /// Overwrite the mapping and leave the older connection open
    #[default]
    Replace,
    /// Refuse the new registration while the older connection is live
    RejectWhileLive,
    /// Overwrite the mapping and ask the older connection to close
    EvictPrevious,
}

impl std::fmt::Display for RegistrationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RegistrationPolicy::Replace => "replace",
            RegistrationPolicy::RejectWhileLive => "reject-while-live",
            RegistrationPolicy::EvictPrevious => "evict-previous",
        };
        f.write_str(name)
    }
}

/// Configuration for the session registry and subscription table
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Policy applied when an identity re-registers
    pub registration_policy: RegistrationPolicy,
}

impl RegistryConfig {
    /// Set the re-registration policy
    pub fn registration_policy(mut self, policy: RegistrationPolicy) -> Self {
        self.registration_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_replaces() {
        let config = RegistryConfig::default();
        assert_eq!(config.registration_policy, RegistrationPolicy::Replace);
    }

    #[test]
    fn test_builder_policy() {
        let config = RegistryConfig::default().registration_policy(RegistrationPolicy::EvictPrevious);
        assert_eq!(config.registration_policy, RegistrationPolicy::EvictPrevious);
        assert_eq!(config.registration_policy.to_string(), "evict-previous");
    }
}
