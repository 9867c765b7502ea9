//! Registry configuration

use crate::session::Role;

/// Default identity prefix reserved for monitor sessions
pub const DEFAULT_MONITOR_PREFIX: &str = "ADMIN";

/// Session registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Identities starting with this prefix declare as monitors
    pub monitor_prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            monitor_prefix: DEFAULT_MONITOR_PREFIX.to_string(),
        }
    }
}

impl RegistryConfig {
    /// Set the monitor identity prefix
    pub fn monitor_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.monitor_prefix = prefix.into();
        self
    }

    /// Role an identity declares as
    pub fn role_for(&self, identity: &str) -> Role {
        if !self.monitor_prefix.is_empty() && identity.starts_with(&self.monitor_prefix) {
            Role::Monitor
        } else {
            Role::Regular
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefix() {
        let config = RegistryConfig::default();
        assert_eq!(config.role_for("ADMIN"), Role::Monitor);
        assert_eq!(config.role_for("ADMIN_123"), Role::Monitor);
        assert_eq!(config.role_for("Alice"), Role::Regular);
        assert_eq!(config.role_for("admin"), Role::Regular);
    }

    #[test]
    fn test_custom_prefix() {
        let config = RegistryConfig::default().monitor_prefix("OPS-");
        assert_eq!(config.role_for("OPS-1"), Role::Monitor);
        assert_eq!(config.role_for("ADMIN_1"), Role::Regular);
    }

    #[test]
    fn test_empty_prefix_disables_monitors() {
        let config = RegistryConfig::default().monitor_prefix("");
        assert_eq!(config.role_for("ADMIN_1"), Role::Regular);
    }
}
