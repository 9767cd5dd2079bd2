//! Service configuration.

use serde::{Deserialize, Serialize};

/// Tunables of one [`crate::SecretService`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Maximum number of live authenticated sessions.
    pub max_sessions: usize,

    /// Validity window applied when a pre-query does not supply one, in
    /// seconds.
    pub default_auth_validity_secs: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { max_sessions: 16, default_auth_validity_secs: 60 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = ServiceConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: ServiceConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.max_sessions, config.max_sessions);
        assert_eq!(deserialized.default_auth_validity_secs, config.default_auth_validity_secs);
    }
}
