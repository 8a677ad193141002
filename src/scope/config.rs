//! Scope configuration

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_CLOSE_SPIN_LIMIT, DEFAULT_CLOSE_YIELD_LIMIT};

/// Upper bound on either retry limit; a close must never turn into an unbounded wait
pub const MAX_CLOSE_RETRIES: u32 = 1 << 20;

/// Tuning for a single scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Optional label carried into log events
    pub label: Option<String>,
    /// Busy-spin attempts a shared close makes while forks drain
    pub close_spin_limit: u32,
    /// `yield_now` attempts made after spinning, before giving up
    pub close_yield_limit: u32,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            label: None,
            close_spin_limit: DEFAULT_CLOSE_SPIN_LIMIT,
            close_yield_limit: DEFAULT_CLOSE_YIELD_LIMIT,
        }
    }
}

impl ScopeConfig {
    /// Create a labelled configuration
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the spin limit
    pub fn with_close_spin_limit(mut self, limit: u32) -> Self {
        self.close_spin_limit = limit;
        self
    }

    /// Set the yield limit
    pub fn with_close_yield_limit(mut self, limit: u32) -> Self {
        self.close_yield_limit = limit;
        self
    }

    /// Close fails as soon as it sees a fork
    pub fn fail_fast(mut self) -> Self {
        self.close_spin_limit = 0;
        self.close_yield_limit = 0;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        use crate::error::MemScopeError;

        if matches!(&self.label, Some(label) if label.is_empty()) {
            return Err(MemScopeError::invalid_parameter(
                "label",
                "Scope label cannot be empty",
            ));
        }

        if self.close_spin_limit > MAX_CLOSE_RETRIES {
            return Err(MemScopeError::invalid_parameter(
                "close_spin_limit",
                format!("Spin limit cannot exceed {}", MAX_CLOSE_RETRIES),
            ));
        }

        if self.close_yield_limit > MAX_CLOSE_RETRIES {
            return Err(MemScopeError::invalid_parameter(
                "close_yield_limit",
                format!("Yield limit cannot exceed {}", MAX_CLOSE_RETRIES),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScopeConfig::default();
        assert!(config.label.is_none());
        assert_eq!(config.close_spin_limit, DEFAULT_CLOSE_SPIN_LIMIT);
        assert_eq!(config.close_yield_limit, DEFAULT_CLOSE_YIELD_LIMIT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ScopeConfig::new("io")
            .with_close_spin_limit(4)
            .with_close_yield_limit(2);
        assert_eq!(config.label.as_deref(), Some("io"));
        assert_eq!(config.close_spin_limit, 4);
        assert_eq!(config.close_yield_limit, 2);

        let config = config.fail_fast();
        assert_eq!(config.close_spin_limit, 0);
        assert_eq!(config.close_yield_limit, 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(ScopeConfig::default().with_label("").validate().is_err());
        assert!(ScopeConfig::default()
            .with_close_spin_limit(MAX_CLOSE_RETRIES + 1)
            .validate()
            .is_err());
        assert!(ScopeConfig::default()
            .with_close_yield_limit(MAX_CLOSE_RETRIES + 1)
            .validate()
            .is_err());
    }
}
