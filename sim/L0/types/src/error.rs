//! Error types for configuration validation.

use thiserror::Error;

/// Errors raised by [`SimConfig::validate`](crate::SimConfig::validate).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The micro-timestep is not finite or not positive.
    #[error("invalid physics timestep: {0}")]
    InvalidTimestep(f64),

    /// The simulation speed multiplier is not finite or not positive.
    #[error("invalid simulation speed: {0}")]
    InvalidSpeed(f64),

    /// Any other inconsistent setting.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create an invalid configuration error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            ConfigError::InvalidTimestep(-1.0).to_string(),
            "invalid physics timestep: -1"
        );
        assert_eq!(
            ConfigError::invalid("pool empty").to_string(),
            "invalid configuration: pool empty"
        );
    }
}
