//! Error types for hotswap-plane.

use std::fmt;

/// Result type alias for hotswap-plane operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading configuration or building derived state.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to load configuration from a layer.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// Failed to deserialize configuration.
    #[error("Failed to deserialize configuration: {0}")]
    DeserializationError(String),

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// File watching failed to initialize.
    #[error("File watching error: {0}")]
    WatchError(String),

    /// The metrics basic-auth credential is not of the form `user:password`.
    #[error("Invalid metrics basic auth: {0}")]
    InvalidBasicAuth(String),

    /// An exposition handler could not be constructed.
    #[error("Failed to create metrics handler: {0}")]
    HandlerError(String),

    /// A Prometheus collector could not be created or registered.
    #[error("Metrics registry error: {0}")]
    MetricsError(#[from] prometheus::Error),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

/// Reasons a base64 shared key is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SharedKeyError {
    /// The value is not valid standard base64.
    #[error("shared key is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The decoded value has the wrong length.
    #[error("shared key must be {expected} bytes long, got {actual}")]
    Length {
        /// Required key size in bytes
        expected: usize,
        /// Size of the decoded value
        actual: usize,
    },
}

/// Validation error for configuration validation.
#[derive(Debug)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// A specific field has an invalid value.
    InvalidField {
        /// The field name/path
        field: String,
        /// The reason why it's invalid
        reason: String,
    },

    /// Multiple validation errors occurred.
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{}", msg),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple validation errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        ConfigError::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::Multiple(vec![
            ValidationError::invalid_field("metrics_address", "missing port"),
            ValidationError::custom("bad"),
        ]);
        let text = err.to_string();
        assert!(text.contains("1. Field 'metrics_address' is invalid: missing port"));
        assert!(text.contains("2. bad"));
    }

    #[test]
    fn test_shared_key_length_display() {
        let err = SharedKeyError::Length {
            expected: 32,
            actual: 4,
        };
        assert_eq!(err.to_string(), "shared key must be 32 bytes long, got 4");
    }
}
