//! Environment variable configuration layer.

use super::ConfigLayer;
use crate::error::{ConfigError, Result};
use config::Environment;
use std::collections::HashMap;

/// Configuration layer read from prefixed environment variables.
///
/// # Examples
///
/// ```rust
/// use hotswap_plane::sources::EnvLayer;
///
/// // PLANE_METRICS_ADDRESS=:9090 -> metrics_address
/// // PLANE_DATABROKER__STORAGE_TYPE=postgres -> databroker.storage_type
/// let layer = EnvLayer::new("PLANE", "__");
/// ```
pub struct EnvLayer {
    prefix: String,
    separator: String,
    priority: i32,
}

impl EnvLayer {
    /// Create a new environment layer.
    ///
    /// * `prefix` - Prefix for environment variables (e.g., "PLANE")
    /// * `separator` - Separator for nested keys (e.g., "__")
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            priority: 300,
        }
    }

    /// Set the priority for this layer.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl ConfigLayer for EnvLayer {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        // Values stay strings; serde converts booleans and numbers on the
        // typed fields, and ids like "0042" keep their leading zeros.
        let env_source = Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(&self.separator);

        let parsed = config::Config::builder()
            .add_source(env_source)
            .build()
            .map_err(|e| {
                ConfigError::LoadError(format!("Failed to load environment variables: {}", e))
            })?;

        parsed
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| {
                ConfigError::DeserializationError(format!(
                    "Failed to parse environment variables: {}",
                    e
                ))
            })
    }

    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
