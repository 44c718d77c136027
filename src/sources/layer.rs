//! Configuration layer trait.

use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;

/// A single layer of configuration values.
///
/// Layers are merged by [`ConfigLoader`](crate::core::ConfigLoader) in priority
/// order before the result is deserialized into a
/// [`Config`](crate::core::Config).
pub trait ConfigLayer: Send + Sync {
    /// Load the layer as a raw key-value map.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer cannot be read or parsed.
    fn load(&self) -> Result<HashMap<String, config::Value>>;

    /// Human-readable name for logging.
    fn name(&self) -> String;

    /// Priority of this layer (higher = takes precedence).
    ///
    /// Default priorities:
    /// - Environment variables: 300
    /// - Files: 100, 110, 120, ... in the order they were added
    fn priority(&self) -> i32 {
        100
    }

    /// Path backing this layer, if any. Watched for changes when file
    /// watching is enabled.
    fn path(&self) -> Option<&Path> {
        None
    }
}
