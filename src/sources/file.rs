//! File-backed configuration layer.

use super::ConfigLayer;
use crate::error::{ConfigError, Result};
use config::File;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Configuration layer read from a YAML, TOML or JSON file.
///
/// The format is detected from the file extension.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_plane::sources::FileLayer;
///
/// let layer = FileLayer::new("/etc/plane/config.yaml");
/// ```
pub struct FileLayer {
    path: PathBuf,
    priority: i32,
}

impl FileLayer {
    /// Create a new file layer with the default priority.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            priority: 100,
        }
    }

    /// Set the priority for this layer.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn validate_extension(&self) -> Result<()> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ConfigError::LoadError(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })?;

        match extension {
            "yaml" | "yml" | "toml" | "json" => Ok(()),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                extension
            ))),
        }
    }
}

impl ConfigLayer for FileLayer {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        self.validate_extension()?;

        if !self.path.exists() {
            return Err(ConfigError::LoadError(format!(
                "Configuration file not found: {}",
                self.path.display()
            )));
        }

        let parsed = config::Config::builder()
            .add_source(File::from(self.path.clone()).required(true))
            .build()
            .map_err(|e| ConfigError::LoadError(format!("Failed to load file: {}", e)))?;

        parsed
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| ConfigError::DeserializationError(format!("Failed to parse file: {}", e)))
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
