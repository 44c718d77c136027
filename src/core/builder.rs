//! Builder for constructing HotswapSource instances.

use crate::core::source::{Validator, validate};
use crate::core::{Config, ConfigLoader, HotswapSource};
use crate::error::{Result, ValidationError};
use crate::sources::{ConfigLayer, EnvLayer, FileLayer};
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for a [`HotswapSource`] loaded from layered files and
/// environment variables.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_plane::core::HotswapSource;
///
/// # fn example() -> hotswap_plane::error::Result<()> {
/// let source = HotswapSource::builder()
///     .with_file("config/default.yaml")
///     .with_file("config/production.yaml")
///     .with_env_overrides("PLANE", "__")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct HotswapSourceBuilder {
    file_paths: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_separator: Option<String>,
    custom_layers: Vec<Box<dyn ConfigLayer>>,
    validator: Option<Validator>,
}

impl HotswapSourceBuilder {
    /// Create a new builder with no layers.
    pub fn new() -> Self {
        Self {
            file_paths: Vec::new(),
            env_prefix: None,
            env_separator: None,
            custom_layers: Vec::new(),
            validator: None,
        }
    }

    /// Add a file layer. Supported formats: YAML (.yaml, .yml), TOML (.toml),
    /// JSON (.json).
    ///
    /// Later files take precedence over earlier ones.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    /// Add an environment layer with the given prefix and nesting separator.
    ///
    /// Environment variables take precedence over files.
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.env_separator = Some(separator.to_string());
        self
    }

    /// Add a custom configuration layer.
    pub fn with_layer<L: ConfigLayer + 'static>(mut self, layer: L) -> Self {
        self.custom_layers.push(Box::new(layer));
        self
    }

    /// Add a validation function run on the initial load and on every
    /// subsequent reload or update.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use hotswap_plane::core::{Config, HotswapSource};
    /// use hotswap_plane::error::ValidationError;
    ///
    /// # fn example() -> hotswap_plane::error::Result<()> {
    /// let source = HotswapSource::builder()
    ///     .with_file("config.yaml")
    ///     .with_validation(|cfg: &Config| {
    ///         if cfg.installation_id.is_empty() {
    ///             return Err(ValidationError::invalid_field("installation_id", "required"));
    ///         }
    ///         Ok(())
    ///     })
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_validation<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Config) -> std::result::Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Perform the initial load and build the source.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No layers were configured
    /// - Initial configuration load fails
    /// - Deserialization fails
    /// - Validation fails
    pub fn build(self) -> Result<HotswapSource> {
        let mut loader = ConfigLoader::new();

        for (index, path) in self.file_paths.iter().enumerate() {
            let priority = 100 + (index as i32 * 10); // 100, 110, 120, etc.
            loader.add_layer(Box::new(FileLayer::new(path).with_priority(priority)));
        }

        for layer in self.custom_layers {
            loader.add_layer(layer);
        }

        if let (Some(prefix), Some(separator)) = (self.env_prefix, self.env_separator) {
            loader.add_layer(Box::new(EnvLayer::new(prefix, separator)));
        }

        let config = loader.load()?;
        validate(&config, self.validator.as_ref())?;

        tracing::debug!(layers = ?loader.layer_names(), "config: initial load complete");
        Ok(HotswapSource::with_loader(config, loader, self.validator))
    }
}

impl Default for HotswapSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HotswapSource {
    /// Create a new builder for constructing a source.
    pub fn builder() -> HotswapSourceBuilder {
        HotswapSourceBuilder::new()
    }
}
