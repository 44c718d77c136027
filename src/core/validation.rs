//! Configuration validation support.

use crate::error::ValidationError;

/// Trait for configuration validation.
///
/// [`HotswapSource`](crate::core::HotswapSource) runs it on every new
/// snapshot before publishing; a failing snapshot is rejected and the
/// previous one stays active. [`Config`](crate::core::Config) implements it
/// by checking the metrics address and basic-auth credential.
///
/// # Examples
///
/// ```rust
/// use hotswap_plane::core::{Config, Validate};
///
/// let cfg = Config {
///     metrics_address: "no-port".to_string(),
///     ..Config::default()
/// };
/// assert!(cfg.validate().is_err());
/// ```
pub trait Validate {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Should return a `ValidationError` describing what validation failed.
    fn validate(&self) -> Result<(), ValidationError>;
}
