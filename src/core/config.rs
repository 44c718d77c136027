//! The configuration snapshot consumed by the endpoint and the storage builder.

use crate::error::{ConfigError, Result};
use crate::storage::StorageType;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::num::NonZeroUsize;

/// Service list value that selects every service.
pub const ALL_SERVICES: &str = "all";

/// An immutable configuration snapshot.
///
/// Every field defaults to empty, so partial files and environment overrides
/// deserialize without error.
///
/// # Examples
///
/// ```rust
/// use hotswap_plane::core::Config;
///
/// let cfg = Config {
///     metrics_address: "127.0.0.1:9090".to_string(),
///     metrics_basic_auth: "alice:secret".to_string(),
///     ..Config::default()
/// };
/// assert_eq!(
///     cfg.metrics_basic_auth().unwrap(),
///     Some(("alice".to_string(), "secret".to_string()))
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Comma-separated list of services this process runs. Empty or `all`
    /// means every service.
    pub services: String,
    /// Address the metrics endpoint is served on. Empty disables serving.
    pub metrics_address: String,
    /// `user:password`, plain or base64-encoded. Empty disables auth.
    pub metrics_basic_auth: String,
    /// Identifier of this installation, attached to exported samples.
    pub installation_id: String,
    /// Storage settings for the databroker.
    pub databroker: StorageSettings,
}

/// Storage settings carried by a [`Config`] snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Backend selector.
    pub storage_type: StorageType,
    /// Backend connection string (DSN).
    pub connection_string: String,
    /// Path to a CA bundle used to verify the backend.
    pub ca_file: String,
    /// Skip backend certificate verification.
    pub cert_skip_verify: bool,
    /// Base64-encoded shared secret.
    pub shared_secret: String,
    /// Retention of soft-deleted records, in seconds.
    pub delete_permanently_after: Option<u64>,
    /// Default page size for enumeration.
    pub get_all_page_size: Option<NonZeroUsize>,
}

impl Config {
    /// Parse the metrics basic-auth credential.
    ///
    /// Returns `Ok(None)` when no credential is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBasicAuth`] if the value is neither
    /// `user:password` nor the base64 encoding of it.
    pub fn metrics_basic_auth(&self) -> Result<Option<(String, String)>> {
        parse_basic_auth(&self.metrics_basic_auth)
    }
}

/// Derive the service name reported in build info.
///
/// ```rust
/// use hotswap_plane::core::service_name;
///
/// assert_eq!(service_name("plane", ""), "plane");
/// assert_eq!(service_name("plane", "all"), "plane");
/// assert_eq!(service_name("plane", "proxy"), "plane-proxy");
/// ```
pub fn service_name(base: &str, services: &str) -> String {
    let services = services.trim();
    if services.is_empty() || services == ALL_SERVICES {
        base.to_string()
    } else {
        format!("{}-{}", base, services)
    }
}

pub(crate) fn parse_basic_auth(raw: &str) -> Result<Option<(String, String)>> {
    if raw.is_empty() {
        return Ok(None);
    }

    // Base64 never contains ':', so a colon means the plain form.
    let decoded = if raw.contains(':') {
        raw.to_string()
    } else {
        let bytes = STANDARD
            .decode(raw)
            .map_err(|e| ConfigError::InvalidBasicAuth(format!("not base64: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|_| ConfigError::InvalidBasicAuth("not valid UTF-8".to_string()))?
    };

    match decoded.split_once(':') {
        Some((user, password)) => Ok(Some((user.to_string(), password.to_string()))),
        None => Err(ConfigError::InvalidBasicAuth(
            "expected user:password".to_string(),
        )),
    }
}

#[cfg(feature = "validation")]
impl crate::core::Validate for Config {
    fn validate(&self) -> std::result::Result<(), crate::error::ValidationError> {
        use crate::error::ValidationError;

        let mut errors = Vec::new();

        if !self.metrics_address.is_empty() {
            let port = self
                .metrics_address
                .rsplit_once(':')
                .map(|(_, port)| port.parse::<u16>());
            if !matches!(port, Some(Ok(_))) {
                errors.push(ValidationError::invalid_field(
                    "metrics_address",
                    "must be of the form host:port",
                ));
            }
        }

        if let Err(e) = self.metrics_basic_auth() {
            errors.push(ValidationError::invalid_field(
                "metrics_basic_auth",
                e.to_string(),
            ));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}
