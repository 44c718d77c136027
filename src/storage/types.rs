use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ConfigError;

/// Backend selected by the storage factory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Process-local in-memory store.
    #[default]
    Memory,
    /// External PostgreSQL database.
    Postgres,
}

impl StorageType {
    /// The identifier used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::Other(format!("unknown storage type: {}", other))),
        }
    }
}

/// Client certificate presented to the storage backend.
///
/// The private key is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    chain_pem: Arc<[u8]>,
    key_pem: Arc<[u8]>,
}

impl ClientCertificate {
    /// Create a certificate from a PEM-encoded chain and private key.
    pub fn from_pem(chain_pem: impl Into<Vec<u8>>, key_pem: impl Into<Vec<u8>>) -> Self {
        Self {
            chain_pem: chain_pem.into().into(),
            key_pem: key_pem.into().into(),
        }
    }

    /// PEM-encoded certificate chain.
    pub fn chain_pem(&self) -> &[u8] {
        &self.chain_pem
    }

    /// PEM-encoded private key.
    pub fn key_pem(&self) -> &[u8] {
        &self.key_pem
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("chain_pem_len", &self.chain_pem.len())
            .field("key_pem", &"<redacted>")
            .finish()
    }
}
