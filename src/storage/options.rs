use crate::core::Config;
use crate::error::SharedKeyError;
use crate::storage::{ClientCertificate, SharedKey, StorageType};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Default time a soft-deleted record is kept before permanent deletion.
pub const DEFAULT_DELETE_PERMANENTLY_AFTER: Duration = Duration::from_secs(60 * 60);
/// Default storage backend.
pub const DEFAULT_STORAGE_TYPE: StorageType = StorageType::Memory;
/// Default page size for enumeration.
pub const DEFAULT_GET_ALL_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(50) {
    Some(size) => size,
    None => unreachable!(),
};

/// Immutable storage configuration.
///
/// Built from defaults plus an ordered list of options; later options for the
/// same field replace earlier ones.
///
/// # Examples
///
/// ```rust
/// use hotswap_plane::storage::{ServerConfig, ServerOption, StorageType};
///
/// let cfg = ServerConfig::new([
///     ServerOption::StorageType(StorageType::Postgres),
///     ServerOption::StorageConnectionString("postgres://db/broker".to_string()),
/// ]);
/// assert_eq!(cfg.storage_type(), StorageType::Postgres);
/// assert_eq!(cfg.get_all_page_size().get(), 50);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    installation_id: String,
    delete_permanently_after: Duration,
    secret: Option<SharedKey>,
    storage_type: StorageType,
    storage_connection_string: String,
    storage_ca_file: Option<PathBuf>,
    storage_cert_skip_verify: bool,
    storage_certificate: Option<ClientCertificate>,
    get_all_page_size: NonZeroUsize,
    rejections: Vec<SharedKeyError>,
}

/// A single setting applied to a [`ServerConfig`] during construction.
#[derive(Debug, Clone)]
pub enum ServerOption {
    /// Installation identifier.
    InstallationId(String),
    /// How long a deleted record is kept before it is permanently erased.
    DeletePermanentlyAfter(Duration),
    /// Base64-encoded shared secret. Rejected, keeping the previous secret,
    /// unless it decodes to exactly 32 bytes.
    SharedKey(String),
    /// Storage backend.
    StorageType(StorageType),
    /// Backend connection string (DSN).
    StorageConnectionString(String),
    /// CA bundle used to verify the backend.
    StorageCaFile(PathBuf),
    /// Skip backend certificate verification.
    StorageCertSkipVerify(bool),
    /// Client certificate presented to the backend.
    StorageCertificate(ClientCertificate),
    /// Default page size for enumeration.
    GetAllPageSize(NonZeroUsize),
}

impl ServerOption {
    fn apply(self, cfg: &mut ServerConfig) {
        match self {
            Self::InstallationId(id) => cfg.installation_id = id,
            Self::DeletePermanentlyAfter(dur) => cfg.delete_permanently_after = dur,
            Self::SharedKey(encoded) => match SharedKey::from_base64(&encoded) {
                Ok(key) => cfg.secret = Some(key),
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        "databroker: invalid shared key, keeping the previous value"
                    );
                    cfg.rejections.push(err);
                }
            },
            Self::StorageType(typ) => cfg.storage_type = typ,
            Self::StorageConnectionString(conn) => cfg.storage_connection_string = conn,
            Self::StorageCaFile(path) => cfg.storage_ca_file = Some(path),
            Self::StorageCertSkipVerify(skip) => cfg.storage_cert_skip_verify = skip,
            Self::StorageCertificate(cert) => cfg.storage_certificate = Some(cert),
            Self::GetAllPageSize(size) => cfg.get_all_page_size = size,
        }
    }
}

impl ServerConfig {
    /// Apply `options` in order over the defaults.
    pub fn new(options: impl IntoIterator<Item = ServerOption>) -> Self {
        let mut cfg = Self::default();
        for option in options {
            option.apply(&mut cfg);
        }
        cfg
    }

    /// Create a fluent builder.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Installation identifier.
    pub fn installation_id(&self) -> &str {
        &self.installation_id
    }

    /// Retention of soft-deleted records before permanent erasure.
    pub fn delete_permanently_after(&self) -> Duration {
        self.delete_permanently_after
    }

    /// The shared secret, if a valid one was supplied.
    pub fn secret(&self) -> Option<&SharedKey> {
        self.secret.as_ref()
    }

    /// Selected storage backend.
    pub fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    /// Backend connection string.
    pub fn storage_connection_string(&self) -> &str {
        &self.storage_connection_string
    }

    /// CA bundle used to verify the backend.
    pub fn storage_ca_file(&self) -> Option<&PathBuf> {
        self.storage_ca_file.as_ref()
    }

    /// Whether backend certificate verification is skipped.
    pub fn storage_cert_skip_verify(&self) -> bool {
        self.storage_cert_skip_verify
    }

    /// Client certificate presented to the backend.
    pub fn storage_certificate(&self) -> Option<&ClientCertificate> {
        self.storage_certificate.as_ref()
    }

    /// Default page size for enumeration.
    pub fn get_all_page_size(&self) -> NonZeroUsize {
        self.get_all_page_size
    }

    /// Shared keys that were rejected during construction, in order.
    ///
    /// A rejected key leaves the secret at its previous value, which may be
    /// unset. Callers that require a secret should check both this and
    /// [`secret`](Self::secret).
    pub fn rejections(&self) -> &[SharedKeyError] {
        &self.rejections
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            installation_id: String::new(),
            delete_permanently_after: DEFAULT_DELETE_PERMANENTLY_AFTER,
            secret: None,
            storage_type: DEFAULT_STORAGE_TYPE,
            storage_connection_string: String::new(),
            storage_ca_file: None,
            storage_cert_skip_verify: false,
            storage_certificate: None,
            get_all_page_size: DEFAULT_GET_ALL_PAGE_SIZE,
            rejections: Vec::new(),
        }
    }
}

/// Fluent builder for [`ServerConfig`].
///
/// Each call records one option; [`build`](Self::build) applies them in call
/// order.
///
/// ```rust
/// use hotswap_plane::storage::ServerConfig;
/// use std::time::Duration;
///
/// let cfg = ServerConfig::builder()
///     .with_installation_id("install-1")
///     .with_delete_permanently_after(Duration::from_secs(600))
///     .build();
/// assert_eq!(cfg.installation_id(), "install-1");
/// assert!(cfg.secret().is_none());
/// ```
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    options: Vec<ServerOption>,
}

impl ServerConfigBuilder {
    /// Record an arbitrary option.
    pub fn with_option(mut self, option: ServerOption) -> Self {
        self.options.push(option);
        self
    }

    /// Set the installation identifier.
    pub fn with_installation_id(self, id: impl Into<String>) -> Self {
        self.with_option(ServerOption::InstallationId(id.into()))
    }

    /// Set the retention of soft-deleted records.
    pub fn with_delete_permanently_after(self, dur: Duration) -> Self {
        self.with_option(ServerOption::DeletePermanentlyAfter(dur))
    }

    /// Set the shared secret from standard base64.
    pub fn with_shared_key(self, encoded: impl Into<String>) -> Self {
        self.with_option(ServerOption::SharedKey(encoded.into()))
    }

    /// Set the storage backend.
    pub fn with_storage_type(self, typ: StorageType) -> Self {
        self.with_option(ServerOption::StorageType(typ))
    }

    /// Set the backend connection string.
    pub fn with_storage_connection_string(self, conn: impl Into<String>) -> Self {
        self.with_option(ServerOption::StorageConnectionString(conn.into()))
    }

    /// Set the CA bundle path.
    pub fn with_storage_ca_file(self, path: impl Into<PathBuf>) -> Self {
        self.with_option(ServerOption::StorageCaFile(path.into()))
    }

    /// Skip backend certificate verification.
    pub fn with_storage_cert_skip_verify(self, skip: bool) -> Self {
        self.with_option(ServerOption::StorageCertSkipVerify(skip))
    }

    /// Set the client certificate.
    pub fn with_storage_certificate(self, cert: ClientCertificate) -> Self {
        self.with_option(ServerOption::StorageCertificate(cert))
    }

    /// Set the default enumeration page size.
    pub fn with_get_all_page_size(self, size: NonZeroUsize) -> Self {
        self.with_option(ServerOption::GetAllPageSize(size))
    }

    /// Apply the recorded options over the defaults.
    pub fn build(self) -> ServerConfig {
        ServerConfig::new(self.options)
    }
}

/// Derive storage options from a configuration snapshot.
///
/// Empty fields are skipped so the defaults apply.
pub fn server_options(cfg: &Config) -> Vec<ServerOption> {
    let storage = &cfg.databroker;
    let mut options = vec![
        ServerOption::InstallationId(cfg.installation_id.clone()),
        ServerOption::StorageType(storage.storage_type),
        ServerOption::StorageCertSkipVerify(storage.cert_skip_verify),
    ];

    if !storage.connection_string.is_empty() {
        options.push(ServerOption::StorageConnectionString(
            storage.connection_string.clone(),
        ));
    }
    if !storage.ca_file.is_empty() {
        options.push(ServerOption::StorageCaFile(PathBuf::from(&storage.ca_file)));
    }
    if !storage.shared_secret.is_empty() {
        options.push(ServerOption::SharedKey(storage.shared_secret.clone()));
    }
    if let Some(secs) = storage.delete_permanently_after {
        options.push(ServerOption::DeletePermanentlyAfter(Duration::from_secs(secs)));
    }
    if let Some(size) = storage.get_all_page_size {
        options.push(ServerOption::GetAllPageSize(size));
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StorageSettings;
    use crate::storage::SHARED_KEY_SIZE;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use proptest::prelude::*;

    fn encoded_key(byte: u8) -> String {
        STANDARD.encode([byte; SHARED_KEY_SIZE])
    }

    #[test]
    fn test_defaults() {
        let cfg = ServerConfig::new([]);
        assert_eq!(cfg.storage_type(), StorageType::Memory);
        assert_eq!(cfg.delete_permanently_after(), Duration::from_secs(3600));
        assert_eq!(cfg.get_all_page_size().get(), 50);
        assert!(cfg.secret().is_none());
        assert!(cfg.installation_id().is_empty());
        assert!(cfg.storage_ca_file().is_none());
        assert!(!cfg.storage_cert_skip_verify());
        assert!(cfg.storage_certificate().is_none());
        assert!(cfg.rejections().is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let cfg = ServerConfig::new([
            ServerOption::StorageType(StorageType::Postgres),
            ServerOption::InstallationId("first".to_string()),
            ServerOption::StorageType(StorageType::Memory),
            ServerOption::InstallationId("second".to_string()),
        ]);
        assert_eq!(cfg.storage_type(), StorageType::Memory);
        assert_eq!(cfg.installation_id(), "second");
    }

    #[test]
    fn test_invalid_key_keeps_previous() {
        let cfg = ServerConfig::builder()
            .with_shared_key(encoded_key(1))
            .with_shared_key("c2hvcnQ=")
            .with_shared_key("%%%")
            .build();

        assert_eq!(cfg.secret().unwrap().as_bytes(), &[1u8; SHARED_KEY_SIZE]);
        assert_eq!(cfg.rejections().len(), 2);
        assert!(matches!(
            cfg.rejections()[0],
            SharedKeyError::Length { expected: 32, actual: 5 }
        ));
        assert!(matches!(cfg.rejections()[1], SharedKeyError::Decode(_)));
    }

    #[test]
    fn test_invalid_key_does_not_abort_other_options() {
        let cfg = ServerConfig::builder()
            .with_shared_key("bogus")
            .with_storage_type(StorageType::Postgres)
            .with_storage_connection_string("postgres://db")
            .with_storage_ca_file("/etc/ca.pem")
            .with_storage_cert_skip_verify(true)
            .with_storage_certificate(ClientCertificate::from_pem(b"c".to_vec(), b"k".to_vec()))
            .with_get_all_page_size(NonZeroUsize::new(10).unwrap())
            .build();

        assert!(cfg.secret().is_none());
        assert_eq!(cfg.storage_type(), StorageType::Postgres);
        assert_eq!(cfg.storage_connection_string(), "postgres://db");
        assert_eq!(cfg.storage_ca_file(), Some(&PathBuf::from("/etc/ca.pem")));
        assert!(cfg.storage_cert_skip_verify());
        assert!(cfg.storage_certificate().is_some());
        assert_eq!(cfg.get_all_page_size().get(), 10);
    }

    #[test]
    fn test_server_options_from_config() {
        let cfg = Config {
            installation_id: "install-1".to_string(),
            databroker: StorageSettings {
                storage_type: StorageType::Postgres,
                connection_string: "postgres://db".to_string(),
                ca_file: "/etc/ca.pem".to_string(),
                cert_skip_verify: true,
                shared_secret: encoded_key(9),
                delete_permanently_after: Some(120),
                get_all_page_size: NonZeroUsize::new(25),
            },
            ..Config::default()
        };

        let server = ServerConfig::new(server_options(&cfg));
        assert_eq!(server.installation_id(), "install-1");
        assert_eq!(server.storage_type(), StorageType::Postgres);
        assert_eq!(server.storage_connection_string(), "postgres://db");
        assert_eq!(server.storage_ca_file(), Some(&PathBuf::from("/etc/ca.pem")));
        assert!(server.storage_cert_skip_verify());
        assert_eq!(server.secret().unwrap().as_bytes(), &[9u8; SHARED_KEY_SIZE]);
        assert_eq!(server.delete_permanently_after(), Duration::from_secs(120));
        assert_eq!(server.get_all_page_size().get(), 25);
    }

    #[test]
    fn test_server_options_from_empty_config() {
        let server = ServerConfig::new(server_options(&Config::default()));
        assert_eq!(server.storage_type(), DEFAULT_STORAGE_TYPE);
        assert_eq!(server.delete_permanently_after(), DEFAULT_DELETE_PERMANENTLY_AFTER);
        assert_eq!(server.get_all_page_size(), DEFAULT_GET_ALL_PAGE_SIZE);
        assert!(server.secret().is_none());
        assert!(server.rejections().is_empty());
    }

    proptest! {
        #[test]
        fn prop_exact_length_key_is_set(bytes in prop::array::uniform32(any::<u8>())) {
            let cfg = ServerConfig::builder()
                .with_shared_key(STANDARD.encode(bytes))
                .build();
            prop_assert_eq!(cfg.secret().map(|k| *k.as_bytes()), Some(bytes));
            prop_assert!(cfg.rejections().is_empty());
        }

        #[test]
        fn prop_wrong_length_key_keeps_previous(
            bytes in prop::collection::vec(any::<u8>(), 0..96)
                .prop_filter("not key sized", |b| b.len() != SHARED_KEY_SIZE),
            previous in prop::option::of(any::<u8>()),
        ) {
            let mut builder = ServerConfig::builder();
            if let Some(byte) = previous {
                builder = builder.with_shared_key(encoded_key(byte));
            }
            let cfg = builder.with_shared_key(STANDARD.encode(&bytes)).build();

            prop_assert_eq!(
                cfg.secret().map(|k| *k.as_bytes()),
                previous.map(|byte| [byte; SHARED_KEY_SIZE])
            );
            prop_assert_eq!(cfg.rejections().len(), 1);
        }

        #[test]
        fn prop_undecodable_key_keeps_previous(garbage in "[A-Za-z0-9+/]{0,40}[!@#$%^&*]") {
            let cfg = ServerConfig::builder()
                .with_shared_key(encoded_key(3))
                .with_shared_key(garbage)
                .build();
            prop_assert_eq!(cfg.secret().map(|k| *k.as_bytes()), Some([3u8; SHARED_KEY_SIZE]));
            prop_assert!(matches!(cfg.rejections()[0], SharedKeyError::Decode(_)));
        }
    }
}
