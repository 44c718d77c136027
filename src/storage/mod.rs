//! Storage configuration for the databroker.
//!
//! A [`ServerConfig`] is assembled once from defaults plus an ordered list of
//! [`ServerOption`]s and then shared read-only with the storage factory, the
//! retention sweeper and paginated enumeration. Later setting changes build
//! a new value instead of mutating an existing one.

mod options;
mod secret;
mod types;

pub use options::{
    DEFAULT_DELETE_PERMANENTLY_AFTER, DEFAULT_GET_ALL_PAGE_SIZE, DEFAULT_STORAGE_TYPE,
    ServerConfig, ServerConfigBuilder, ServerOption, server_options,
};
pub use secret::{SHARED_KEY_SIZE, SharedKey};
pub use types::{ClientCertificate, StorageType};
