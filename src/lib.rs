//! # hotswap-plane
//!
//! Control-plane plumbing that follows configuration changes without restarts.
//!
//! ## Overview
//!
//! `hotswap-plane` bundles two pieces a proxy control plane keeps next to its
//! configuration:
//! - A metrics endpoint ([`metrics::MetricsEndpoint`]) that rebuilds its
//!   exposition handler whenever the bind address, basic-auth credential or
//!   installation id change, and serves each request from an atomic snapshot
//! - A storage configuration builder ([`storage::ServerConfig`]) assembled
//!   from defaults plus an ordered list of options
//!
//! Configuration comes from a [`core::HotswapSource`]: layered files and
//! environment variables merged into an immutable [`core::Config`] snapshot,
//! swapped atomically on reload and pushed to subscribers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hotswap_plane::prelude::*;
//! use std::sync::Arc;
//!
//! # fn example() -> hotswap_plane::error::Result<()> {
//! let source = Arc::new(
//!     HotswapSource::builder()
//!         .with_file("config/default.yaml")
//!         .with_env_overrides("PLANE", "__")
//!         .build()?,
//! );
//!
//! let endpoint = MetricsEndpoint::new(&*source, EndpointSettings::new(Metrics::new()?));
//! let app = endpoint.router();
//!
//! let storage = ServerConfig::new(server_options(&source.get()));
//! println!("storage backend: {}", storage.storage_type());
//! # let _ = app;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): reload a source when its files change
//! - `validation` (default): reject snapshots that fail [`core::Validate`]

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod sources;
pub mod storage;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{Config, ConfigSource, HotswapSource, HotswapSourceBuilder};
    pub use crate::error::{ConfigError, Result, ValidationError};
    pub use crate::metrics::{EndpointSettings, Metrics, MetricsEndpoint};
    pub use crate::storage::{ServerConfig, ServerOption, StorageType, server_options};

    #[cfg(feature = "validation")]
    pub use crate::core::Validate;
}
