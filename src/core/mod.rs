//! Configuration snapshot, layering and the hot-swappable config source.

mod builder;
mod config;
mod loader;
mod source;

#[cfg(feature = "validation")]
mod validation;

pub use builder::HotswapSourceBuilder;
pub use config::{ALL_SERVICES, Config, StorageSettings, service_name};
pub use loader::ConfigLoader;
pub use source::{ConfigSource, HotswapSource};

#[cfg(feature = "validation")]
pub use validation::Validate;
