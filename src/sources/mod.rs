//! Configuration layers merged into a [`Config`](crate::core::Config) snapshot.

mod env;
mod file;
mod layer;

pub use env::EnvLayer;
pub use file::FileLayer;
pub use layer::ConfigLayer;
