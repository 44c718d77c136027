//! Configuration change notification.
//!
//! Provides synchronous subscriber notifications and, with the `file-watch`
//! feature, file watching that reloads a [`HotswapSource`](crate::core::HotswapSource).

pub mod subscriber;
#[cfg(feature = "file-watch")]
pub mod watcher;

pub use subscriber::{ChangeListener, SubscriberRegistry, SubscriptionHandle};
#[cfg(feature = "file-watch")]
pub use watcher::ConfigWatcher;
