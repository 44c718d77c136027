//! Config sources: the observer contract and the hot-swappable implementation.

use crate::core::{Config, ConfigLoader};
use crate::error::{ConfigError, Result, ValidationError};
use crate::notify::{ChangeListener, SubscriberRegistry, SubscriptionHandle};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// Type alias for validator functions.
pub(crate) type Validator =
    Arc<dyn Fn(&Config) -> std::result::Result<(), ValidationError> + Send + Sync>;

/// Provider of the current configuration and of change notifications.
///
/// Listeners are invoked synchronously on the thread that publishes the
/// change, at most once per change, and never concurrently with themselves.
/// A listener must not publish to the same source from its callback; that
/// deadlocks.
pub trait ConfigSource: Send + Sync {
    /// The current configuration snapshot.
    fn get_config(&self) -> Arc<Config>;

    /// Register a listener for future changes.
    fn on_config_change(&self, listener: ChangeListener) -> SubscriptionHandle;
}

/// A config source backed by an atomically swapped snapshot.
///
/// Reads are lock-free. Publishing a new snapshot (through [`reload`] or
/// [`update`]) validates it, swaps it in and notifies every listener before
/// returning. Publishes are serialized, so listeners observe snapshots in the
/// order they were stored.
///
/// [`reload`]: HotswapSource::reload
/// [`update`]: HotswapSource::update
///
/// # Examples
///
/// ```rust
/// use hotswap_plane::core::{Config, HotswapSource};
///
/// let source = HotswapSource::new(Config::default());
/// let _handle = source.subscribe(|cfg: &Config| {
///     println!("new metrics address: {:?}", cfg.metrics_address);
/// });
///
/// source
///     .update(Config {
///         metrics_address: "127.0.0.1:9090".to_string(),
///         ..Config::default()
///     })
///     .unwrap();
/// assert_eq!(source.get().metrics_address, "127.0.0.1:9090");
/// ```
pub struct HotswapSource {
    current: ArcSwap<Config>,
    loader: Option<ConfigLoader>,
    validator: Option<Validator>,
    subscribers: SubscriberRegistry,
    publish: Mutex<()>,
}

impl HotswapSource {
    /// Create a source holding a fixed initial snapshot.
    ///
    /// The snapshot can later be replaced with [`update`](Self::update).
    pub fn new(initial: Config) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            loader: None,
            validator: None,
            subscribers: SubscriberRegistry::new(),
            publish: Mutex::new(()),
        }
    }

    pub(crate) fn with_loader(
        initial: Config,
        loader: ConfigLoader,
        validator: Option<Validator>,
    ) -> Self {
        Self {
            loader: Some(loader),
            validator,
            ..Self::new(initial)
        }
    }

    /// Get the current snapshot. Lock-free.
    pub fn get(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Re-read every layer and publish the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the source has no layers, a layer fails to load,
    /// or validation fails. The previous snapshot stays active.
    pub fn reload(&self) -> Result<()> {
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| ConfigError::Other("No loader available for reload".to_string()))?;

        self.publish(loader.load()?)
    }

    /// Publish a new snapshot directly.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails. The previous snapshot stays
    /// active.
    pub fn update(&self, new_config: Config) -> Result<()> {
        self.publish(new_config)
    }

    /// Subscribe a closure to configuration changes.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Config) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(Arc::new(callback))
    }

    /// Number of active listeners.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.subscriber_count()
    }

    /// Paths of the file layers behind this source.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        self.loader.as_ref().map(ConfigLoader::paths).unwrap_or_default()
    }

    /// Reload automatically whenever one of the file layers changes.
    ///
    /// Must be called from within a tokio runtime. Watching stops when the
    /// returned watcher is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot be started.
    #[cfg(feature = "file-watch")]
    pub fn watch_files(
        self: &Arc<Self>,
        debounce: std::time::Duration,
    ) -> Result<crate::notify::ConfigWatcher> {
        crate::notify::ConfigWatcher::spawn(Arc::clone(self), debounce)
    }

    fn publish(&self, new_config: Config) -> Result<()> {
        validate(&new_config, self.validator.as_ref())?;

        let _guard = self.publish.lock();
        let snapshot = Arc::new(new_config);
        self.current.store(Arc::clone(&snapshot));
        self.subscribers.notify_all(&snapshot);

        Ok(())
    }
}

impl ConfigSource for HotswapSource {
    fn get_config(&self) -> Arc<Config> {
        self.get()
    }

    fn on_config_change(&self, listener: ChangeListener) -> SubscriptionHandle {
        self.subscribers.subscribe(listener)
    }
}

pub(crate) fn validate(cfg: &Config, validator: Option<&Validator>) -> Result<()> {
    #[cfg(feature = "validation")]
    crate::core::Validate::validate(cfg)?;

    if let Some(validator) = validator {
        validator(cfg)?;
    }

    Ok(())
}
