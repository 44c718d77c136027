//! Subscriber-based notifications for configuration changes.

use crate::core::Config;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Callback invoked with each new configuration snapshot.
pub type ChangeListener = Arc<dyn Fn(&Config) + Send + Sync>;

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// Dropping the handle removes the subscription synchronously: no
/// notification issued after the drop returns reaches the listener.
#[must_use = "dropping the handle unsubscribes immediately"]
pub struct SubscriptionHandle {
    id: usize,
    registry: Weak<RwLock<SubscriberRegistryInner>>,
}

impl SubscriptionHandle {
    /// Remove the subscription. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let id = self.id;
            registry.write().subscribers.retain(|(sub_id, _)| *sub_id != id);
        }
    }
}

struct SubscriberRegistryInner {
    subscribers: Vec<(usize, ChangeListener)>,
    next_id: usize,
}

/// Registry for configuration change listeners.
///
/// # Examples
///
/// ```rust
/// use hotswap_plane::core::Config;
/// use hotswap_plane::notify::SubscriberRegistry;
/// use std::sync::Arc;
///
/// let registry = SubscriberRegistry::new();
/// let handle = registry.subscribe(Arc::new(|cfg: &Config| {
///     println!("metrics address is now {:?}", cfg.metrics_address);
/// }));
///
/// registry.notify_all(&Config::default());
/// drop(handle);
/// ```
pub struct SubscriberRegistry {
    inner: Arc<RwLock<SubscriberRegistryInner>>,
}

impl SubscriberRegistry {
    /// Create a new subscriber registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SubscriberRegistryInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a listener. Returns a handle that unsubscribes when dropped.
    pub fn subscribe(&self, listener: ChangeListener) -> SubscriptionHandle {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, listener));

        SubscriptionHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke every listener, in subscription order, on the calling thread.
    ///
    /// The listener list is copied before invoking, so a listener may
    /// subscribe or unsubscribe without deadlocking.
    pub fn notify_all(&self, cfg: &Config) {
        let listeners: Vec<ChangeListener> = self
            .inner
            .read()
            .subscribers
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(cfg);
        }
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SubscriberRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
