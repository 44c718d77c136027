//! File watching for automatic configuration reloads.

use crate::core::HotswapSource;
use crate::error::{ConfigError, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Watches the files behind a [`HotswapSource`] and reloads it on change.
///
/// Events are debounced: after the first change the watcher waits for
/// `debounce`, drains everything that arrived meanwhile and reloads once.
/// A failed reload is logged and the previous snapshot stays active.
///
/// Dropping the watcher stops watching.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_plane::core::HotswapSource;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> hotswap_plane::error::Result<()> {
/// let source = Arc::new(
///     HotswapSource::builder()
///         .with_file("/etc/plane/config.yaml")
///         .build()?,
/// );
/// let _watcher = source.watch_files(Duration::from_millis(500))?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigWatcher {
    watcher: Mutex<RecommendedWatcher>,
    debounce_duration: Duration,
    watched_paths: Mutex<Vec<PathBuf>>,
}

impl ConfigWatcher {
    /// Start watching every file layer of `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a tokio runtime, if the underlying
    /// watcher cannot be created, or if a path cannot be watched.
    pub fn spawn(source: Arc<HotswapSource>, debounce: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ConfigError::WatchError(format!("No tokio runtime: {}", e)))?;

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<()>();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Modify(_) | notify::EventKind::Create(_)
                ) {
                    let _ = event_tx.send(());
                }
            }
        })
        .map_err(|e| ConfigError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        let this = Self {
            watcher: Mutex::new(watcher),
            debounce_duration: debounce,
            watched_paths: Mutex::new(Vec::new()),
        };
        for path in source.watch_paths() {
            this.watch(path)?;
        }

        runtime.spawn(async move {
            while event_rx.recv().await.is_some() {
                tokio::time::sleep(debounce).await;
                while event_rx.try_recv().is_ok() {}

                let source = Arc::clone(&source);
                match tokio::task::spawn_blocking(move || source.reload()).await {
                    Ok(Ok(())) => tracing::debug!("config: reloaded after file change"),
                    Ok(Err(err)) => {
                        tracing::warn!(error = %err, "config: reload after file change failed")
                    }
                    Err(err) => tracing::error!(error = %err, "config: reload task panicked"),
                }
            }
        });

        Ok(this)
    }

    /// Add a path to watch.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be resolved or watched.
    pub fn watch(&self, path: impl AsRef<Path>) -> Result<()> {
        let canonical_path = path
            .as_ref()
            .canonicalize()
            .map_err(|e| ConfigError::WatchError(format!("Failed to resolve path: {}", e)))?;

        self.watcher
            .lock()
            .watch(&canonical_path, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::WatchError(format!("Failed to watch path: {}", e)))?;

        let mut paths = self.watched_paths.lock();
        if !paths.contains(&canonical_path) {
            paths.push(canonical_path);
        }

        Ok(())
    }

    /// Get the debounce duration for this watcher.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce_duration
    }

    /// Get a list of currently watched paths.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched_paths.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn source_for(path: &Path) -> Arc<HotswapSource> {
        Arc::new(HotswapSource::builder().with_file(path).build().unwrap())
    }

    #[tokio::test]
    async fn test_watch_file_layers() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "installation_id: one").unwrap();

        let watcher =
            ConfigWatcher::spawn(source_for(&config_path), Duration::from_millis(100)).unwrap();
        assert_eq!(watcher.watched_paths().len(), 1);
        assert_eq!(watcher.debounce_duration(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_watch_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "installation_id: one").unwrap();

        let watcher =
            ConfigWatcher::spawn(source_for(&config_path), Duration::from_millis(100)).unwrap();
        assert!(watcher.watch("/nonexistent/config.yaml").is_err());
    }

    #[test]
    fn test_spawn_requires_runtime() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "installation_id: one").unwrap();

        let result = ConfigWatcher::spawn(source_for(&config_path), Duration::from_millis(100));
        assert!(matches!(result, Err(ConfigError::WatchError(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_change_triggers_reload() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "installation_id: one").unwrap();

        let source = source_for(&config_path);
        let _watcher =
            ConfigWatcher::spawn(Arc::clone(&source), Duration::from_millis(50)).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        fs::write(&config_path, "installation_id: two").unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while source.get().installation_id != "two" {
            assert!(tokio::time::Instant::now() < deadline, "reload never observed");
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}
