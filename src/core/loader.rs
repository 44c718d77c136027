//! Configuration loader that merges multiple layers.

use crate::core::Config;
use crate::error::{ConfigError, Result};
use crate::sources::ConfigLayer;
use std::path::PathBuf;

/// Loads and merges configuration from multiple layers.
///
/// Layers are merged in priority order (lower priority first, higher priority
/// layers override).
pub struct ConfigLoader {
    layers: Vec<Box<dyn ConfigLayer>>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a configuration layer.
    pub fn add_layer(&mut self, layer: Box<dyn ConfigLayer>) {
        self.layers.push(layer);
    }

    /// Load and merge all layers into a [`Config`] snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No layers were added
    /// - Any layer fails to load
    /// - Deserialization fails
    pub fn load(&self) -> Result<Config> {
        if self.layers.is_empty() {
            return Err(ConfigError::LoadError(
                "No configuration layers specified".to_string(),
            ));
        }

        let mut builder = config::Config::builder();

        for layer in self.sorted() {
            let values = layer.load().map_err(|e| {
                ConfigError::LoadError(format!("Failed to load layer '{}': {}", layer.name(), e))
            })?;

            let mut flat = Vec::with_capacity(values.len());
            for (key, value) in values {
                flatten(key, value, &mut flat);
            }

            for (key, value) in flat {
                builder = builder.set_override(&key, value).map_err(|e| {
                    ConfigError::LoadError(format!(
                        "Failed to merge layer '{}': {}",
                        layer.name(),
                        e
                    ))
                })?;
            }
        }

        let merged = builder
            .build()
            .map_err(|e| ConfigError::LoadError(format!("Failed to build configuration: {}", e)))?;

        merged.try_deserialize::<Config>().map_err(|e| {
            ConfigError::DeserializationError(format!("Failed to deserialize configuration: {}", e))
        })
    }

    /// Layer names in priority order.
    pub fn layer_names(&self) -> Vec<String> {
        self.sorted().iter().map(|l| l.name()).collect()
    }

    /// Paths of all file-backed layers.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.layers
            .iter()
            .filter_map(|l| l.path().map(PathBuf::from))
            .collect()
    }

    fn sorted(&self) -> Vec<&dyn ConfigLayer> {
        let mut sorted: Vec<&dyn ConfigLayer> = self.layers.iter().map(|l| l.as_ref()).collect();
        sorted.sort_by_key(|l| l.priority());
        sorted
    }
}

// Nested tables are set leaf by leaf so a layer only overrides the keys it
// names, not whole sections.
fn flatten(key: String, value: config::Value, out: &mut Vec<(String, config::Value)>) {
    match value.kind {
        config::ValueKind::Table(table) if !table.is_empty() => {
            for (child, value) in table {
                flatten(format!("{}.{}", key, child), value, out);
            }
        }
        kind => out.push((key, config::Value::new(None, kind))),
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockLayer {
        name: String,
        priority: i32,
        values: HashMap<String, config::Value>,
    }

    impl MockLayer {
        fn new(name: &str, priority: i32) -> Self {
            Self {
                name: name.to_string(),
                priority,
                values: HashMap::new(),
            }
        }

        fn with_value(mut self, key: &str, value: impl Into<config::Value>) -> Self {
            self.values.insert(key.to_string(), value.into());
            self
        }
    }

    impl ConfigLayer for MockLayer {
        fn load(&self) -> Result<HashMap<String, config::Value>> {
            Ok(self.values.clone())
        }

        fn name(&self) -> String {
            self.name.clone()
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    #[test]
    fn test_empty_loader() {
        let loader = ConfigLoader::new();
        assert!(matches!(loader.load(), Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_single_layer() {
        let mut loader = ConfigLoader::new();
        loader.add_layer(Box::new(
            MockLayer::new("test", 100)
                .with_value("metrics_address", "127.0.0.1:9090")
                .with_value("installation_id", "abc"),
        ));

        let cfg = loader.load().unwrap();
        assert_eq!(cfg.metrics_address, "127.0.0.1:9090");
        assert_eq!(cfg.installation_id, "abc");
        assert!(cfg.metrics_basic_auth.is_empty());
    }

    #[test]
    fn test_precedence() {
        let mut loader = ConfigLoader::new();
        loader.add_layer(Box::new(
            MockLayer::new("override", 200).with_value("metrics_address", ":9191"),
        ));
        loader.add_layer(Box::new(
            MockLayer::new("default", 100)
                .with_value("metrics_address", ":9090")
                .with_value("services", "proxy"),
        ));

        let cfg = loader.load().unwrap();
        assert_eq!(cfg.metrics_address, ":9191");
        assert_eq!(cfg.services, "proxy");
    }

    #[test]
    fn test_nested_sections_merge_per_key() {
        let base: HashMap<String, config::Value> = HashMap::from([
            ("storage_type".to_string(), "postgres".into()),
            ("connection_string".to_string(), "postgres://db/broker".into()),
        ]);
        let overrides: HashMap<String, config::Value> =
            HashMap::from([("cert_skip_verify".to_string(), true.into())]);

        let mut loader = ConfigLoader::new();
        loader.add_layer(Box::new(
            MockLayer::new("file", 100).with_value("databroker", base),
        ));
        loader.add_layer(Box::new(
            MockLayer::new("env", 300).with_value("databroker", overrides),
        ));

        let cfg = loader.load().unwrap();
        assert_eq!(cfg.databroker.storage_type, crate::storage::StorageType::Postgres);
        assert_eq!(cfg.databroker.connection_string, "postgres://db/broker");
        assert!(cfg.databroker.cert_skip_verify);
    }

    #[test]
    fn test_layer_names() {
        let mut loader = ConfigLoader::new();
        loader.add_layer(Box::new(MockLayer::new("layer1", 100)));
        loader.add_layer(Box::new(MockLayer::new("layer2", 200)));
        loader.add_layer(Box::new(MockLayer::new("layer3", 50)));

        assert_eq!(loader.layer_names(), vec!["layer3", "layer1", "layer2"]);
        assert!(loader.paths().is_empty());
    }
}
