use crate::channels::log_file::DEFAULT_ALERT_LOG;
use crate::error::{NotifyError, Result};
use crate::AlertSink;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Factory for [`AlertSink`] instances built from JSON configuration.
///
/// Each plugin is registered in the [`SinkRegistry`] by its `name()`, which
/// is the `type` of a `[[sinks]]` entry.
pub trait SinkPlugin: Send + Sync {
    /// Returns the plugin type name (e.g. `"log_file"`, `"webhook"`).
    fn name(&self) -> &str;

    /// Validates a config blob against this plugin's expected schema.
    fn validate_config(&self, config: &Value) -> Result<()>;

    /// Creates a sink from a validated config blob.
    fn create_sink(&self, config: &Value) -> Result<Box<dyn AlertSink>>;
}

/// One `[[sinks]]` entry of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(rename = "type")]
    pub sink_type: String,
    #[serde(default)]
    pub config: Value,
}

impl SinkConfig {
    pub fn new(sink_type: &str, config: Value) -> Self {
        Self {
            sink_type: sink_type.to_string(),
            config,
        }
    }
}

/// Console output plus the `alerts/alerts.log` file.
pub fn default_sinks() -> Vec<SinkConfig> {
    vec![
        SinkConfig::new("console", Value::Null),
        SinkConfig::new("log_file", serde_json::json!({ "path": DEFAULT_ALERT_LOG })),
    ]
}

/// Deserializes a plugin config, treating a missing config as `{}`.
pub(crate) fn parse_config<T: DeserializeOwned>(plugin: &str, config: &Value) -> Result<T> {
    let config = match config {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(config)
        .map_err(|e| NotifyError::InvalidConfig(format!("{plugin}: {e}")))
}

/// Registry of available [`SinkPlugin`]s.
///
/// # Examples
///
/// ```
/// use batchwatch_notify::plugin::SinkRegistry;
///
/// let registry = SinkRegistry::default();
/// assert!(registry.has_plugin("log_file"));
/// assert!(registry.has_plugin("console"));
/// assert!(registry.has_plugin("webhook"));
/// assert!(!registry.has_plugin("pagerduty"));
/// ```
pub struct SinkRegistry {
    plugins: HashMap<String, Box<dyn SinkPlugin>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn SinkPlugin>) {
        let name = plugin.name().to_string();
        self.plugins.insert(name, plugin);
    }

    fn plugin(&self, type_name: &str) -> Result<&dyn SinkPlugin> {
        self.plugins
            .get(type_name)
            .map(|p| p.as_ref())
            .ok_or_else(|| NotifyError::UnknownSinkType(type_name.to_string()))
    }

    pub fn validate(&self, sink: &SinkConfig) -> Result<()> {
        self.plugin(&sink.sink_type)?.validate_config(&sink.config)
    }

    pub fn create_sink(&self, sink: &SinkConfig) -> Result<Box<dyn AlertSink>> {
        let plugin = self.plugin(&sink.sink_type)?;
        plugin.validate_config(&sink.config)?;
        plugin.create_sink(&sink.config)
    }

    /// Builds every configured sink, failing on the first invalid one.
    pub fn build_all(&self, sinks: &[SinkConfig]) -> Result<Vec<Box<dyn AlertSink>>> {
        sinks.iter().map(|s| self.create_sink(s)).collect()
    }

    pub fn has_plugin(&self, type_name: &str) -> bool {
        self.plugins.contains_key(type_name)
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::channels::log_file::LogFilePlugin));
        registry.register(Box::new(crate::channels::console::ConsolePlugin));
        registry.register(Box::new(crate::channels::webhook::WebhookPlugin));
        registry
    }
}
