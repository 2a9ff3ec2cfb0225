use batchwatch_alert::monitor::{StreamMonitor, TimeSource};
use batchwatch_alert::rules::{default_rules, RuleConfig};
use batchwatch_common::clock::SystemClock;
use batchwatch_notify::plugin::{default_sinks, SinkConfig, SinkRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Where the monitor takes "now" from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSourceKind {
    /// Newest event timestamp. Right for replaying historical logs.
    #[default]
    EventTime,
    /// Wall clock, with periodic ticks so a quiet stream still ages out.
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_path")]
    pub path: String,
    /// Keep reading as the log grows instead of stopping at its end.
    #[serde(default)]
    pub follow: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// In follow mode, read the lines already in the file first.
    #[serde(default = "default_from_start")]
    pub from_start: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            path: default_feed_path(),
            follow: false,
            poll_interval_ms: default_poll_interval_ms(),
            from_start: default_from_start(),
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default)]
    pub time_source: TimeSourceKind,
    /// Seconds between re-evaluations when no events arrive. Only used with
    /// the system time source.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Alerts waiting for delivery before new ones are dropped.
    #[serde(default = "default_dispatch_queue")]
    pub dispatch_queue: usize,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,
    #[serde(default = "default_sinks")]
    pub sinks: Vec<SinkConfig>,
}

fn default_window_secs() -> u64 {
    300
}

fn default_tick_secs() -> u64 {
    10
}

fn default_dispatch_queue() -> usize {
    1024
}

fn default_feed_path() -> String {
    "data/simulated_logs.jsonl".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_from_start() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            time_source: TimeSourceKind::default(),
            tick_secs: default_tick_secs(),
            dispatch_queue: default_dispatch_queue(),
            feed: FeedConfig::default(),
            rules: default_rules(),
            sinks: default_sinks(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path, e))?;
        Ok(config)
    }

    /// Checks everything that can be checked without opening the feed:
    /// window, rules, sinks and the timing knobs.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.build_monitor()?;

        let registry = SinkRegistry::default();
        for sink in &self.sinks {
            registry.validate(sink)?;
        }

        if self.time_source == TimeSourceKind::System && self.tick_secs == 0 {
            anyhow::bail!("tick_secs must be at least 1 with the system time source");
        }
        if self.feed.follow && self.feed.poll_interval_ms == 0 {
            anyhow::bail!("feed.poll_interval_ms must be at least 1 in follow mode");
        }
        if self.dispatch_queue == 0 {
            anyhow::bail!("dispatch_queue must be at least 1");
        }
        Ok(())
    }

    pub fn time_source(&self) -> TimeSource {
        match self.time_source {
            TimeSourceKind::EventTime => TimeSource::EventTime,
            TimeSourceKind::System => TimeSource::Clock(Arc::new(SystemClock)),
        }
    }

    /// Tick cadence, if this configuration re-evaluates on a timer.
    pub fn tick_interval(&self) -> Option<Duration> {
        match self.time_source {
            TimeSourceKind::System if self.tick_secs > 0 => Some(Duration::from_secs(self.tick_secs)),
            _ => None,
        }
    }

    pub fn build_monitor(&self) -> anyhow::Result<StreamMonitor> {
        Ok(StreamMonitor::from_config(
            self.window_secs,
            &self.rules,
            self.time_source(),
        )?)
    }
}
