use crate::error::Result;
use crate::plugin::{parse_config, SinkPlugin};
use crate::{format_alert_line, AlertSink};
use async_trait::async_trait;
use batchwatch_common::types::Alert;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

/// Prints alerts to stdout in the same format as the alert log, or as one
/// JSON object per line.
pub struct ConsoleSink {
    json: bool,
}

impl ConsoleSink {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn render(&self, alert: &Alert) -> Result<String> {
        let mut line = if self.json {
            serde_json::to_string(alert)?
        } else {
            format_alert_line(Utc::now(), alert)
        };
        line.push('\n');
        Ok(line)
    }
}

#[async_trait]
impl AlertSink for ConsoleSink {
    async fn emit(&self, alert: &Alert) -> Result<()> {
        let line = self.render(alert)?;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "console"
    }
}

// Plugin

#[derive(Deserialize)]
struct ConsoleConfig {
    #[serde(default)]
    json: bool,
}

pub struct ConsolePlugin;

impl SinkPlugin for ConsolePlugin {
    fn name(&self) -> &str {
        "console"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        parse_config::<ConsoleConfig>(self.name(), config)?;
        Ok(())
    }

    fn create_sink(&self, config: &Value) -> Result<Box<dyn AlertSink>> {
        let cfg: ConsoleConfig = parse_config(self.name(), config)?;
        Ok(Box::new(ConsoleSink::new(cfg.json)))
    }
}
