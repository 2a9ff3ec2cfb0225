use crate::error::{NotifyError, Result};
use crate::plugin::{parse_config, SinkPlugin};
use crate::{format_alert_line, AlertSink};
use async_trait::async_trait;
use batchwatch_common::types::Alert;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub const DEFAULT_ALERT_LOG: &str = "alerts/alerts.log";

/// Appends one line per alert to a plain-text log.
///
/// The file and its parent directory are created on the first alert, so an
/// idle monitor leaves nothing behind.
pub struct LogFileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(file)
    }
}

#[async_trait]
impl AlertSink for LogFileSink {
    async fn emit(&self, alert: &Alert) -> Result<()> {
        let mut line = format_alert_line(Utc::now(), alert);
        line.push('\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }
        if let Some(file) = guard.as_mut() {
            if let Err(e) = write_line(file, &line).await {
                // Reopen on the next alert in case the file was rotated away.
                *guard = None;
                return Err(e);
            }
        }
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "log_file"
    }
}

async fn write_line(file: &mut File, line: &str) -> Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

// Plugin

#[derive(Deserialize)]
struct LogFileConfig {
    #[serde(default = "default_path")]
    path: PathBuf,
}

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_ALERT_LOG)
}

pub struct LogFilePlugin;

impl SinkPlugin for LogFilePlugin {
    fn name(&self) -> &str {
        "log_file"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let cfg: LogFileConfig = parse_config(self.name(), config)?;
        if cfg.path.as_os_str().is_empty() {
            return Err(NotifyError::InvalidConfig("log_file: path is empty".to_string()));
        }
        Ok(())
    }

    fn create_sink(&self, config: &Value) -> Result<Box<dyn AlertSink>> {
        let cfg: LogFileConfig = parse_config(self.name(), config)?;
        Ok(Box::new(LogFileSink::new(cfg.path)))
    }
}
