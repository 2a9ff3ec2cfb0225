use crate::error::{NotifyError, Result};
use crate::plugin::{parse_config, SinkPlugin};
use crate::AlertSink;
use async_trait::async_trait;
use batchwatch_common::types::Alert;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 512;

/// POSTs each alert to an HTTP endpoint, retrying with exponential backoff.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    body_template: Option<String>,
    max_attempts: u32,
    backoff: Duration,
}

impl WebhookSink {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(
        url: impl Into<String>,
        body_template: Option<String>,
        max_attempts: u32,
        backoff: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            body_template,
            max_attempts: max_attempts.max(1),
            backoff,
        })
    }

    /// Renders the request body. `{{placeholders}}` in a template are
    /// replaced with alert fields; without a template the alert is sent as
    /// JSON.
    pub fn render_body(&self, alert: &Alert) -> String {
        if let Some(template) = &self.body_template {
            template
                .replace("{{id}}", &alert.id)
                .replace("{{rule_name}}", &alert.rule_name)
                .replace("{{kind}}", &alert.rule_kind.to_string())
                .replace("{{severity}}", &alert.severity.to_string())
                .replace("{{message}}", &alert.message)
                .replace("{{value}}", &format!("{:.4}", alert.observed_value))
                .replace("{{threshold}}", &format!("{:.4}", alert.threshold))
                .replace("{{timestamp}}", &alert.timestamp.to_rfc3339())
        } else {
            serde_json::json!({
                "alert_id": alert.id,
                "rule_name": alert.rule_name,
                "kind": alert.rule_kind,
                "severity": alert.severity,
                "message": alert.message,
                "value": alert.observed_value,
                "threshold": alert.threshold,
                "timestamp": alert.timestamp.to_rfc3339(),
            })
            .to_string()
        }
    }

    async fn post_once(&self, body: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.url.as_str())
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = match resp.text().await {
            Ok(text) => truncate(&text, MAX_ERROR_BODY),
            Err(e) => format!("[failed to read response body: {e}]"),
        };
        Err(NotifyError::ApiError {
            service: "webhook".to_string(),
            status: status.as_u16(),
            body: text,
        })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn emit(&self, alert: &Alert) -> Result<()> {
        let body = self.render_body(alert);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.post_once(&body).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.max_attempts => {
                    tracing::error!(
                        url = %self.url,
                        attempts = attempt,
                        error = %e,
                        "Webhook failed after retries"
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Webhook send failed, retrying");
                    tokio::time::sleep(self.backoff * 2u32.saturating_pow(attempt - 1)).await;
                }
            }
        }
    }

    fn sink_name(&self) -> &str {
        "webhook"
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

// Plugin

#[derive(Deserialize)]
struct WebhookConfig {
    url: String,
    body_template: Option<String>,
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    100
}

fn default_timeout_secs() -> u64 {
    10
}

pub struct WebhookPlugin;

impl SinkPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        "webhook"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let cfg: WebhookConfig = parse_config(self.name(), config)?;
        if !(cfg.url.starts_with("http://") || cfg.url.starts_with("https://")) {
            return Err(NotifyError::InvalidConfig(format!(
                "webhook: url must be http(s), got '{}'",
                cfg.url
            )));
        }
        if cfg.max_attempts == 0 {
            return Err(NotifyError::InvalidConfig(
                "webhook: max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn create_sink(&self, config: &Value) -> Result<Box<dyn AlertSink>> {
        let cfg: WebhookConfig = parse_config(self.name(), config)?;
        Ok(Box::new(WebhookSink::new(
            cfg.url,
            cfg.body_template,
            cfg.max_attempts,
            Duration::from_millis(cfg.backoff_ms),
            Duration::from_secs(cfg.timeout_secs),
        )?))
    }
}
