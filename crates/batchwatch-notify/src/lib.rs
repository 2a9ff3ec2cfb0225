//! Alert delivery with pluggable sinks.
//!
//! Alerts produced by the rule evaluator are handed to an
//! [`dispatcher::AlertDispatcher`], which fans each one out to every
//! configured [`AlertSink`] on a background task. Built-in sinks append to
//! a log file, print to stdout, or POST to a webhook.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod plugin;


use async_trait::async_trait;
use batchwatch_common::types::Alert;
use chrono::{DateTime, SecondsFormat, Utc};

pub use error::{NotifyError, Result};

/// A destination for alerts (file, console, HTTP endpoint).
///
/// Implementations are created by the corresponding [`plugin::SinkPlugin`].
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Delivers one alert.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after the sink's own retries.
    async fn emit(&self, alert: &Alert) -> Result<()>;

    /// Returns the sink type name (e.g. `"log_file"`, `"webhook"`).
    fn sink_name(&self) -> &str;
}

/// Formats the `alerts.log` line for `alert`, stamped with the time it was
/// written.
///
/// # Examples
///
/// ```
/// use batchwatch_common::types::{Alert, RuleKind, Severity};
/// use batchwatch_notify::format_alert_line;
/// use chrono::{TimeZone, Utc};
///
/// let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
/// let alert = Alert {
///     id: "1".into(),
///     timestamp: at,
///     rule_name: "consecutive-failures".into(),
///     rule_kind: RuleKind::ConsecutiveFailure,
///     severity: Severity::Critical,
///     message: "Consecutive failures observed: 5 (threshold 5)".into(),
///     observed_value: 5.0,
///     threshold: 5.0,
/// };
/// assert_eq!(
///     format_alert_line(at, &alert),
///     "2024-05-01T12:00:00.000000Z ALERT Consecutive failures observed: 5 (threshold 5)"
/// );
/// ```
pub fn format_alert_line(written_at: DateTime<Utc>, alert: &Alert) -> String {
    format!(
        "{} ALERT {}",
        written_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        alert.message
    )
}
