use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one completed unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Retry,
    Fail,
}

impl Outcome {
    pub fn is_failure(self) -> bool {
        matches!(self, Outcome::Fail)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Retry => write!(f, "retry"),
            Outcome::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(Outcome::Success),
            "retry" => Ok(Outcome::Retry),
            "fail" | "failure" => Ok(Outcome::Fail),
            _ => Err(format!("unknown outcome: {s}")),
        }
    }
}

/// One observed unit of work, as written to the JSONL event log.
///
/// Field names on the wire follow the batch worker's log lines
/// (`ts`, `duration_sec`, `error_code`). The live worker writes the failure
/// reason under `error`, which is accepted as an alias.
///
/// # Examples
///
/// ```
/// use batchwatch_common::types::{EventRecord, Outcome};
///
/// let line = r#"{"ts":"2024-05-01T12:00:00Z","outcome":"fail","duration_sec":0.21,"error_code":"E_DB_TIMEOUT","warehouse":"W3"}"#;
/// let event: EventRecord = serde_json::from_str(line).unwrap();
/// assert_eq!(event.outcome, Outcome::Fail);
/// assert_eq!(event.error_code.as_deref(), Some("E_DB_TIMEOUT"));
/// assert_eq!(event.warehouse.as_deref(), Some("W3"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    #[serde(rename = "duration_sec")]
    pub duration_secs: f64,
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<u64>,
    #[serde(default)]
    pub retries: u32,
}

impl EventRecord {
    pub fn new(timestamp: DateTime<Utc>, outcome: Outcome, duration_secs: f64) -> Self {
        Self {
            timestamp,
            outcome,
            duration_secs,
            error_code: None,
            batch_id: None,
            warehouse: None,
            items: None,
            retries: 0,
        }
    }

    pub fn success(timestamp: DateTime<Utc>, duration_secs: f64) -> Self {
        Self::new(timestamp, Outcome::Success, duration_secs)
    }

    pub fn retry(timestamp: DateTime<Utc>, duration_secs: f64) -> Self {
        Self::new(timestamp, Outcome::Retry, duration_secs)
    }

    pub fn fail(timestamp: DateTime<Utc>, duration_secs: f64, error_code: &str) -> Self {
        Self {
            error_code: Some(error_code.to_string()),
            ..Self::new(timestamp, Outcome::Fail, duration_secs)
        }
    }
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use batchwatch_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// The three statistics a rule can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    ErrorRate,
    LatencyPercentile,
    ConsecutiveFailure,
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleKind::ErrorRate => write!(f, "error_rate"),
            RuleKind::LatencyPercentile => write!(f, "latency_percentile"),
            RuleKind::ConsecutiveFailure => write!(f, "consecutive_failure"),
        }
    }
}

/// A notification produced by the rule evaluator and handed to the sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub rule_name: String,
    pub rule_kind: RuleKind,
    pub severity: Severity,
    pub message: String,
    pub observed_value: f64,
    pub threshold: f64,
}
