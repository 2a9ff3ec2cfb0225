use super::{ConsecutiveFailureRule, ErrorRateRule, LatencyPercentileRule};
use crate::error::Result;
use crate::{AlertRule, RepeatPolicy};
use batchwatch_common::types::{RuleKind, Severity};
use serde::{Deserialize, Serialize};

/// Kind-specific parameters of a rule definition, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleParams {
    ErrorRate {
        threshold: f64,
    },
    LatencyPercentile {
        #[serde(default = "default_percentile")]
        percentile: f64,
        threshold: f64,
    },
    ConsecutiveFailure {
        threshold: u32,
    },
}

/// A rule definition as it appears in the `[[rules]]` tables of the
/// configuration file.
///
/// # Examples
///
/// ```
/// use batchwatch_alert::rules::RuleConfig;
///
/// let rule: RuleConfig = toml::from_str(r#"
///     name = "p99-latency"
///     kind = "latency_percentile"
///     percentile = 99.0
///     threshold = 0.5
/// "#).unwrap();
/// let built = rule.build().unwrap();
/// assert_eq!(built.name(), "p99-latency");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(flatten)]
    pub params: RuleParams,
    /// Defaults to `critical` for streak rules and `warning` otherwise.
    #[serde(default)]
    pub severity: Option<Severity>,
    /// Defaults to `once` for streak rules and `every_evaluation` otherwise.
    #[serde(default)]
    pub repeat: Option<RepeatPolicy>,
    #[serde(default)]
    pub silence_secs: u64,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

fn default_percentile() -> f64 {
    95.0
}

fn default_min_samples() -> usize {
    1
}

impl RuleConfig {
    pub fn kind(&self) -> RuleKind {
        match self.params {
            RuleParams::ErrorRate { .. } => RuleKind::ErrorRate,
            RuleParams::LatencyPercentile { .. } => RuleKind::LatencyPercentile,
            RuleParams::ConsecutiveFailure { .. } => RuleKind::ConsecutiveFailure,
        }
    }

    /// Builds and validates the rule.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AlertError::InvalidRule`] for out-of-range
    /// parameters.
    pub fn build(&self) -> Result<Box<dyn AlertRule>> {
        let name = self.name.clone();
        let rule: Box<dyn AlertRule> = match self.params {
            RuleParams::ErrorRate { threshold } => Box::new(ErrorRateRule {
                name,
                severity: self.severity.unwrap_or(Severity::Warning),
                threshold,
                repeat: self.repeat.unwrap_or(RepeatPolicy::EveryEvaluation),
                silence_secs: self.silence_secs,
                min_samples: self.min_samples,
            }),
            RuleParams::LatencyPercentile {
                percentile,
                threshold,
            } => Box::new(LatencyPercentileRule {
                name,
                severity: self.severity.unwrap_or(Severity::Warning),
                percentile,
                threshold,
                repeat: self.repeat.unwrap_or(RepeatPolicy::EveryEvaluation),
                silence_secs: self.silence_secs,
                min_samples: self.min_samples,
            }),
            RuleParams::ConsecutiveFailure { threshold } => Box::new(ConsecutiveFailureRule {
                name,
                severity: self.severity.unwrap_or(Severity::Critical),
                threshold,
                repeat: self.repeat.unwrap_or(RepeatPolicy::Once),
                silence_secs: self.silence_secs,
            }),
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// Spacing of repeated alerts from the default rate and latency rules.
pub const DEFAULT_REPEAT_SILENCE_SECS: u64 = 60;

/// The rule set used when the configuration file defines none: error rate
/// above 2 %, p95 duration above 0.30 s, five failures in a row.
///
/// The rate and latency rules re-alert at most once every
/// [`DEFAULT_REPEAT_SILENCE_SECS`] while the breach lasts.
pub fn default_rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig {
            name: "error-rate".to_string(),
            params: RuleParams::ErrorRate { threshold: 0.02 },
            severity: None,
            repeat: None,
            silence_secs: DEFAULT_REPEAT_SILENCE_SECS,
            min_samples: default_min_samples(),
        },
        RuleConfig {
            name: "p95-latency".to_string(),
            params: RuleParams::LatencyPercentile {
                percentile: default_percentile(),
                threshold: 0.30,
            },
            severity: None,
            repeat: None,
            silence_secs: DEFAULT_REPEAT_SILENCE_SECS,
            min_samples: default_min_samples(),
        },
        RuleConfig {
            name: "consecutive-failures".to_string(),
            params: RuleParams::ConsecutiveFailure { threshold: 5 },
            severity: None,
            repeat: None,
            silence_secs: 0,
            min_samples: default_min_samples(),
        },
    ]
}
