use super::{invalid, require_min_samples, require_name};
use crate::error::Result;
use crate::window::{describe_window, WindowSnapshot};
use crate::{AlertRule, Breach, RepeatPolicy, RuleCheck};
use batchwatch_common::types::{RuleKind, Severity};

/// Fires when the nearest-rank `percentile` of event durations in the
/// window exceeds `threshold` seconds.
pub struct LatencyPercentileRule {
    pub name: String,
    pub severity: Severity,
    pub percentile: f64,
    pub threshold: f64,
    pub repeat: RepeatPolicy,
    pub silence_secs: u64,
    pub min_samples: usize,
}

impl LatencyPercentileRule {
    fn label(&self) -> String {
        if self.percentile.fract() == 0.0 {
            format!("P{:.0}", self.percentile)
        } else {
            format!("P{}", self.percentile)
        }
    }
}

impl AlertRule for LatencyPercentileRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RuleKind {
        RuleKind::LatencyPercentile
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn repeat(&self) -> RepeatPolicy {
        self.repeat
    }

    fn silence_secs(&self) -> u64 {
        self.silence_secs
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn validate(&self) -> Result<()> {
        require_name(&self.name)?;
        require_min_samples(&self.name, self.min_samples)?;
        if !(self.percentile > 0.0 && self.percentile <= 100.0) {
            return Err(invalid(
                &self.name,
                format!("percentile must be within (0, 100], got {}", self.percentile),
            ));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(invalid(
                &self.name,
                format!("latency threshold must be positive, got {}", self.threshold),
            ));
        }
        Ok(())
    }

    fn check(&self, snapshot: &WindowSnapshot) -> RuleCheck {
        if snapshot.total < self.min_samples {
            return RuleCheck::Skipped;
        }
        let Some(value) = snapshot.percentile(self.percentile) else {
            return RuleCheck::Skipped;
        };

        if value > self.threshold {
            RuleCheck::Breached(Breach {
                observed: value,
                message: format!(
                    "{} duration {:.3}s over last {} (threshold {:.3}s)",
                    self.label(),
                    value,
                    describe_window(snapshot.window_secs),
                    self.threshold,
                ),
                occurrence: None,
            })
        } else {
            RuleCheck::Clear
        }
    }
}
