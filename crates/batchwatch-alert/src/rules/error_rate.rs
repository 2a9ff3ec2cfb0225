use super::{invalid, require_min_samples, require_name};
use crate::error::Result;
use crate::window::{describe_window, WindowSnapshot};
use crate::{AlertRule, Breach, RepeatPolicy, RuleCheck};
use batchwatch_common::types::{RuleKind, Severity};

/// Fires when the share of failed events in the window exceeds `threshold`.
pub struct ErrorRateRule {
    pub name: String,
    pub severity: Severity,
    pub threshold: f64,
    pub repeat: RepeatPolicy,
    pub silence_secs: u64,
    pub min_samples: usize,
}

impl AlertRule for ErrorRateRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RuleKind {
        RuleKind::ErrorRate
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
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(invalid(
                &self.name,
                format!(
                    "error rate threshold must be within (0, 1), got {}",
                    self.threshold
                ),
            ));
        }
        Ok(())
    }

    fn check(&self, snapshot: &WindowSnapshot) -> RuleCheck {
        if snapshot.total < self.min_samples {
            return RuleCheck::Skipped;
        }
        let Some(rate) = snapshot.error_rate else {
            return RuleCheck::Skipped;
        };

        if rate > self.threshold {
            RuleCheck::Breached(Breach {
                observed: rate,
                message: format!(
                    "Error rate {:.2}% over last {} (threshold {:.2}%, {} of {} failed)",
                    rate * 100.0,
                    describe_window(snapshot.window_secs),
                    self.threshold * 100.0,
                    snapshot.fail_count,
                    snapshot.total,
                ),
                occurrence: None,
            })
        } else {
            RuleCheck::Clear
        }
    }
}
