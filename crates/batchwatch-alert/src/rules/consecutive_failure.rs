use super::{invalid, require_name};
use crate::error::Result;
use crate::window::WindowSnapshot;
use crate::{AlertRule, Breach, RepeatPolicy, RuleCheck};
use batchwatch_common::types::{RuleKind, Severity};

/// Fires when the trailing run of failures reaches `threshold`.
///
/// A streak is a point-in-time event rather than a persistent condition:
/// each breach carries the streak's identity so the evaluator alerts once
/// per streak.
pub struct ConsecutiveFailureRule {
    pub name: String,
    pub severity: Severity,
    pub threshold: u32,
    pub repeat: RepeatPolicy,
    pub silence_secs: u64,
}

impl AlertRule for ConsecutiveFailureRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RuleKind {
        RuleKind::ConsecutiveFailure
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
        f64::from(self.threshold)
    }

    fn validate(&self) -> Result<()> {
        require_name(&self.name)?;
        if self.threshold == 0 {
            return Err(invalid(&self.name, "streak threshold must be at least 1"));
        }
        Ok(())
    }

    fn check(&self, snapshot: &WindowSnapshot) -> RuleCheck {
        let streak = snapshot.current_consecutive_failures;
        if streak < self.threshold {
            return RuleCheck::Clear;
        }

        let codes = if snapshot.error_codes.is_empty() {
            String::new()
        } else {
            let listed: Vec<String> = snapshot
                .error_codes
                .iter()
                .map(|(code, n)| format!("{code}={n}"))
                .collect();
            format!(" [{}]", listed.join(", "))
        };

        RuleCheck::Breached(Breach {
            observed: f64::from(streak),
            message: format!(
                "Consecutive failures observed: {} (threshold {}){}",
                streak, self.threshold, codes
            ),
            occurrence: snapshot.current_streak_start,
        })
    }
}
