pub mod config;
pub mod consecutive_failure;
pub mod error_rate;
pub mod latency_percentile;

pub use config::{default_rules, RuleConfig, RuleParams};
pub use consecutive_failure::ConsecutiveFailureRule;
pub use error_rate::ErrorRateRule;
pub use latency_percentile::LatencyPercentileRule;

use crate::error::{AlertError, Result};

fn invalid(rule: &str, reason: impl Into<String>) -> AlertError {
    AlertError::InvalidRule {
        rule: rule.to_string(),
        reason: reason.into(),
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(invalid(name, "rule name must not be empty"));
    }
    Ok(())
}

fn require_min_samples(name: &str, min_samples: usize) -> Result<()> {
    if min_samples == 0 {
        return Err(invalid(name, "min_samples must be at least 1"));
    }
    Ok(())
}
