//! Windowed alerting engine for work-unit outcome streams.
//!
//! A [`window::WindowAggregator`] folds each [`EventRecord`] into rolling
//! statistics over a trailing time window. The [`engine::RuleEvaluator`]
//! checks every [`window::WindowSnapshot`] against the registered
//! [`AlertRule`]s and decides, per rule, whether a breach becomes an
//! [`Alert`]. [`monitor::StreamMonitor`] puts both behind one lock so a
//! stream can be fed from several threads.
//!
//! Built-in rule kinds are error rate, nearest-rank latency percentile and
//! consecutive-failure streaks.
//!
//! [`EventRecord`]: batchwatch_common::types::EventRecord
//! [`Alert`]: batchwatch_common::types::Alert

pub mod engine;
pub mod error;
pub mod monitor;
pub mod rules;
pub mod window;

#[cfg(test)]
mod tests;

use batchwatch_common::types::{RuleKind, Severity};
use serde::{Deserialize, Serialize};
use window::WindowSnapshot;

pub use error::{AlertError, Result};

/// How often a rule may emit while its condition keeps breaching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    /// Emit once on entering the breached state, then stay quiet until the
    /// condition clears (or, for streak rules, until a new streak).
    Once,
    /// Emit on every evaluation cycle that breaches, spaced by the rule's
    /// silence period.
    EveryEvaluation,
}

/// A breach reported by [`AlertRule::check`].
#[derive(Debug, Clone, PartialEq)]
pub struct Breach {
    pub observed: f64,
    pub message: String,
    /// Identity of a point-in-time occurrence (the streak a streak rule is
    /// looking at). `None` for persistent conditions such as a rate.
    pub occurrence: Option<u64>,
}

/// Outcome of checking one rule against one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleCheck {
    /// The statistic is undefined for this snapshot; alert state is left
    /// untouched.
    Skipped,
    Clear,
    Breached(Breach),
}

/// A threshold check over window statistics.
///
/// Implementations are registered in the [`engine::RuleEvaluator`], which
/// owns the per-rule [`engine::AlertState`] and applies the
/// [`RepeatPolicy`]. Rules themselves are immutable and stateless.
pub trait AlertRule: Send + Sync {
    /// Unique name, used as the alert-state key and in emitted alerts.
    fn name(&self) -> &str;

    fn kind(&self) -> RuleKind;

    fn severity(&self) -> Severity;

    fn repeat(&self) -> RepeatPolicy;

    /// Minimum seconds between two alerts of an
    /// [`RepeatPolicy::EveryEvaluation`] rule. Zero means every cycle.
    fn silence_secs(&self) -> u64;

    /// The configured threshold, echoed in emitted alerts.
    fn threshold(&self) -> f64;

    /// Rejects out-of-range parameters before the engine accepts the rule.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::InvalidRule`] naming the offending parameter.
    fn validate(&self) -> Result<()>;

    fn check(&self, snapshot: &WindowSnapshot) -> RuleCheck;
}
