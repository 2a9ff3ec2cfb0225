use crate::error::{AlertError, Result};
use crate::rules::RuleConfig;
use crate::window::WindowSnapshot;
use crate::{AlertRule, Breach, RepeatPolicy, RuleCheck};
use batchwatch_common::types::Alert;
use chrono::{DateTime, Duration, Utc};
use snowflake::SnowflakeIdBucket;
use std::collections::{HashMap, HashSet};

/// Suppression bookkeeping for one rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertState {
    pub last_fired_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub fire_count: u64,
    /// Occurrence (streak) the last alert was raised for.
    pub last_occurrence: Option<u64>,
}

/// Turns window snapshots into alerts, one [`AlertState`] per rule.
///
/// Rules are evaluated in registration order, which is also the order of
/// the returned alerts. Every alert gets a snowflake id from the
/// evaluator's own generator.
pub struct RuleEvaluator {
    rules: Vec<Box<dyn AlertRule>>,
    states: HashMap<String, AlertState>,
    ids: SnowflakeIdBucket,
}

const DEFAULT_MACHINE_ID: i32 = 1;
const DEFAULT_NODE_ID: i32 = 1;

impl RuleEvaluator {
    /// # Errors
    ///
    /// Rejects the whole set if any rule is invalid or two rules share a
    /// name.
    pub fn new(rules: Vec<Box<dyn AlertRule>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            rule.validate()?;
            if !seen.insert(rule.name().to_string()) {
                return Err(AlertError::DuplicateRule(rule.name().to_string()));
            }
        }
        Ok(Self {
            rules,
            states: HashMap::new(),
            ids: SnowflakeIdBucket::new(DEFAULT_MACHINE_ID, DEFAULT_NODE_ID),
        })
    }

    pub fn from_config(configs: &[RuleConfig]) -> Result<Self> {
        let rules = configs
            .iter()
            .map(RuleConfig::build)
            .collect::<Result<Vec<_>>>()?;
        Self::new(rules)
    }

    pub fn rules(&self) -> &[Box<dyn AlertRule>] {
        &self.rules
    }

    /// Alert state of a rule, present once the rule has fired.
    pub fn state(&self, rule_name: &str) -> Option<&AlertState> {
        self.states.get(rule_name)
    }

    /// Checks every rule against `snapshot` and returns the alerts to emit.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::MalformedSnapshot`] if the snapshot contradicts
    /// itself. Nothing is evaluated in that case.
    pub fn evaluate(&mut self, snapshot: &WindowSnapshot, now: DateTime<Utc>) -> Result<Vec<Alert>> {
        check_snapshot(snapshot)?;

        let mut alerts = Vec::new();
        for rule in &self.rules {
            let name = rule.name();
            match rule.check(snapshot) {
                RuleCheck::Skipped => {
                    tracing::trace!(rule = name, total = snapshot.total, "Rule skipped");
                }
                RuleCheck::Clear => {
                    if let Some(state) = self.states.get_mut(name) {
                        if state.is_active {
                            tracing::info!(rule = name, "Alert condition cleared");
                        }
                        state.is_active = false;
                    }
                }
                RuleCheck::Breached(breach) => {
                    let state = self.states.entry(name.to_string()).or_default();
                    if should_fire(rule.as_ref(), state, &breach, now) {
                        state.last_fired_at = Some(now);
                        state.fire_count += 1;
                        // Point-in-time breaches are over as soon as they are reported.
                        state.is_active = breach.occurrence.is_none();
                        state.last_occurrence = breach.occurrence;
                        alerts.push(Alert {
                            id: self.ids.get_id().to_string(),
                            timestamp: now,
                            rule_name: name.to_string(),
                            rule_kind: rule.kind(),
                            severity: rule.severity(),
                            message: breach.message,
                            observed_value: breach.observed,
                            threshold: rule.threshold(),
                        });
                    } else {
                        if breach.occurrence.is_none() {
                            state.is_active = true;
                        }
                        tracing::debug!(rule = name, observed = breach.observed, "Alert suppressed");
                    }
                }
            }
        }

        Ok(alerts)
    }
}

fn should_fire(rule: &dyn AlertRule, state: &AlertState, breach: &Breach, now: DateTime<Utc>) -> bool {
    match rule.repeat() {
        RepeatPolicy::Once => match breach.occurrence {
            Some(occurrence) => state.last_occurrence != Some(occurrence),
            None => !state.is_active,
        },
        RepeatPolicy::EveryEvaluation => {
            let silence = i64::try_from(rule.silence_secs())
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX);
            !state
                .last_fired_at
                .is_some_and(|last| silence > Duration::zero() && now - last < silence)
        }
    }
}

fn check_snapshot(s: &WindowSnapshot) -> Result<()> {
    let malformed = |what: String| Err(AlertError::MalformedSnapshot(what));

    let counted = s.success_count + s.retry_count + s.fail_count;
    if counted != s.total {
        return malformed(format!(
            "outcome counts sum to {counted} but total is {}",
            s.total
        ));
    }
    if s.sorted_durations.len() != s.total {
        return malformed(format!(
            "{} durations for {} events",
            s.sorted_durations.len(),
            s.total
        ));
    }
    match (s.total, s.error_rate) {
        (0, Some(rate)) => return malformed(format!("error rate {rate} reported for an empty window")),
        (n, None) if n > 0 => return malformed(format!("error rate missing for {n} events")),
        (_, Some(rate)) if !(0.0..=1.0).contains(&rate) => {
            return malformed(format!("error rate {rate} outside [0, 1]"));
        }
        _ => {}
    }
    for (label, value) in [("p95_duration", s.p95_duration), ("mean_duration", s.mean_duration)] {
        if let Some(v) = value {
            if !(v.is_finite() && v >= 0.0) {
                return malformed(format!("{label} is {v}"));
            }
        }
    }
    if s.current_consecutive_failures > s.max_consecutive_failures_in_window {
        return malformed(format!(
            "current streak {} exceeds window maximum {}",
            s.current_consecutive_failures, s.max_consecutive_failures_in_window
        ));
    }
    if s.max_consecutive_failures_in_window as usize > s.fail_count {
        return malformed(format!(
            "streak of {} with only {} failures",
            s.max_consecutive_failures_in_window, s.fail_count
        ));
    }
    Ok(())
}
