use crate::engine::{AlertState, RuleEvaluator};
use crate::error::Result;
use crate::rules::RuleConfig;
use crate::window::{WindowAggregator, WindowSnapshot};
use batchwatch_common::clock::Clock;
use batchwatch_common::types::{Alert, EventRecord};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

/// Where a monitor reads "now" from.
#[derive(Clone)]
pub enum TimeSource {
    /// "Now" is the newest ingested event timestamp. Used for replays of
    /// historical logs.
    EventTime,
    /// "Now" comes from an injected clock; the window also slides on
    /// [`StreamMonitor::tick`] when no events arrive.
    Clock(Arc<dyn Clock>),
}

struct StreamState {
    aggregator: WindowAggregator,
    evaluator: RuleEvaluator,
}

/// One monitored stream: aggregator and evaluator behind a single lock, so
/// ingest and the snapshot + evaluate that follows it happen atomically.
///
/// Independent streams use independent monitors and share nothing.
pub struct StreamMonitor {
    state: Mutex<StreamState>,
    time: TimeSource,
}

impl StreamMonitor {
    pub fn new(aggregator: WindowAggregator, evaluator: RuleEvaluator, time: TimeSource) -> Self {
        Self {
            state: Mutex::new(StreamState {
                aggregator,
                evaluator,
            }),
            time,
        }
    }

    /// # Errors
    ///
    /// Returns a configuration error for an invalid window or rule set.
    pub fn from_config(window_secs: u64, rules: &[RuleConfig], time: TimeSource) -> Result<Self> {
        let aggregator = WindowAggregator::new(window_secs)?;
        let evaluator = RuleEvaluator::from_config(rules)?;
        Ok(Self::new(aggregator, evaluator, time))
    }

    /// Lock the stream state, recovering from a poisoned Mutex if necessary.
    /// Neither the aggregator nor the evaluator panics mid-update.
    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clock_now(&self) -> Option<DateTime<Utc>> {
        match &self.time {
            TimeSource::EventTime => None,
            TimeSource::Clock(clock) => Some(clock.now()),
        }
    }

    /// Folds `event` into the window and evaluates every rule.
    ///
    /// # Errors
    ///
    /// [`crate::AlertError::MalformedInput`] if the event was rejected (the
    /// window is unchanged), [`crate::AlertError::MalformedSnapshot`] on an
    /// internal inconsistency.
    pub fn ingest(&self, event: EventRecord) -> Result<Vec<Alert>> {
        let event_ts = event.timestamp;
        let clock_now = self.clock_now();

        let mut state = self.lock();
        state.aggregator.ingest(event)?;
        let now = match clock_now {
            Some(now) => {
                state.aggregator.advance(now);
                now
            }
            None => event_ts,
        };
        let snapshot = state.aggregator.snapshot();
        state.evaluator.evaluate(&snapshot, now)
    }

    /// Slides the window to the clock's current time and evaluates.
    ///
    /// With [`TimeSource::EventTime`] the window stays where the last event
    /// left it and this is a plain re-evaluation.
    pub fn tick(&self) -> Result<Vec<Alert>> {
        let clock_now = self.clock_now();

        let mut state = self.lock();
        let now = match clock_now {
            Some(now) => {
                state.aggregator.advance(now);
                now
            }
            None => match state.aggregator.latest_timestamp() {
                Some(ts) => ts,
                None => return Ok(Vec::new()),
            },
        };
        let snapshot = state.aggregator.snapshot();
        state.evaluator.evaluate(&snapshot, now)
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        self.lock().aggregator.snapshot()
    }

    pub fn alert_state(&self, rule_name: &str) -> Option<AlertState> {
        self.lock().evaluator.state(rule_name).cloned()
    }

    pub fn rule_names(&self) -> Vec<String> {
        self.lock()
            .evaluator
            .rules()
            .iter()
            .map(|r| r.name().to_string())
            .collect()
    }

    pub fn window_secs(&self) -> u64 {
        self.lock().aggregator.window_secs()
    }

    /// Events evicted from the window since the monitor started.
    pub fn evicted(&self) -> u64 {
        self.lock().aggregator.evicted()
    }
}
