use crate::error::{AlertError, Result};
use batchwatch_common::types::{EventRecord, Outcome};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, VecDeque};

/// Percentile reported as `p95_duration` in every snapshot.
pub const DEFAULT_PERCENTILE: f64 = 95.0;

/// Nearest-rank percentile of an ascending slice.
///
/// Picks the element at `ceil(p / 100 * n) - 1`, clamped to the slice. No
/// interpolation. Returns `None` for an empty slice or a percentile outside
/// `(0, 100]`.
///
/// # Examples
///
/// ```
/// use batchwatch_alert::window::nearest_rank;
///
/// let sorted: Vec<f64> = (1..=20).map(f64::from).collect();
/// assert_eq!(nearest_rank(&sorted, 95.0), Some(19.0));
/// assert_eq!(nearest_rank(&sorted, 100.0), Some(20.0));
/// assert_eq!(nearest_rank(&[], 95.0), None);
/// ```
pub fn nearest_rank(sorted: &[f64], percentile: f64) -> Option<f64> {
    if sorted.is_empty() || !(percentile > 0.0 && percentile <= 100.0) {
        return None;
    }
    let n = sorted.len();
    // p * n is exact for integral p and realistic n, so an exact rank is
    // never pushed up by rounding.
    let rank = (percentile * n as f64 / 100.0).ceil() as usize;
    let idx = rank.saturating_sub(1).min(n - 1);
    Some(sorted[idx])
}

/// Renders a window length the way alert messages quote it
/// ("5 minutes", "1 hour", "90 seconds").
pub fn describe_window(secs: u64) -> String {
    let (n, unit) = if secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Immutable copy of the window statistics at one point in time.
///
/// `error_rate`, `p95_duration` and `mean_duration` are `None` when the
/// window is empty so that callers never read a zero rate as healthy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSnapshot {
    pub window_secs: u64,
    pub total: usize,
    pub success_count: usize,
    pub retry_count: usize,
    pub fail_count: usize,
    pub error_rate: Option<f64>,
    pub p95_duration: Option<f64>,
    pub mean_duration: Option<f64>,
    pub current_consecutive_failures: u32,
    pub max_consecutive_failures_in_window: u32,
    /// Sequence number of the first failure of the trailing streak. Stays
    /// the same while the streak continues, even after its first events are
    /// evicted. Once the window empties out the next failure starts a new
    /// streak.
    pub current_streak_start: Option<u64>,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub error_codes: BTreeMap<String, usize>,
    pub(crate) sorted_durations: Vec<f64>,
}

impl WindowSnapshot {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Nearest-rank percentile of the buffered durations.
    pub fn percentile(&self, percentile: f64) -> Option<f64> {
        nearest_rank(&self.sorted_durations, percentile)
    }

    /// Buffered durations in ascending order.
    pub fn sorted_durations(&self) -> &[f64] {
        &self.sorted_durations
    }
}

#[derive(Debug, Clone)]
struct Sequenced {
    seq: u64,
    event: EventRecord,
}

/// Rolling statistics over the trailing `window` of an ordered event stream.
///
/// Events are appended in timestamp order and evicted from the front once
/// they fall behind `edge - window`, where `edge` is the newest event
/// timestamp or the latest [`advance`](Self::advance) time, whichever is
/// later. Outcome counters are maintained on ingest and eviction; streaks
/// and percentiles are recomputed from the buffer on [`snapshot`](Self::snapshot).
pub struct WindowAggregator {
    window_secs: u64,
    window: Duration,
    buffer: VecDeque<Sequenced>,
    next_seq: u64,
    latest: Option<DateTime<Utc>>,
    edge: Option<DateTime<Utc>>,
    success_count: usize,
    retry_count: usize,
    fail_count: usize,
    streak_start: Option<u64>,
    evicted: u64,
}

impl WindowAggregator {
    /// # Errors
    ///
    /// Returns [`AlertError::InvalidWindow`] for a zero-length window.
    pub fn new(window_secs: u64) -> Result<Self> {
        if window_secs == 0 {
            return Err(AlertError::InvalidWindow(
                "window must be at least one second".to_string(),
            ));
        }
        let window = i64::try_from(window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| AlertError::InvalidWindow(format!("{window_secs}s is out of range")))?;
        Ok(Self {
            window_secs,
            window,
            buffer: VecDeque::new(),
            next_seq: 0,
            latest: None,
            edge: None,
            success_count: 0,
            retry_count: 0,
            fail_count: 0,
            streak_start: None,
            evicted: 0,
        })
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Timestamp of the newest ingested event.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.latest
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total number of events evicted since construction.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Buffered events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &EventRecord> {
        self.buffer.iter().map(|s| &s.event)
    }

    /// Folds one event into the window and evicts everything that fell
    /// behind the new trailing edge.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::MalformedInput`] when the event is older than
    /// the newest one already ingested, has a negative or non-finite
    /// duration, or carries an error code without being a failure. A rejected
    /// event leaves the window untouched.
    pub fn ingest(&mut self, event: EventRecord) -> Result<()> {
        self.validate(&event)?;

        let ts = event.timestamp;
        // Age out first so a fully expired streak is not extended.
        self.move_edge(ts);
        let seq = self.next_seq;
        self.next_seq += 1;

        match event.outcome {
            Outcome::Success => self.success_count += 1,
            Outcome::Retry => self.retry_count += 1,
            Outcome::Fail => self.fail_count += 1,
        }
        if event.outcome.is_failure() {
            self.streak_start.get_or_insert(seq);
        } else {
            self.streak_start = None;
        }

        self.buffer.push_back(Sequenced { seq, event });
        self.latest = Some(ts);
        // An event behind an edge moved by `advance` ages out at once.
        self.evict_behind_edge();
        Ok(())
    }

    /// Moves the trailing edge forward to `now` without a new event so a
    /// quiet stream still ages out. Never moves the edge backwards.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.move_edge(now);
    }

    fn move_edge(&mut self, to: DateTime<Utc>) {
        let edge = match self.edge {
            Some(edge) if edge >= to => edge,
            _ => to,
        };
        self.edge = Some(edge);
        self.evict_behind_edge();
    }

    fn evict_behind_edge(&mut self) {
        // Nothing can be older than the earliest representable instant.
        if let Some(cutoff) = self.edge.and_then(|edge| edge.checked_sub_signed(self.window)) {
            self.evict(cutoff);
        }
    }

    fn evict(&mut self, cutoff: DateTime<Utc>) {
        while let Some(front) = self.buffer.front() {
            if front.event.timestamp >= cutoff {
                break;
            }
            if let Some(old) = self.buffer.pop_front() {
                match old.event.outcome {
                    Outcome::Success => self.success_count -= 1,
                    Outcome::Retry => self.retry_count -= 1,
                    Outcome::Fail => self.fail_count -= 1,
                }
                self.evicted += 1;
            }
        }
        // A streak whose every event aged out cannot be continued.
        if self.buffer.is_empty() {
            self.streak_start = None;
        }
    }

    fn validate(&self, event: &EventRecord) -> Result<()> {
        if let Some(latest) = self.latest {
            if event.timestamp < latest {
                return Err(AlertError::MalformedInput {
                    field: "ts",
                    reason: format!(
                        "{} is older than the latest ingested event at {}",
                        event.timestamp.to_rfc3339(),
                        latest.to_rfc3339()
                    ),
                });
            }
        }
        if !event.duration_secs.is_finite() || event.duration_secs < 0.0 {
            return Err(AlertError::MalformedInput {
                field: "duration_sec",
                reason: format!("must be a non-negative number, got {}", event.duration_secs),
            });
        }
        if event.error_code.is_some() && !event.outcome.is_failure() {
            return Err(AlertError::MalformedInput {
                field: "error_code",
                reason: format!("only failures carry an error code, outcome was {}", event.outcome),
            });
        }
        Ok(())
    }

    /// Copies the current statistics. Reflects exactly the buffered events.
    pub fn snapshot(&self) -> WindowSnapshot {
        let total = self.buffer.len();

        let mut sorted_durations: Vec<f64> =
            self.buffer.iter().map(|s| s.event.duration_secs).collect();
        sorted_durations.sort_by(f64::total_cmp);

        let mut current = 0u32;
        let mut max = 0u32;
        let mut error_codes = BTreeMap::new();
        for s in &self.buffer {
            if s.event.outcome.is_failure() {
                current += 1;
                max = max.max(current);
                if let Some(code) = &s.event.error_code {
                    *error_codes.entry(code.clone()).or_insert(0) += 1;
                }
            } else {
                current = 0;
            }
        }

        let (error_rate, mean_duration) = if total == 0 {
            (None, None)
        } else {
            let n = total as f64;
            (
                Some(self.fail_count as f64 / n),
                Some(sorted_durations.iter().sum::<f64>() / n),
            )
        };

        WindowSnapshot {
            window_secs: self.window_secs,
            total,
            success_count: self.success_count,
            retry_count: self.retry_count,
            fail_count: self.fail_count,
            error_rate,
            p95_duration: nearest_rank(&sorted_durations, DEFAULT_PERCENTILE),
            mean_duration,
            current_consecutive_failures: current,
            max_consecutive_failures_in_window: max,
            current_streak_start: if current > 0 { self.streak_start } else { None },
            window_start: self.buffer.front().map(|s| s.event.timestamp),
            window_end: self.buffer.back().map(|s| s.event.timestamp),
            error_codes,
            sorted_durations,
        }
    }
}
