use crate::engine::RuleEvaluator;
use crate::error::AlertError;
use crate::monitor::{StreamMonitor, TimeSource};
use crate::rules::{
    default_rules, ConsecutiveFailureRule, ErrorRateRule, LatencyPercentileRule, RuleConfig,
    RuleParams,
};
use crate::window::WindowAggregator;
use crate::{AlertRule, RepeatPolicy};
use batchwatch_common::clock::ManualClock;
use batchwatch_common::types::{Alert, EventRecord, Outcome, RuleKind, Severity};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    base() + Duration::seconds(secs)
}

fn error_rate_rule(threshold: f64, repeat: RepeatPolicy) -> ErrorRateRule {
    ErrorRateRule {
        name: "error-rate".into(),
        severity: Severity::Warning,
        threshold,
        repeat,
        silence_secs: 0,
        min_samples: 1,
    }
}

fn latency_rule(threshold: f64, repeat: RepeatPolicy) -> LatencyPercentileRule {
    LatencyPercentileRule {
        name: "p95-latency".into(),
        severity: Severity::Warning,
        percentile: 95.0,
        threshold,
        repeat,
        silence_secs: 0,
        min_samples: 1,
    }
}

fn streak_rule(threshold: u32) -> ConsecutiveFailureRule {
    ConsecutiveFailureRule {
        name: "consecutive-failures".into(),
        severity: Severity::Critical,
        threshold,
        repeat: RepeatPolicy::Once,
        silence_secs: 0,
    }
}

fn monitor(window_secs: u64, rules: Vec<Box<dyn AlertRule>>) -> StreamMonitor {
    StreamMonitor::new(
        WindowAggregator::new(window_secs).unwrap(),
        RuleEvaluator::new(rules).unwrap(),
        TimeSource::EventTime,
    )
}

/// Feeds one event per second starting at `start`; `F` = fail, `R` =
/// retry, anything else = success. Returns every alert emitted.
fn feed(m: &StreamMonitor, start: i64, pattern: &str) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for (i, c) in pattern.chars().enumerate() {
        let ts = at(start + i as i64);
        let event = match c {
            'F' => EventRecord::fail(ts, 0.1, "E_DB_TIMEOUT"),
            'R' => EventRecord::retry(ts, 0.1),
            _ => EventRecord::success(ts, 0.1),
        };
        alerts.extend(m.ingest(event).unwrap());
    }
    alerts
}

// ── Window ──

#[test]
fn window_holds_only_events_within_the_horizon() {
    let mut agg = WindowAggregator::new(60).unwrap();
    let mut ts = base();
    let mut ingested = Vec::new();

    for i in 0..500u32 {
        // irregular gaps, including ties
        ts += Duration::milliseconds(i64::from(i % 7) * 900);
        agg.ingest(EventRecord::success(ts, f64::from(i))).unwrap();
        ingested.push(ts);

        let horizon = agg.latest_timestamp().unwrap() - Duration::seconds(60);
        assert!(agg.events().all(|e| e.timestamp >= horizon));

        let expected = ingested.iter().filter(|t| **t >= horizon).count();
        assert_eq!(agg.len(), expected);
        assert_eq!(agg.snapshot().total, expected);
    }
    assert_eq!(agg.evicted() as usize + agg.len(), ingested.len());
}

#[test]
fn evicted_events_never_reappear() {
    let mut agg = WindowAggregator::new(10).unwrap();
    agg.ingest(EventRecord::new(at(0), Outcome::Fail, 9.0)).unwrap();
    agg.ingest(EventRecord::success(at(5), 0.1)).unwrap();
    agg.ingest(EventRecord::success(at(11), 0.1)).unwrap();

    let snap = agg.snapshot();
    assert_eq!(snap.total, 2);
    assert_eq!(snap.fail_count, 0);
    assert_eq!(snap.window_start, Some(at(5)));
    assert!(!snap.sorted_durations().contains(&9.0));

    agg.ingest(EventRecord::success(at(11), 0.2)).unwrap();
    assert!(!agg.snapshot().sorted_durations().contains(&9.0));
}

#[test]
fn event_exactly_on_the_horizon_is_kept() {
    let mut agg = WindowAggregator::new(10).unwrap();
    agg.ingest(EventRecord::success(at(0), 0.1)).unwrap();
    agg.ingest(EventRecord::success(at(10), 0.1)).unwrap();
    assert_eq!(agg.len(), 2);
    agg.ingest(EventRecord::success(at(11), 0.1)).unwrap();
    assert_eq!(agg.len(), 2);
}

#[test]
fn equal_timestamps_are_accepted() {
    let mut agg = WindowAggregator::new(300).unwrap();
    for _ in 0..3 {
        agg.ingest(EventRecord::success(at(0), 0.1)).unwrap();
    }
    assert_eq!(agg.snapshot().total, 3);
}

#[test]
fn out_of_order_event_is_rejected_without_touching_state() {
    let mut agg = WindowAggregator::new(300).unwrap();
    agg.ingest(EventRecord::success(at(10), 0.1)).unwrap();
    agg.ingest(EventRecord::fail(at(20), 0.2, "E_API_429")).unwrap();
    let before = agg.snapshot();

    let err = agg
        .ingest(EventRecord::fail(at(15), 0.3, "E_NET_RESET"))
        .unwrap_err();
    assert!(matches!(err, AlertError::MalformedInput { field: "ts", .. }));
    assert_eq!(agg.snapshot(), before);
    assert_eq!(agg.latest_timestamp(), Some(at(20)));
}

#[test]
fn invalid_durations_and_stray_error_codes_are_rejected() {
    let mut agg = WindowAggregator::new(300).unwrap();

    let err = agg.ingest(EventRecord::success(at(0), -0.5)).unwrap_err();
    assert!(matches!(err, AlertError::MalformedInput { field: "duration_sec", .. }));

    let err = agg.ingest(EventRecord::success(at(0), f64::NAN)).unwrap_err();
    assert!(matches!(err, AlertError::MalformedInput { field: "duration_sec", .. }));

    let mut stray = EventRecord::success(at(0), 0.1);
    stray.error_code = Some("E_DB_TIMEOUT".into());
    let err = agg.ingest(stray).unwrap_err();
    assert!(matches!(err, AlertError::MalformedInput { field: "error_code", .. }));

    assert!(agg.is_empty());
    assert_eq!(agg.latest_timestamp(), None);
}

#[test]
fn zero_duration_is_valid() {
    let mut agg = WindowAggregator::new(300).unwrap();
    agg.ingest(EventRecord::success(at(0), 0.0)).unwrap();
    assert_eq!(agg.snapshot().p95_duration, Some(0.0));
}

#[test]
fn p95_uses_nearest_rank_and_is_deterministic() {
    let mut agg = WindowAggregator::new(300).unwrap();
    // shuffled 1..=20
    for (i, d) in [7, 3, 20, 1, 15, 9, 12, 18, 2, 5, 11, 19, 4, 16, 8, 14, 6, 17, 10, 13]
        .into_iter()
        .enumerate()
    {
        agg.ingest(EventRecord::success(at(i as i64), f64::from(d)))
            .unwrap();
    }

    let first = agg.snapshot();
    let second = agg.snapshot();
    assert_eq!(first.p95_duration, Some(19.0));
    assert_eq!(first.p95_duration, second.p95_duration);
    assert_eq!(first.percentile(50.0), Some(10.0));
    assert_eq!(first.percentile(100.0), Some(20.0));
    assert_eq!(first.mean_duration, Some(10.5));
}

#[test]
fn p95_of_a_single_event_is_that_event() {
    let mut agg = WindowAggregator::new(300).unwrap();
    agg.ingest(EventRecord::success(at(0), 0.42)).unwrap();
    assert_eq!(agg.snapshot().p95_duration, Some(0.42));
}

#[test]
fn error_rate_counts_failures_only() {
    let mut agg = WindowAggregator::new(3600).unwrap();
    for i in 0..100 {
        let ts = at(i);
        let event = match i {
            10 | 50 | 90 => EventRecord::fail(ts, 0.2, "E_DB_TIMEOUT"),
            20..=26 => EventRecord::retry(ts, 0.2),
            _ => EventRecord::success(ts, 0.2),
        };
        agg.ingest(event).unwrap();
    }
    let snap = agg.snapshot();
    assert_eq!(snap.total, 100);
    assert_eq!(snap.fail_count, 3);
    assert_eq!(snap.retry_count, 7);
    assert_eq!(snap.success_count, 90);
    assert!((snap.error_rate.unwrap() - 0.03).abs() < 1e-12);
    assert_eq!(snap.error_codes.get("E_DB_TIMEOUT"), Some(&3));
}

#[test]
fn streaks_track_trailing_run_and_window_maximum() {
    let mut agg = WindowAggregator::new(300).unwrap();
    for (i, c) in "FFFSFRFF".chars().enumerate() {
        let ts = at(i as i64);
        let event = match c {
            'F' => EventRecord::fail(ts, 0.1, "E_API_429"),
            'R' => EventRecord::retry(ts, 0.1),
            _ => EventRecord::success(ts, 0.1),
        };
        agg.ingest(event).unwrap();
    }
    let snap = agg.snapshot();
    assert_eq!(snap.current_consecutive_failures, 2);
    assert_eq!(snap.max_consecutive_failures_in_window, 3);
    assert_eq!(snap.current_streak_start, Some(6));
}

#[test]
fn streak_spanning_an_eviction_is_undercounted() {
    let mut agg = WindowAggregator::new(3).unwrap();
    for i in 0..6 {
        agg.ingest(EventRecord::fail(at(i), 0.1, "E_DB_TIMEOUT"))
            .unwrap();
    }
    let snap = agg.snapshot();
    // only t=2..=5 are still buffered
    assert_eq!(snap.current_consecutive_failures, 4);
    assert_eq!(snap.max_consecutive_failures_in_window, 4);
    assert_eq!(snap.current_streak_start, Some(0));
}

#[test]
fn empty_window_reports_undefined_statistics() {
    let agg = WindowAggregator::new(300).unwrap();
    let snap = agg.snapshot();
    assert_eq!(snap.total, 0);
    assert!(snap.is_empty());
    assert_eq!(snap.error_rate, None);
    assert_eq!(snap.p95_duration, None);
    assert_eq!(snap.mean_duration, None);
    assert_eq!(snap.current_consecutive_failures, 0);
}

#[test]
fn advance_evicts_without_new_events_and_never_rewinds() {
    let mut agg = WindowAggregator::new(60).unwrap();
    agg.ingest(EventRecord::fail(at(0), 0.1, "E_DB_TIMEOUT")).unwrap();
    agg.ingest(EventRecord::success(at(30), 0.1)).unwrap();

    agg.advance(at(75));
    assert_eq!(agg.len(), 1);
    agg.advance(at(10));
    assert_eq!(agg.len(), 1);
    agg.advance(at(200));
    assert!(agg.snapshot().is_empty());
    assert_eq!(agg.evicted(), 2);
}

// ── Rules & evaluator ──

#[test]
fn error_rate_once_fires_exactly_once_on_crossing() {
    let m = monitor(3600, vec![Box::new(error_rate_rule(0.02, RepeatPolicy::Once))]);
    let pattern = format!("{}FFF", "S".repeat(97));
    let alerts = feed(&m, 0, &pattern);

    assert_eq!(alerts.len(), 1);
    // 1/98 stays under 2%, 2/99 crosses it
    assert!((alerts[0].observed_value - 2.0 / 99.0).abs() < 1e-12);
    assert_eq!(alerts[0].timestamp, at(98));
    assert_eq!(alerts[0].rule_kind, RuleKind::ErrorRate);
    assert!(alerts[0].message.starts_with("Error rate 2.02% over last 1 hour"));
    assert!((m.snapshot().error_rate.unwrap() - 0.03).abs() < 1e-12);
    assert!(m.alert_state("error-rate").unwrap().is_active);
}

#[test]
fn error_rate_every_evaluation_fires_each_breached_cycle() {
    let m = monitor(
        3600,
        vec![Box::new(error_rate_rule(0.02, RepeatPolicy::EveryEvaluation))],
    );
    let pattern = format!("{}FFF", "S".repeat(97));
    let alerts = feed(&m, 0, &pattern);
    assert_eq!(alerts.len(), 2);
    assert_eq!(m.alert_state("error-rate").unwrap().fire_count, 2);
}

#[test]
fn once_rule_refires_after_the_condition_clears() {
    let m = monitor(3600, vec![Box::new(error_rate_rule(0.25, RepeatPolicy::Once))]);

    assert_eq!(feed(&m, 0, "SF").len(), 1); // 50%
    assert_eq!(feed(&m, 2, "F").len(), 0); // still breached
    assert_eq!(feed(&m, 3, "SSSSSS").len(), 0); // 2/9, cleared
    assert!(!m.alert_state("error-rate").unwrap().is_active);
    assert_eq!(feed(&m, 9, "FF").len(), 1); // 3/10, breached again
}

#[test]
fn every_evaluation_respects_silence_period() {
    let mut rule = error_rate_rule(0.1, RepeatPolicy::EveryEvaluation);
    rule.silence_secs = 10;
    let m = monitor(3600, vec![Box::new(rule)]);

    let alerts = feed(&m, 0, &"F".repeat(25));
    let times: Vec<_> = alerts.iter().map(|a| a.timestamp).collect();
    assert_eq!(times, vec![at(0), at(10), at(20)]);
}

#[test]
fn latency_rule_breaches_on_tail_and_clears() {
    let m = monitor(3600, vec![Box::new(latency_rule(0.30, RepeatPolicy::Once))]);
    for i in 0..19 {
        assert!(m.ingest(EventRecord::success(at(i), 0.1)).unwrap().is_empty());
    }
    // 20 events, p95 is the 19th smallest: still 0.1
    assert!(m.ingest(EventRecord::success(at(19), 0.9)).unwrap().is_empty());
    // 21 events, rank ceil(19.95) = 20: the slow event
    let alerts = m.ingest(EventRecord::success(at(20), 0.8)).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].observed_value, 0.8);
    assert_eq!(
        alerts[0].message,
        "P95 duration 0.800s over last 1 hour (threshold 0.300s)"
    );
    assert!((alerts[0].threshold - 0.30).abs() < f64::EPSILON);
}

#[test]
fn five_failures_then_success_fire_once() {
    let m = monitor(300, vec![Box::new(streak_rule(5))]);
    let alerts = feed(&m, 0, "FFFFFS");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].observed_value, 5.0);
    assert_eq!(alerts[0].severity, Severity::Critical);
    assert!(alerts[0]
        .message
        .starts_with("Consecutive failures observed: 5 (threshold 5)"));
    // one-shot: not left active
    assert!(!m.alert_state("consecutive-failures").unwrap().is_active);
}

#[test]
fn four_failures_fire_nothing() {
    let m = monitor(300, vec![Box::new(streak_rule(5))]);
    assert!(feed(&m, 0, "FFFFS").is_empty());
    assert!(m.alert_state("consecutive-failures").is_none());
}

#[test]
fn two_separate_streaks_fire_twice() {
    let m = monitor(300, vec![Box::new(streak_rule(5))]);
    assert_eq!(feed(&m, 0, "FFFFFSFFFFF").len(), 2);
}

#[test]
fn a_long_streak_fires_once() {
    let m = monitor(300, vec![Box::new(streak_rule(5))]);
    assert_eq!(feed(&m, 0, "FFFFFFFFFFFF").len(), 1);
}

#[test]
fn a_streak_outliving_the_window_is_still_one_streak() {
    let m = monitor(10, vec![Box::new(streak_rule(5))]);
    assert_eq!(feed(&m, 0, &"F".repeat(40)).len(), 1);
}

#[test]
fn failures_after_the_window_empties_start_a_new_streak() {
    let m = monitor(300, vec![Box::new(streak_rule(5))]);
    assert_eq!(feed(&m, 0, "FFFFF").len(), 1);
    let first = m.snapshot().current_streak_start;

    // An hour of silence ages every earlier failure out.
    let later = feed(&m, 3600, "FFFFF");
    assert_eq!(later.len(), 1);
    let snap = m.snapshot();
    assert_eq!(snap.total, 5);
    assert_eq!(snap.current_consecutive_failures, 5);
    assert_eq!(snap.current_streak_start, Some(5));
    assert_ne!(snap.current_streak_start, first);
}

#[test]
fn alert_ids_are_unique_snowflakes() {
    let m = monitor(
        300,
        vec![Box::new(error_rate_rule(0.1, RepeatPolicy::EveryEvaluation))],
    );
    let alerts = feed(&m, 0, &"F".repeat(500));
    assert_eq!(alerts.len(), 500);

    let mut ids = std::collections::HashSet::new();
    for alert in &alerts {
        assert!(
            alert.id.parse::<i64>().is_ok(),
            "id should be a valid i64: {}",
            alert.id
        );
        assert!(ids.insert(alert.id.clone()), "Duplicate ID generated");
    }
}

#[test]
fn monitor_accepts_a_window_beyond_the_calendar() {
    let m = monitor(10_000_000_000_000, vec![Box::new(streak_rule(3))]);
    assert_eq!(feed(&m, 0, "SFFF").len(), 1);
    assert_eq!(m.snapshot().total, 4);
    assert_eq!(m.evicted(), 0);
}

#[test]
fn streak_rule_with_repeat_fires_every_cycle() {
    let mut rule = streak_rule(3);
    rule.repeat = RepeatPolicy::EveryEvaluation;
    let m = monitor(300, vec![Box::new(rule)]);
    assert_eq!(feed(&m, 0, "FFFFF").len(), 3);
}

#[test]
fn retry_breaks_a_streak() {
    let m = monitor(300, vec![Box::new(streak_rule(3))]);
    assert!(feed(&m, 0, "FFRFF").is_empty());
}

#[test]
fn empty_window_skips_rate_and_latency_rules_without_touching_state() {
    let clock = Arc::new(ManualClock::new(at(0)));
    let m = StreamMonitor::new(
        WindowAggregator::new(60).unwrap(),
        RuleEvaluator::new(vec![
            Box::new(error_rate_rule(0.1, RepeatPolicy::Once)),
            Box::new(latency_rule(0.3, RepeatPolicy::Once)),
        ])
        .unwrap(),
        TimeSource::Clock(clock.clone()),
    );

    let alerts = m.ingest(EventRecord::fail(at(0), 0.5, "E_DB_TIMEOUT")).unwrap();
    assert_eq!(alerts.len(), 2);

    clock.advance(Duration::seconds(120));
    assert!(m.tick().unwrap().is_empty());
    assert_eq!(m.snapshot().total, 0);
    // skipped, not cleared
    assert!(m.alert_state("error-rate").unwrap().is_active);
    assert!(m.alert_state("p95-latency").unwrap().is_active);
    assert_eq!(m.evicted(), 1);
}

#[test]
fn min_samples_defers_rate_rules() {
    let mut rule = error_rate_rule(0.1, RepeatPolicy::Once);
    rule.min_samples = 10;
    let m = monitor(300, vec![Box::new(rule)]);
    assert!(feed(&m, 0, "FFFFFFFFF").is_empty());
    assert_eq!(feed(&m, 9, "F").len(), 1);
}

#[test]
fn alerts_follow_rule_order() {
    let m = monitor(
        300,
        vec![
            Box::new(streak_rule(1)),
            Box::new(latency_rule(0.05, RepeatPolicy::Once)),
            Box::new(error_rate_rule(0.5, RepeatPolicy::Once)),
        ],
    );
    let alerts = feed(&m, 0, "F");
    let names: Vec<_> = alerts.iter().map(|a| a.rule_name.as_str()).collect();
    assert_eq!(names, vec!["consecutive-failures", "p95-latency", "error-rate"]);
}

#[test]
fn tick_with_event_time_reevaluates_in_place() {
    let m = monitor(
        300,
        vec![Box::new(error_rate_rule(0.1, RepeatPolicy::EveryEvaluation))],
    );
    assert!(m.tick().unwrap().is_empty());
    assert_eq!(feed(&m, 0, "F").len(), 1);
    let again = m.tick().unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].timestamp, at(0));
}

#[test]
fn malformed_snapshot_is_an_internal_error() {
    let mut agg = WindowAggregator::new(300).unwrap();
    agg.ingest(EventRecord::success(at(0), 0.1)).unwrap();
    let mut evaluator =
        RuleEvaluator::new(vec![Box::new(error_rate_rule(0.1, RepeatPolicy::Once))]).unwrap();

    let mut snap = agg.snapshot();
    snap.fail_count = 5;
    assert!(matches!(
        evaluator.evaluate(&snap, at(0)),
        Err(AlertError::MalformedSnapshot(_))
    ));

    let mut snap = agg.snapshot();
    snap.error_rate = Some(1.5);
    snap.success_count = 1;
    assert!(matches!(
        evaluator.evaluate(&snap, at(0)),
        Err(AlertError::MalformedSnapshot(_))
    ));

    let mut snap = agg.snapshot();
    snap.current_consecutive_failures = 2;
    assert!(matches!(
        evaluator.evaluate(&snap, at(0)),
        Err(AlertError::MalformedSnapshot(_))
    ));

    assert!(evaluator.state("error-rate").is_none());
}

#[test]
fn concurrent_producers_are_serialized() {
    let m = Arc::new(monitor(300, vec![Box::new(streak_rule(1_000_000))]));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let m = Arc::clone(&m);
            std::thread::spawn(move || {
                for _ in 0..250 {
                    m.ingest(EventRecord::success(at(0), 0.1)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let snap = m.snapshot();
    assert_eq!(snap.total, 1000);
    assert_eq!(snap.success_count, 1000);
}

// ── Configuration ──

#[test]
fn invalid_rules_are_rejected_at_construction() {
    let bad: Vec<Box<dyn AlertRule>> = vec![Box::new(error_rate_rule(0.0, RepeatPolicy::Once))];
    assert!(matches!(
        RuleEvaluator::new(bad),
        Err(AlertError::InvalidRule { .. })
    ));

    let bad: Vec<Box<dyn AlertRule>> = vec![Box::new(error_rate_rule(1.5, RepeatPolicy::Once))];
    assert!(RuleEvaluator::new(bad).is_err());

    let mut l = latency_rule(0.3, RepeatPolicy::Once);
    l.percentile = 120.0;
    assert!(RuleEvaluator::new(vec![Box::new(l)]).is_err());

    let l = latency_rule(-1.0, RepeatPolicy::Once);
    assert!(RuleEvaluator::new(vec![Box::new(l)]).is_err());

    let err = RuleEvaluator::new(vec![Box::new(streak_rule(0))])
        .err()
        .unwrap();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("consecutive-failures"));
}

#[test]
fn duplicate_rule_names_are_rejected() {
    let err = RuleEvaluator::new(vec![Box::new(streak_rule(5)), Box::new(streak_rule(3))])
        .err()
        .unwrap();
    assert_eq!(err, AlertError::DuplicateRule("consecutive-failures".into()));
}

#[test]
fn rule_configs_parse_from_toml() {
    #[derive(serde::Deserialize)]
    struct File {
        rules: Vec<RuleConfig>,
    }

    let file: File = toml::from_str(
        r#"
        [[rules]]
        name = "errors"
        kind = "error_rate"
        threshold = 0.05
        repeat = "once"

        [[rules]]
        name = "slow"
        kind = "latency_percentile"
        threshold = 1
        silence_secs = 30

        [[rules]]
        name = "streak"
        kind = "consecutive_failure"
        threshold = 3
        severity = "info"
        "#,
    )
    .unwrap();

    assert_eq!(file.rules[0].params, RuleParams::ErrorRate { threshold: 0.05 });
    assert_eq!(file.rules[0].repeat, Some(RepeatPolicy::Once));
    assert_eq!(
        file.rules[1].params,
        RuleParams::LatencyPercentile {
            percentile: 95.0,
            threshold: 1.0
        }
    );
    assert_eq!(file.rules[1].silence_secs, 30);

    let evaluator = RuleEvaluator::from_config(&file.rules).unwrap();
    let rules = evaluator.rules();
    assert_eq!(rules[0].repeat(), RepeatPolicy::Once);
    assert_eq!(rules[1].repeat(), RepeatPolicy::EveryEvaluation);
    assert_eq!(rules[2].repeat(), RepeatPolicy::Once);
    assert_eq!(rules[2].severity(), Severity::Info);
    assert_eq!(rules[2].kind(), RuleKind::ConsecutiveFailure);
}

#[test]
fn unknown_rule_kind_fails_to_parse() {
    let parsed: Result<RuleConfig, _> = toml::from_str(
        r#"
        name = "x"
        kind = "throughput"
        threshold = 1
        "#,
    );
    assert!(parsed.is_err());
}

#[test]
fn default_rules_match_the_batch_alert_thresholds() {
    let rules = default_rules();
    let monitor = StreamMonitor::from_config(300, &rules, TimeSource::EventTime).unwrap();
    assert_eq!(
        monitor.rule_names(),
        vec!["error-rate", "p95-latency", "consecutive-failures"]
    );
    assert_eq!(monitor.window_secs(), 300);

    let silences: Vec<u64> = rules.iter().map(|r| r.silence_secs).collect();
    assert_eq!(silences, vec![60, 60, 0]);
}

#[test]
fn default_rules_space_out_a_sustained_outage() {
    let m = StreamMonitor::from_config(300, &default_rules(), TimeSource::EventTime).unwrap();
    let alerts = feed(&m, 0, &"F".repeat(121));

    let rate_times: Vec<_> = alerts
        .iter()
        .filter(|a| a.rule_name == "error-rate")
        .map(|a| a.timestamp)
        .collect();
    assert_eq!(rate_times, vec![at(0), at(60), at(120)]);
    let streak_alerts = alerts
        .iter()
        .filter(|a| a.rule_name == "consecutive-failures")
        .count();
    assert_eq!(streak_alerts, 1);
    assert_eq!(alerts.len(), 4);
}
