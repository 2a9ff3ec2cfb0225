use crate::config::{FeedConfig, ServerConfig};
use batchwatch_alert::monitor::StreamMonitor;
use batchwatch_alert::window::{describe_window, WindowSnapshot};
use batchwatch_alert::AlertError;
use batchwatch_common::types::{Alert, EventRecord};
use batchwatch_notify::dispatcher::{AlertDispatcher, DispatchStats};
use batchwatch_notify::plugin::SinkRegistry;
use batchwatch_storage::jsonl::{JsonlReplay, JsonlTail};
use batchwatch_storage::{EventFeed, StorageError};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};

const FEED_BUFFER: usize = 1024;

/// What happened during one run of the monitor.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Events accepted into the window.
    pub events: u64,
    /// Events refused by the aggregator (out of order, bad duration).
    pub rejected: u64,
    /// Lines of the log that were not valid event records.
    pub unparseable: u64,
    pub alerts: u64,
    pub final_snapshot: WindowSnapshot,
    pub dispatch: DispatchStats,
}

/// Opens the feed described by `config`.
pub async fn open_feed(config: &FeedConfig) -> anyhow::Result<Box<dyn EventFeed>> {
    let feed: Box<dyn EventFeed> = if config.follow {
        Box::new(JsonlTail::open(&config.path, config.poll_interval(), config.from_start).await?)
    } else {
        Box::new(JsonlReplay::open(&config.path).await?)
    };
    Ok(feed)
}

/// Runs the monitor described by `config` until the feed ends or `shutdown`
/// resolves, then flushes the alert queue.
pub async fn run(config: &ServerConfig, shutdown: impl Future<Output = ()>) -> anyhow::Result<RunSummary> {
    let monitor = config.build_monitor()?;
    let sinks = SinkRegistry::default().build_all(&config.sinks)?;
    let feed = open_feed(&config.feed).await?;

    tracing::info!(
        feed = %feed.describe(),
        window = %describe_window(config.window_secs),
        rules = ?monitor.rule_names(),
        sinks = sinks.len(),
        "Monitor started"
    );

    let dispatcher = AlertDispatcher::spawn(sinks, config.dispatch_queue);
    let result = drive(&monitor, feed, &dispatcher, config.tick_interval(), shutdown).await;
    let dispatch = dispatcher.shutdown().await;

    let mut summary = result?;
    summary.dispatch = dispatch;
    log_summary(&summary);
    Ok(summary)
}

/// Pumps `feed` through `monitor`, handing alerts to `dispatcher`.
///
/// The feed is read on its own task so a tick or shutdown never interrupts
/// a half-read line. Unparseable lines and rejected events are logged and
/// skipped; an inconsistent snapshot or an I/O failure ends the run.
pub async fn drive(
    monitor: &StreamMonitor,
    feed: Box<dyn EventFeed>,
    dispatcher: &AlertDispatcher,
    tick: Option<Duration>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<RunSummary> {
    let (tx, mut rx) = mpsc::channel(FEED_BUFFER);
    let pump = tokio::spawn(pump_feed(feed, tx));

    let mut ticker = tick.map(|period| {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    tokio::pin!(shutdown);

    let mut summary = RunSummary::default();
    let outcome: anyhow::Result<()> = loop {
        tokio::select! {
            item = rx.recv() => match item {
                Some(Ok(event)) => {
                    if let Err(e) = handle_event(monitor, dispatcher, event, &mut summary) {
                        break Err(e);
                    }
                }
                Some(Err(e)) if e.is_recoverable() => {
                    summary.unparseable += 1;
                    tracing::warn!(error = %e, "Skipping unparseable event record");
                }
                Some(Err(e)) => break Err(e.into()),
                None => {
                    tracing::info!("Event feed exhausted");
                    break Ok(());
                }
            },
            _ = next_tick(&mut ticker) => match monitor.tick() {
                Ok(alerts) => publish(dispatcher, alerts, &mut summary),
                Err(e) => break Err(e.into()),
            },
            _ = &mut shutdown => {
                tracing::info!("Shutting down gracefully");
                break Ok(());
            }
        }
    };
    pump.abort();

    outcome?;
    summary.final_snapshot = monitor.snapshot();
    Ok(summary)
}

fn handle_event(
    monitor: &StreamMonitor,
    dispatcher: &AlertDispatcher,
    event: EventRecord,
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    match monitor.ingest(event) {
        Ok(alerts) => {
            summary.events += 1;
            publish(dispatcher, alerts, summary);
            Ok(())
        }
        Err(e @ AlertError::MalformedInput { .. }) => {
            summary.rejected += 1;
            tracing::warn!(error = %e, "Rejected event");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn publish(dispatcher: &AlertDispatcher, alerts: Vec<Alert>, summary: &mut RunSummary) {
    for alert in alerts {
        summary.alerts += 1;
        tracing::info!(
            rule = %alert.rule_name,
            severity = %alert.severity,
            observed = alert.observed_value,
            "Alert raised"
        );
        dispatcher.dispatch(alert);
    }
}

async fn pump_feed(
    mut feed: Box<dyn EventFeed>,
    tx: mpsc::Sender<Result<EventRecord, StorageError>>,
) {
    loop {
        let item = match feed.next_event().await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => return,
            Err(e) => Err(e),
        };
        let fatal = matches!(&item, Err(e) if !e.is_recoverable());
        if tx.send(item).await.is_err() || fatal {
            return;
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn log_summary(summary: &RunSummary) {
    let snap = &summary.final_snapshot;
    if snap.is_empty() {
        tracing::info!(
            events = summary.events,
            alerts = summary.alerts,
            "Run finished, window empty"
        );
        return;
    }
    tracing::info!(
        events = summary.events,
        rejected = summary.rejected,
        unparseable = summary.unparseable,
        alerts = summary.alerts,
        delivered = summary.dispatch.delivered,
        failed = summary.dispatch.failed,
        dropped = summary.dispatch.dropped,
        "Run finished"
    );
    tracing::info!(
        window = %describe_window(snap.window_secs),
        total = snap.total,
        fails = snap.fail_count,
        retries = snap.retry_count,
        error_rate = ?snap.error_rate,
        p95 = ?snap.p95_duration,
        current_streak = snap.current_consecutive_failures,
        max_streak = snap.max_consecutive_failures_in_window,
        "Final window"
    );
}
