use crate::AlertSink;
use batchwatch_common::types::Alert;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Delivery counters reported when a dispatcher shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Alerts taken off the queue.
    pub alerts: u64,
    /// Successful sink deliveries (an alert counts once per sink).
    pub delivered: u64,
    pub failed: u64,
    /// Alerts rejected because the queue was full.
    pub dropped: u64,
}

/// Hands alerts to the sinks on a background task.
///
/// [`dispatch`](Self::dispatch) never waits: when the bounded queue is full
/// the alert is dropped with a warning so ingestion is not held up by a slow
/// sink. Each alert goes to every sink in order; failures are logged and not
/// retried here.
pub struct AlertDispatcher {
    tx: mpsc::Sender<Alert>,
    worker: JoinHandle<DispatchStats>,
    dropped: Arc<AtomicU64>,
}

impl AlertDispatcher {
    /// Starts the delivery task. Must be called inside a tokio runtime.
    pub fn spawn(sinks: Vec<Box<dyn AlertSink>>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(deliver(sinks, rx));
        Self {
            tx,
            worker,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queues `alert` for delivery. Returns `false` if it was dropped.
    pub fn dispatch(&self, alert: Alert) -> bool {
        match self.tx.try_send(alert) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(alert)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    rule = %alert.rule_name,
                    alert_id = %alert.id,
                    "Alert queue full, dropping alert"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(alert)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!(rule = %alert.rule_name, "Alert delivery task has stopped");
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Closes the queue, waits for queued alerts to be delivered and returns
    /// the counters.
    pub async fn shutdown(self) -> DispatchStats {
        let Self {
            tx,
            worker,
            dropped,
        } = self;
        drop(tx);
        let mut stats = match worker.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(error = %e, "Alert delivery task panicked");
                DispatchStats::default()
            }
        };
        stats.dropped = dropped.load(Ordering::Relaxed);
        stats
    }
}

async fn deliver(sinks: Vec<Box<dyn AlertSink>>, mut rx: mpsc::Receiver<Alert>) -> DispatchStats {
    let mut stats = DispatchStats::default();
    while let Some(alert) = rx.recv().await {
        stats.alerts += 1;
        for sink in &sinks {
            match sink.emit(&alert).await {
                Ok(()) => stats.delivered += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(
                        sink = sink.sink_name(),
                        rule = %alert.rule_name,
                        error = %e,
                        "Failed to deliver alert"
                    );
                }
            }
        }
    }
    stats
}
