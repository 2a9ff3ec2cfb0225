use crate::error::Result;
use crate::EventFeed;
use async_trait::async_trait;
use batchwatch_common::types::EventRecord;
use tokio::sync::mpsc;

/// Feed for in-process producers. Ends once every sender is dropped.
///
/// # Examples
///
/// ```rust
/// use batchwatch_storage::channel::ChannelFeed;
///
/// let (tx, feed) = ChannelFeed::bounded(64);
/// drop(tx);
/// # let _ = feed;
/// ```
pub struct ChannelFeed {
    rx: mpsc::Receiver<EventRecord>,
}

impl ChannelFeed {
    pub fn new(rx: mpsc::Receiver<EventRecord>) -> Self {
        Self { rx }
    }

    /// Creates a feed with a fresh channel of `capacity` and returns its
    /// sending half.
    pub fn bounded(capacity: usize) -> (mpsc::Sender<EventRecord>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl EventFeed for ChannelFeed {
    async fn next_event(&mut self) -> Result<Option<EventRecord>> {
        Ok(self.rx.recv().await)
    }

    fn describe(&self) -> String {
        "in-process channel".to_string()
    }
}
