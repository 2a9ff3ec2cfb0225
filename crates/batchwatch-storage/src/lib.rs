//! Event feeds over the append-only JSONL event log.
//!
//! The batch worker writes one JSON object per completed unit of work to a
//! log file. [`jsonl::JsonlReplay`] reads such a file once (historical
//! evaluation), [`jsonl::JsonlTail`] follows it as it grows, and
//! [`channel::ChannelFeed`] takes events from an in-process producer.
//! [`jsonl::EventLogWriter`] appends records in the same format.

pub mod channel;
pub mod error;
pub mod jsonl;


use async_trait::async_trait;
use batchwatch_common::types::EventRecord;

pub use error::{Result, StorageError};

/// A source of event records in non-decreasing timestamp order.
///
/// Ordering is the producer's contract; the feed does not sort. A
/// [`StorageError::Parse`] only affects the line it names, and the next
/// call continues after it.
#[async_trait]
pub trait EventFeed: Send {
    /// Returns the next event, or `Ok(None)` once a finite feed is exhausted.
    /// Unbounded feeds wait for more data instead of returning `None`.
    ///
    /// # Errors
    ///
    /// I/O failures and unparseable records.
    async fn next_event(&mut self) -> Result<Option<EventRecord>>;

    /// Short description for log lines (e.g. the file path).
    fn describe(&self) -> String;
}
