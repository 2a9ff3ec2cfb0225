use std::path::PathBuf;

/// Errors raised while reading or writing the event log.
///
/// # Examples
///
/// ```rust
/// use batchwatch_storage::error::StorageError;
///
/// let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
/// let err = StorageError::Parse { line: 42, source };
/// assert!(err.to_string().contains("line 42"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The log file could not be opened.
    #[error("Storage: cannot open event log '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading or appending failed after the log was opened.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line is not a valid event record. Only that line is affected.
    #[error("Storage: invalid event record on line {line}: {source}")]
    Parse {
        line: u64,
        source: serde_json::Error,
    },

    /// A line holds bytes that are not UTF-8. Only that line is affected.
    #[error("Storage: event record on line {line} is not valid UTF-8: {source}")]
    Encoding {
        line: u64,
        source: std::str::Utf8Error,
    },

    /// A record could not be serialized for appending.
    #[error("Storage: cannot encode event record: {0}")]
    Encode(serde_json::Error),
}

impl StorageError {
    /// Whether the feed can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Encoding { .. })
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
