/// Errors raised by the windowed alerting engine.
///
/// # Examples
///
/// ```rust
/// use batchwatch_alert::error::AlertError;
///
/// let err = AlertError::MalformedInput {
///     field: "duration_sec",
///     reason: "must be non-negative, got -1".to_string(),
/// };
/// assert!(err.to_string().contains("duration_sec"));
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlertError {
    /// An event was rejected at the ingest boundary and not folded into the
    /// window.
    #[error("Alert: malformed input in field '{field}': {reason}")]
    MalformedInput { field: &'static str, reason: String },

    /// The window duration is zero or not representable.
    #[error("Alert: invalid window: {0}")]
    InvalidWindow(String),

    /// A rule definition has an out-of-range parameter.
    #[error("Alert: invalid rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    /// Two rules share a name, so their alert state would collide.
    #[error("Alert: duplicate rule name '{0}'")]
    DuplicateRule(String),

    /// A snapshot violated its own invariants. This is a programming error
    /// in whatever produced the snapshot and must not be recovered from.
    #[error("Alert: internal error, malformed snapshot: {0}")]
    MalformedSnapshot(String),
}

impl AlertError {
    /// Whether the error is fatal to startup (as opposed to a rejected
    /// event, which the caller can log and skip).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidWindow(_) | Self::InvalidRule { .. } | Self::DuplicateRule(_)
        )
    }
}

/// Convenience `Result` alias for engine operations.
pub type Result<T> = std::result::Result<T, AlertError>;
