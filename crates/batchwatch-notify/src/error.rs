/// Errors that can occur while building or driving alert sinks.
///
/// # Examples
///
/// ```rust
/// use batchwatch_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("webhook: missing url".to_string());
/// assert!(err.to_string().contains("missing url"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Sink configuration is missing a required field or contains an invalid value.
    #[error("Notify: invalid sink configuration: {0}")]
    InvalidConfig(String),

    /// The sink type is not registered in the plugin registry.
    #[error("Notify: unknown sink type '{0}'")]
    UnknownSinkType(String),

    /// An HTTP request to a webhook endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notify: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Notify: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The endpoint answered with a non-success status.
    #[error("Notify: API error from {service}: status={status}, body={body}")]
    ApiError {
        service: String,
        status: u16,
        body: String,
    },
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
