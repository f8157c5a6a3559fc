//! vizgen error types

use std::time::Duration;

/// vizgen error types
///
/// The `Display` output of the network-class variants is the message shown
/// to the end user. Provider and transport detail is logged, never displayed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VizgenError {
    // Provider/network errors
    #[error("API key is invalid or expired, check your configuration")]
    Authentication,

    #[error(
        "the API rejected the request (HTTP {status}); the text may be too long or the \
         parameters unsupported. Shorten the text or try another model"
    )]
    InvalidRequest { status: u16 },

    #[error("API rate limit exceeded, please try again later")]
    RateLimited { retry_after: Option<Duration> },

    #[error("the model service is temporarily unavailable (HTTP {status}), please retry later")]
    Server { status: u16 },

    #[error("the request timed out, please retry")]
    Timeout,

    #[error("network connection failed, check your connection and retry")]
    Network { detail: String },

    #[error("the API returned a response in an unexpected format")]
    MalformedResponse,

    // Input errors
    #[error("input text is empty")]
    EmptyPrompt,

    #[error("input text is too long ({len} characters, at most {max} supported)")]
    InputTooLong { len: usize, max: usize },

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("history item not found: {0}")]
    HistoryItemNotFound(u64),

    // Configuration errors
    #[error("API key is not configured, set OPENROUTER_API_KEY")]
    MissingApiKey,

    #[error("configuration error: {0}")]
    Configuration(String),

    // Local storage errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("visualizer has been shut down")]
    ShutDown,
}

impl VizgenError {
    /// Whether the error is worth retrying.
    ///
    /// Credential, request and rate-limit failures are caused by the request
    /// itself, so they are returned to the caller on the first attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VizgenError::Server { .. }
                | VizgenError::Timeout
                | VizgenError::Network { .. }
                | VizgenError::MalformedResponse
        )
    }

    /// Map a non-success HTTP status to its error class.
    pub fn from_status(status: u16, retry_after: Option<Duration>) -> Self {
        match status {
            401 | 403 => VizgenError::Authentication,
            429 => VizgenError::RateLimited { retry_after },
            400..=499 => VizgenError::InvalidRequest { status },
            500..=599 => VizgenError::Server { status },
            other => VizgenError::Network {
                detail: format!("unexpected HTTP status {other}"),
            },
        }
    }

    /// Short machine-readable label, used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            VizgenError::Authentication => "authentication",
            VizgenError::InvalidRequest { .. } => "invalid_request",
            VizgenError::RateLimited { .. } => "rate_limited",
            VizgenError::Server { .. } => "server",
            VizgenError::Timeout => "timeout",
            VizgenError::Network { .. } => "network",
            VizgenError::MalformedResponse => "malformed_response",
            VizgenError::EmptyPrompt | VizgenError::InputTooLong { .. } => "input",
            VizgenError::TemplateNotFound(_) | VizgenError::HistoryItemNotFound(_) => "not_found",
            VizgenError::MissingApiKey | VizgenError::Configuration(_) => "configuration",
            VizgenError::Io(_) | VizgenError::Json(_) => "storage",
            VizgenError::ShutDown => "shut_down",
        }
    }
}

impl From<reqwest::Error> for VizgenError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VizgenError::Timeout
        } else if err.is_decode() {
            VizgenError::MalformedResponse
        } else if let Some(status) = err.status() {
            VizgenError::from_status(status.as_u16(), None)
        } else {
            VizgenError::Network {
                detail: err.to_string(),
            }
        }
    }
}

impl From<std::io::Error> for VizgenError {
    fn from(err: std::io::Error) -> Self {
        VizgenError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VizgenError {
    fn from(err: serde_json::Error) -> Self {
        VizgenError::Json(err.to_string())
    }
}

/// Result type alias for vizgen operations
pub type Result<T> = std::result::Result<T, VizgenError>;
