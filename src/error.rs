use thiserror::Error;

use crate::models::RunResult;

/// Type alias for Result with FilterFoxError
pub type Result<T> = std::result::Result<T, FilterFoxError>;

/// Error types for the FilterFox triage pipeline and its Gmail adapter
#[derive(Error, Debug)]
pub enum FilterFoxError {
    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded - should retry after specified seconds
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Resource already exists (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Gmail returned a message we could not interpret
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Label lookup or creation failed
    #[error("Label error: {0}")]
    LabelError(String),

    /// IO error (config, history and token files)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error, raised before any mailbox call is made
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A mailbox call failed part-way through a run. `partial` holds what
    /// was recorded before the failure; nothing already applied is rolled back.
    #[error(
        "Run aborted at message {message_id} ({} classified, {} applied before failure): {source}",
        .partial.classified,
        .partial.applied
    )]
    RunAborted {
        message_id: String,
        partial: Box<RunResult>,
        #[source]
        source: Box<FilterFoxError>,
    },
}

impl FilterFoxError {
    /// Check if the error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            FilterFoxError::RateLimitExceeded { .. }
            | FilterFoxError::ServerError { .. }
            | FilterFoxError::NetworkError(_) => true,
            FilterFoxError::RunAborted { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Check if the error is permanent and should not be retried
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Parse the Retry-After header from an HTTP response
///
/// Accepts both delay-seconds ("120") and HTTP-date forms. Falls back to
/// 5 seconds when the header is missing, malformed, or in the past.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    let Some(value) = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
    else {
        return DEFAULT_RETRY_AFTER;
    };

    if let Ok(seconds) = value.parse::<u64>() {
        return seconds;
    }

    httpdate::parse_http_date(value)
        .ok()
        .and_then(|when| when.duration_since(std::time::SystemTime::now()).ok())
        .map(|wait| wait.as_secs())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl From<google_gmail1::Error> for FilterFoxError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );

                match status_code {
                    429 => FilterFoxError::RateLimitExceeded {
                        retry_after: parse_retry_after_header(response),
                    },
                    404 => FilterFoxError::NotFound(message),
                    400 => FilterFoxError::BadRequest(message),
                    401 => FilterFoxError::AuthError(message),
                    403 => FilterFoxError::Forbidden(message),
                    409 => FilterFoxError::Conflict(message),
                    500..=599 => FilterFoxError::ServerError {
                        status: status_code,
                        message,
                    },
                    _ => FilterFoxError::ApiError(message),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => {
                FilterFoxError::BadRequest(format!("{}", err))
            }
            google_gmail1::Error::HttpError(ref err) => {
                FilterFoxError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => FilterFoxError::NetworkError(err.to_string()),
            _ => FilterFoxError::ApiError(error.to_string()),
        }
    }
}
