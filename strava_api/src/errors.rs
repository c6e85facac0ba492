//! Error types for the API client.

/// Errors that can occur when making API requests.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request URL could not be constructed from the base URL and path.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
    /// The request never produced an HTTP response (connect failure, timeout, reset).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The access token was missing, expired, or lacks the required scope.
    #[error("Access token rejected (HTTP 401)")]
    Unauthorized,
    /// The provider's rate limit was exceeded.
    #[error("Rate limited by provider (HTTP 429)")]
    RateLimited,
    /// The API returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus { status: u16, body: String },
    /// The response body was not the expected JSON shape.
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl Error {
    /// Whether retrying the same request later could succeed.
    ///
    /// Timeouts, connection failures, 429 and 5xx responses are transient.
    /// Authorization failures, other 4xx responses and parse errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::RateLimited => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            Self::InvalidUrl(_) | Self::Unauthorized | Self::Parse(_) => false,
        }
    }
}
