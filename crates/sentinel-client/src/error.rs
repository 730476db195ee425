//! Error types for the Sentinel client.

/// All errors that can occur when talking to the Sentinel API.
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    /// Invalid client configuration.
    #[error("sentinel config error: {0}")]
    Config(String),

    /// Authentication or authorization failed (401/403).
    #[error("sentinel auth error ({status_code}): {message}")]
    Auth {
        /// HTTP status code.
        status_code: u16,
        /// Error message from the API.
        message: String,
    },

    /// The requested resource does not exist (404).
    #[error("\"{resource}\" not found: {message}")]
    NotFound {
        /// Identifier of the missing resource.
        resource: String,
        /// Error message from the API.
        message: String,
    },

    /// API returned any other non-success status.
    #[error("sentinel API error {status_code}: {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message from the API.
        message: String,
    },

    /// Request timed out.
    #[error("sentinel request timed out")]
    Timeout,

    /// Network or HTTP client error.
    #[error("sentinel network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("sentinel json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SentinelError {
    /// HTTP status code carried by this error, if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Auth { status_code, .. } | Self::Api { status_code, .. } => Some(*status_code),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}
