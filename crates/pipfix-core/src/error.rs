//! Error types for the advisory client.

/// Errors produced when talking to the advisory service.
///
/// `ServiceUnavailable` is the terminal state after the retry budget is
/// exhausted; `Server` and `Network` describe individual failed attempts.
#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("invalid server URL: {url}")]
    InvalidServerUrl { url: String },

    #[error("network error when connecting to advisory service: {detail}")]
    Network { detail: String },

    #[error("advisory service returned status {status}")]
    Server { status: u16 },

    #[error("failed to parse advisory service response: {detail}")]
    ResponseParse { detail: String },

    #[error("advisory service unavailable at {url}")]
    ServiceUnavailable { url: String },
}

/// Result type for advisory operations.
pub type AdvisoryResult<T> = std::result::Result<T, AdvisoryError>;
