//! Error types for OAuth exchange operations

/// Errors from talking to the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The provider answered with a non-success status. Status and body are
    /// kept verbatim for support diagnosis.
    #[error("token endpoint returned {status}: {body}")]
    ExchangeFailed { status: u16, body: String },

    /// The provider could not be reached, or did not answer in time.
    /// `timeout` is set when the configured request timeout elapsed.
    #[error("token endpoint unreachable: {message}")]
    Network { message: String, timeout: bool },

    /// The provider answered 2xx with a body we cannot interpret.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("OAuth configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the provider failed to answer within the configured timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Network { timeout: true, .. })
    }

    /// Provider status code, when the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ExchangeFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for OAuth operations.
pub type Result<T> = std::result::Result<T, Error>;
