//! Error types for credential persistence

/// Errors from storing, loading, sealing or opening credentials.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("stored credential has no refresh token: {0}")]
    NoRefreshToken(String),

    #[error(transparent)]
    Cipher(#[from] token_cipher::Error),

    #[error(transparent)]
    OAuth(#[from] google_oauth::Error),
}

impl Error {
    /// Whether the affected user or integration must sign in again.
    pub fn needs_reauthentication(&self) -> bool {
        match self {
            Error::Cipher(e) => e.is_invalid_credential(),
            Error::NoRefreshToken(_) => true,
            Error::OAuth(google_oauth::Error::ExchangeFailed { status, .. }) => {
                matches!(status, 400 | 401 | 403)
            }
            _ => false,
        }
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
