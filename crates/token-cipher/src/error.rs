//! Error types for token encryption

/// Errors from sealing or opening encrypted tokens.
///
/// `Authentication` deliberately carries no detail: wrong key, flipped bits
/// and garbage input are indistinguishable to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("encryption key misconfigured: {0}")]
    KeyConfiguration(String),

    #[error("encrypted token failed authentication")]
    Authentication,

    #[error("encrypted token is malformed: decoded to {0} bytes, need at least 28")]
    MalformedInput(usize),

    #[error("token encoding error: {0}")]
    Encoding(String),
}

impl Error {
    /// Whether the stored credential should be treated as invalid and the
    /// owning user or integration sent back through sign-in.
    pub fn is_invalid_credential(&self) -> bool {
        matches!(self, Error::Authentication | Error::MalformedInput(_))
    }
}

/// Result alias for cipher operations.
pub type Result<T> = std::result::Result<T, Error>;
