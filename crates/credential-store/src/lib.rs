//! Encrypted credential persistence
//!
//! The gateway's persistence layer only ever sees encrypted token strings.
//! This crate defines the narrow interface the credential core needs from it
//! (get/put encrypted token fields on a record), a JSON-file implementation,
//! and [`CredentialVault`], which joins a [`token_cipher::TokenCipher`] with a
//! store so callers deal in plaintext `TokenSet`s while only ciphertext
//! touches disk.

pub mod error;
pub mod file;
pub mod record;
pub mod vault;

pub use error::{Error, Result};
pub use file::FileCredentialStore;
pub use record::{CredentialStore, RecordKey, StoreFuture, StoredCredential, UpdateFn};
pub use vault::CredentialVault;

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
