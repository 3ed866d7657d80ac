//! Authenticated encryption of OAuth tokens at rest
//!
//! Access and refresh tokens are never written to the credential store in
//! plaintext. `TokenCipher` seals each token with AES-GCM under a single
//! process-wide key and renders the result as one base64 string that fits a
//! text column:
//!
//! ```text
//! base64( nonce[12] || tag[16] || ciphertext[N] )
//! ```
//!
//! The key is injected at construction (usually from `TOKEN_ENCRYPTION_KEY`
//! via the gateway config), so tests can build ciphers under several keys in
//! the same process.

pub mod cipher;
pub mod error;
pub mod key;

pub use cipher::{HEADER_LEN, NONCE_LEN, TAG_LEN, TokenCipher};
pub use error::{Error, Result};
pub use key::{EncryptionKey, KeySize};
