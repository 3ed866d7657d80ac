//! Google OAuth 2.0 authorization-code exchange with PKCE
//!
//! Turns the short-lived authorization code a browser client obtained from
//! Google into a normalized [`TokenSet`]: access token, optional refresh
//! token, expiry, and the identity claims carried in the `id_token`.
//!
//! Flow:
//! 1. Client (or `GET /auth/google/authorize`) calls `pkce::generate_verifier()`
//!    and `pkce::compute_challenge()`, then sends the user to
//!    `pkce::build_authorization_url()`
//! 2. Google redirects back with `code`; the client posts `code` + verifier
//! 3. Gateway calls `CodeExchanger::exchange()`
//! 4. Tokens are encrypted and stored by the credential vault
//! 5. Later, `CodeExchanger::refresh()` renews the access token
//!
//! The exchanger is chosen once at startup: [`LiveExchanger`] talks to the
//! token endpoint, [`MockExchanger`] returns a fixed token set for offline
//! development and tests.

pub mod claims;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod pkce;
pub mod token;

pub use claims::IdentityClaims;
pub use constants::*;
pub use error::{Error, Result};
pub use exchange::{
    CodeExchanger, ExchangeFuture, ExchangeMode, ExchangerConfig, LiveExchanger, MockExchanger,
    exchanger_from_config,
};
pub use pkce::{
    AuthorizationRequest, build_authorization_url, compute_challenge, generate_state,
    generate_verifier,
};
pub use token::{ExchangeRequest, TokenResponse, TokenSet};
