//! Token endpoint payloads and the normalized token set

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::claims::IdentityClaims;
use crate::constants::{
    MOCK_ACCESS_TOKEN, MOCK_EMAIL, MOCK_EXPIRES_IN, MOCK_NAME, MOCK_REFRESH_TOKEN,
};
use crate::error::Result;

/// Caller-supplied inputs to a code exchange.
///
/// `redirect_uri` must be byte-for-byte the URI used in the authorization
/// redirect; Google rejects the exchange otherwise. The code is single use.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub code: Secret<String>,
    pub verifier: Secret<String>,
    pub redirect_uri: String,
}

impl ExchangeRequest {
    pub fn new(
        code: impl Into<String>,
        verifier: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            code: Secret::new(code.into()),
            verifier: Secret::new(verifier.into()),
            redirect_uri: redirect_uri.into(),
        }
    }
}

/// Raw JSON body from the token endpoint, for both exchange and refresh.
///
/// `refresh_token` is omitted when Google decides the client already holds
/// one (repeat consent) and on most refresh responses. `id_token` is present
/// only when the `openid` scope was granted.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Normalized result of an exchange, identical in shape for live and mock.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
    pub expires_in: u64,
    pub claims: IdentityClaims,
}

impl TokenSet {
    /// Normalize a token endpoint response, reading identity claims from the
    /// `id_token` without signature verification.
    pub fn from_response(response: TokenResponse) -> Result<Self> {
        let claims = match response.id_token.as_deref() {
            Some(id_token) => IdentityClaims::from_unverified_id_token(id_token)?,
            None => IdentityClaims::default(),
        };

        Ok(Self {
            access_token: Secret::new(response.access_token),
            refresh_token: response
                .refresh_token
                .filter(|t| !t.trim().is_empty())
                .map(Secret::new),
            expires_in: response.expires_in,
            claims,
        })
    }

    /// The fixed token set returned in mock mode.
    pub fn mock() -> Self {
        Self {
            access_token: Secret::from(MOCK_ACCESS_TOKEN),
            refresh_token: Some(Secret::from(MOCK_REFRESH_TOKEN)),
            expires_in: MOCK_EXPIRES_IN,
            claims: IdentityClaims {
                email: Some(MOCK_EMAIL.into()),
                name: Some(MOCK_NAME.into()),
                picture: None,
            },
        }
    }
}
