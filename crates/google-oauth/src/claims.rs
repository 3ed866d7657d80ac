//! Identity claims from Google's `id_token`
//!
//! The `id_token` is a compact JWS. Its signature is NOT checked here: the
//! token came back on the same TLS connection that redeemed the code with our
//! client secret, directly from the provider. That is a trust boundary, and
//! the constructor name says so. Do not feed it tokens from any other source.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Display identity for a signed-in user. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl IdentityClaims {
    /// Read `email`, `name` and `picture` from an id_token payload without
    /// verifying its signature.
    pub fn from_unverified_id_token(id_token: &str) -> Result<Self> {
        let mut segments = id_token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(Error::InvalidResponse(
                "id_token is not a three-segment JWT".into(),
            ));
        };

        let decoded = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| Error::InvalidResponse(format!("id_token payload is not base64url: {e}")))?;

        let claims: IdentityClaims = serde_json::from_slice(&decoded)
            .map_err(|e| Error::InvalidResponse(format!("id_token payload is not JSON: {e}")))?;

        Ok(claims.normalized())
    }

    /// Treat empty strings the same as missing claims.
    fn normalized(self) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            email: keep(self.email),
            name: keep(self.name),
            picture: keep(self.picture),
        }
    }
}

#[cfg(test)]
pub(crate) fn unsigned_id_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2lnbmF0dXJl")
}
