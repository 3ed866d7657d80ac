//! PKCE (Proof Key for Code Exchange) helpers per RFC 7636
//!
//! In the usual flow the browser client generates the verifier and keeps it
//! until the callback. The gateway can also hand out a fresh verifier, state
//! and authorization URL for clients that prefer not to do the crypto
//! themselves.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Generate a cryptographically random PKCE code verifier.
///
/// 64 random bytes encoded as URL-safe base64 without padding gives 86
/// characters, inside RFC 7636's 43-128 range.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge: `BASE64URL(SHA256(verifier))`.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Opaque CSRF state echoed back by the provider on redirect.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Parameters of an authorization redirect.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub endpoint: &'a str,
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scopes: &'a str,
    pub state: &'a str,
    pub challenge: &'a str,
}

/// Build the authorization URL with every parameter percent-encoded.
///
/// Requests offline access with forced consent so Google issues a refresh
/// token on the callback.
pub fn build_authorization_url(request: &AuthorizationRequest<'_>) -> Result<String> {
    let url = reqwest::Url::parse_with_params(
        request.endpoint,
        &[
            ("client_id", request.client_id),
            ("redirect_uri", request.redirect_uri),
            ("response_type", "code"),
            ("scope", request.scopes),
            ("code_challenge", request.challenge),
            ("code_challenge_method", "S256"),
            ("state", request.state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| Error::Config(format!("invalid authorization endpoint: {e}")))?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{GOOGLE_AUTHORIZE_ENDPOINT, LOGIN_SCOPES};

    fn request<'a>(state: &'a str, challenge: &'a str) -> AuthorizationRequest<'a> {
        AuthorizationRequest {
            endpoint: GOOGLE_AUTHORIZE_ENDPOINT,
            client_id: "123.apps.googleusercontent.com",
            redirect_uri: "http://localhost:8000/auth/google/callback",
            scopes: LOGIN_SCOPES,
            state,
            challenge,
        }
    }

    #[test]
    fn verifier_is_url_safe_base64_within_rfc_length() {
        let verifier = generate_verifier();
        assert_eq!(verifier.len(), 86);
        assert!(
            verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "verifier must be URL-safe base64 (no padding): {verifier}"
        );
    }

    #[test]
    fn verifiers_and_states_are_unique() {
        assert_ne!(generate_verifier(), generate_verifier());
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn challenge_matches_known_value() {
        // SHA256("hello") in base64url
        assert_eq!(
            compute_challenge("hello"),
            "LPJNul-wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ"
        );
    }

    #[test]
    fn challenge_matches_rfc7636_appendix_b() {
        assert_eq!(
            compute_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn authorization_url_contains_required_params() {
        let challenge = compute_challenge("test-verifier");
        let url = build_authorization_url(&request("state-123", &challenge)).unwrap();

        assert!(url.starts_with(GOOGLE_AUTHORIZE_ENDPOINT));
        assert!(url.contains("client_id=123.apps.googleusercontent.com"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("code_challenge={challenge}")));
        assert!(url.contains("state=state-123"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn authorization_url_encodes_redirect_and_scopes() {
        let url = build_authorization_url(&request("s", "c")).unwrap();
        assert!(
            url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Fauth%2Fgoogle%2Fcallback"),
            "got: {url}"
        );
        assert!(url.contains("scope=openid+email+profile"), "got: {url}");
    }

    #[test]
    fn invalid_endpoint_is_a_config_error() {
        let mut req = request("s", "c");
        req.endpoint = "not a url";
        assert!(matches!(
            build_authorization_url(&req),
            Err(Error::Config(_))
        ));
    }
}
