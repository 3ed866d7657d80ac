//! HTTP mapping for request failures
//!
//! The credential crates report errors unchanged; this is the only place
//! they become status codes and user-facing messages.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::metrics;

const SIGN_IN_AGAIN: &str = "credential invalid, please sign in again";
const PROVIDER_UNREACHABLE: &str = "provider unreachable, restart the sign-in flow";

/// A failed request, ready to be rendered as a JSON error response.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] credential_store::Error),

    #[error(transparent)]
    OAuth(#[from] google_oauth::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(e) => store_status(e),
            ApiError::OAuth(e) => oauth_status(e),
        }
    }

    fn body(&self) -> serde_json::Value {
        use credential_store::Error as Store;
        match self {
            ApiError::BadRequest(msg) => json!({ "error": "bad_request", "message": msg }),
            ApiError::Store(Store::NotFound(msg)) => json!({ "error": "not_found", "message": msg }),
            ApiError::Store(Store::NoRefreshToken(_)) => json!({
                "error": "reauthentication_required",
                "message": SIGN_IN_AGAIN,
            }),
            ApiError::Store(Store::OAuth(e)) | ApiError::OAuth(e) => oauth_body(e),
            ApiError::Store(Store::Cipher(e)) => cipher_body(e),
            ApiError::Store(_) => internal_body(),
        }
    }
}

fn oauth_body(e: &google_oauth::Error) -> serde_json::Value {
    match e {
        google_oauth::Error::ExchangeFailed { status, body } => json!({
            "error": "exchange_failed",
            "message": "identity provider rejected the request",
            "provider_status": status,
            "provider_body": body,
        }),
        google_oauth::Error::Network { .. } => json!({
            "error": "provider_unreachable",
            "message": PROVIDER_UNREACHABLE,
        }),
        google_oauth::Error::InvalidResponse(_) => json!({
            "error": "invalid_provider_response",
            "message": "identity provider answered with an unreadable token response",
        }),
        google_oauth::Error::Config(_) => internal_body(),
    }
}

fn cipher_body(e: &token_cipher::Error) -> serde_json::Value {
    if e.is_invalid_credential() {
        json!({ "error": "credential_invalid", "message": SIGN_IN_AGAIN })
    } else {
        internal_body()
    }
}

fn internal_body() -> serde_json::Value {
    json!({ "error": "internal", "message": "internal error" })
}

fn store_status(e: &credential_store::Error) -> StatusCode {
    use credential_store::Error;
    match e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::NoRefreshToken(_) => StatusCode::UNAUTHORIZED,
        Error::Cipher(e) => cipher_status(e),
        Error::OAuth(e) => oauth_status(e),
        Error::CredentialParse(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn oauth_status(e: &google_oauth::Error) -> StatusCode {
    use google_oauth::Error;
    match e {
        Error::ExchangeFailed { .. } | Error::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        Error::Network { timeout: true, .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::Network { .. } => StatusCode::BAD_GATEWAY,
        Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn cipher_status(e: &token_cipher::Error) -> StatusCode {
    if e.is_invalid_credential() {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Label for `token_decrypt_failures_total`, when `e` is a decrypt failure.
fn decrypt_failure_kind(e: &ApiError) -> Option<&'static str> {
    let ApiError::Store(credential_store::Error::Cipher(cipher)) = e else {
        return None;
    };
    match cipher {
        token_cipher::Error::Authentication => Some("authentication"),
        token_cipher::Error::MalformedInput(_) => Some("malformed"),
        token_cipher::Error::Encoding(_) => Some("encoding"),
        token_cipher::Error::KeyConfiguration(_) => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Some(kind) = decrypt_failure_kind(&self) {
            metrics::record_decrypt_failure(kind);
        }
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
