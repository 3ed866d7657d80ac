//! Shared fixtures for route tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::Form;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use credential_store::{CredentialVault, FileCredentialStore};
use google_oauth::{
    CodeExchanger, ExchangeMode, ExchangerConfig, LiveExchanger, MockExchanger,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use token_cipher::TokenCipher;
use tokio::net::TcpListener;
use tower::ServiceExt;

use crate::AppState;
use crate::config::OAuthConfig;

const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

/// Verifier every test client sends to the fake provider.
pub const VERIFIER: &str = "verifier-abc";

async fn state_with(dir: &tempfile::TempDir, exchanger: Arc<dyn CodeExchanger>) -> AppState {
    let store = FileCredentialStore::load(dir.path().join("credentials.json"))
        .await
        .unwrap();
    let cipher = Arc::new(TokenCipher::from_hex(KEY_HEX).unwrap());
    AppState {
        vault: CredentialVault::new(cipher, Arc::new(store)),
        exchanger,
        oauth: Arc::new(OAuthConfig {
            client_id: "client-123".into(),
            ..OAuthConfig::default()
        }),
        prometheus: PrometheusBuilder::new().build_recorder().handle(),
        started_at: Instant::now(),
    }
}

/// Gateway state in mock mode, storing credentials under `dir`.
pub async fn mock_state(dir: &tempfile::TempDir) -> AppState {
    state_with(dir, Arc::new(MockExchanger)).await
}

/// Gateway state in live mode against `token_endpoint`.
pub async fn live_state(dir: &tempfile::TempDir, token_endpoint: &str) -> AppState {
    let exchanger = LiveExchanger::new(ExchangerConfig {
        mode: ExchangeMode::Live,
        token_endpoint: token_endpoint.to_string(),
        client_id: "client-123".into(),
        client_secret: Some(Secret::from("shh")),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    state_with(dir, Arc::new(exchanger)).await
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Route `request` through a fresh router over `state`. Non-JSON bodies
/// come back as a JSON string.
pub async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = crate::build_router(state.clone(), 1000)
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()));
    (status, body)
}

fn unsigned_id_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

/// A Google-like token endpoint on an ephemeral port. Codes are single use,
/// the verifier must be [`VERIFIER`], and refresh answers with an access
/// token derived from the refresh token it was given.
pub async fn start_provider() -> String {
    let redeemed = Arc::new(Mutex::new(HashSet::<String>::new()));
    let redirects = OAuthConfig::default();
    let allowed_redirects = [redirects.login_redirect_uri, redirects.calendar_redirect_uri];

    let app = axum::Router::new().route(
        "/token",
        axum::routing::post(move |Form(form): Form<HashMap<String, String>>| {
            let redeemed = redeemed.clone();
            let allowed_redirects = allowed_redirects.clone();
            async move {
                let field = |k: &str| form.get(k).map(String::as_str).unwrap_or("");
                if field("grant_type") == "refresh_token" {
                    let body = serde_json::json!({
                        "access_token": format!("at-from-{}", field("refresh_token")),
                        "expires_in": 1800,
                    });
                    return (StatusCode::OK, axum::Json(body)).into_response();
                }

                let well_formed = field("grant_type") == "authorization_code"
                    && field("client_id") == "client-123"
                    && field("client_secret") == "shh"
                    && field("code_verifier") == VERIFIER
                    && allowed_redirects.iter().any(|r| r == field("redirect_uri"));
                if !well_formed || !redeemed.lock().unwrap().insert(field("code").to_string()) {
                    return (
                        StatusCode::BAD_REQUEST,
                        r#"{"error":"invalid_grant","error_description":"Bad Request"}"#,
                    )
                        .into_response();
                }

                let body = serde_json::json!({
                    "access_token": "ya29.live",
                    "refresh_token": "1//live-refresh",
                    "expires_in": 3599,
                    "token_type": "Bearer",
                    "id_token": unsigned_id_token(&serde_json::json!({
                        "email": "ada@example.com",
                        "name": "Ada Lovelace",
                    })),
                });
                (StatusCode::OK, axum::Json(body)).into_response()
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/token")
}
