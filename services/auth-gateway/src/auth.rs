//! Sign-in routes
//!
//! - `GET  /auth/google/authorize`  start a PKCE flow (login or calendar)
//! - `POST /auth/google/callback`   redeem a login code, store the user's tokens
//! - `POST /auth/google`            store an implicit-flow access token
//!
//! Responses describe who signed in and until when; tokens never leave the
//! gateway in plaintext.

use axum::Json;
use axum::extract::{Query, State};
use common::Secret;
use credential_store::RecordKey;
use google_oauth::{
    AuthorizationRequest, CALENDAR_SCOPES, ExchangeRequest, IdentityClaims, LOGIN_SCOPES,
    TokenSet, build_authorization_url, compute_challenge, generate_state, generate_verifier,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;
use crate::error::ApiError;
use crate::metrics;

/// Implicit-flow access tokens arrive without a lifetime; Google issues
/// them for an hour.
const IMPLICIT_TOKEN_LIFETIME_SECS: u64 = 3600;

const PROVIDER: &str = "google";

/// Authorization code plus the PKCE verifier the client generated for it.
#[derive(Debug, Deserialize)]
pub struct CodeExchangeRequest {
    pub code: String,
    pub verifier: String,
}

/// Profile and access token from a client-side (implicit) Google sign-in.
#[derive(Debug, Deserialize)]
pub struct ProfileLoginRequest {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
    pub provider: String,
    pub access_token: Secret<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub email: String,
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
    pub provider: &'static str,
    /// Unix milliseconds
    pub expires_at: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    #[default]
    Login,
    Calendar,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    #[serde(default)]
    pub flow: Flow,
}

/// Everything the client needs to send the browser to Google and later
/// redeem the code. The client keeps `verifier` and checks `state`.
#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub flow: Flow,
    pub authorization_url: String,
    pub redirect_uri: String,
    pub state: String,
    pub verifier: String,
}

/// Redeem `request` with the process-wide exchanger, recording the outcome.
pub(crate) async fn exchange_code(
    state: &AppState,
    request: &ExchangeRequest,
) -> Result<TokenSet, ApiError> {
    let result = state.exchanger.exchange(request).await;
    metrics::record_exchange(state.exchanger.mode().as_str(), result.as_ref().map(|_| ()));
    Ok(result?)
}

pub(crate) fn require(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

/// GET /auth/google/authorize?flow=login|calendar
pub async fn authorize(
    State(state): State<AppState>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Json<AuthorizeResponse>, ApiError> {
    let (redirect_uri, scopes) = match query.flow {
        Flow::Login => (&state.oauth.login_redirect_uri, LOGIN_SCOPES),
        Flow::Calendar => (&state.oauth.calendar_redirect_uri, CALENDAR_SCOPES),
    };
    let verifier = generate_verifier();
    let csrf_state = generate_state();
    let challenge = compute_challenge(&verifier);

    let authorization_url = build_authorization_url(&AuthorizationRequest {
        endpoint: &state.oauth.authorize_endpoint,
        client_id: &state.oauth.client_id,
        redirect_uri,
        scopes,
        state: &csrf_state,
        challenge: &challenge,
    })?;

    info!(flow = ?query.flow, "issued authorization request");
    Ok(Json(AuthorizeResponse {
        flow: query.flow,
        authorization_url,
        redirect_uri: redirect_uri.clone(),
        state: csrf_state,
        verifier,
    }))
}

/// POST /auth/google/callback
pub async fn login_callback(
    State(state): State<AppState>,
    Json(body): Json<CodeExchangeRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    require(&body.code, "code")?;
    require(&body.verifier, "verifier")?;

    let request = ExchangeRequest::new(
        body.code,
        body.verifier,
        state.oauth.login_redirect_uri.clone(),
    );
    let tokens = exchange_code(&state, &request).await?;

    let email = tokens.claims.email.clone().ok_or_else(|| {
        ApiError::BadRequest("identity provider returned no email for this account".into())
    })?;
    let stored = state
        .vault
        .store_tokens(&RecordKey::user(email.clone()), &tokens)
        .await?;

    info!(email = %email, "user signed in");
    Ok(Json(LoginResponse {
        message: "Logged in successfully.",
        email,
        full_name: stored.identity.name,
        profile_picture: stored.identity.picture,
        provider: PROVIDER,
        expires_at: stored.expires_at,
    }))
}

/// POST /auth/google
pub async fn profile_login(
    State(state): State<AppState>,
    Json(body): Json<ProfileLoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    require(&body.email, "email")?;
    require(&body.full_name, "full_name")?;
    if body.provider != PROVIDER {
        return Err(ApiError::BadRequest(format!(
            "unsupported provider: {}",
            body.provider
        )));
    }
    if body.access_token.is_blank() {
        return Err(ApiError::BadRequest("access_token must not be empty".into()));
    }

    let tokens = TokenSet {
        access_token: body.access_token,
        refresh_token: None,
        expires_in: IMPLICIT_TOKEN_LIFETIME_SECS,
        claims: IdentityClaims {
            email: Some(body.email.clone()),
            name: Some(body.full_name),
            picture: body.profile_picture,
        },
    };
    let stored = state
        .vault
        .store_tokens(&RecordKey::user(body.email.clone()), &tokens)
        .await?;

    info!(email = %body.email, "user signed in with profile token");
    Ok(Json(LoginResponse {
        message: "Logged in successfully.",
        email: body.email,
        full_name: stored.identity.name,
        profile_picture: stored.identity.picture,
        provider: PROVIDER,
        expires_at: stored.expires_at,
    }))
}
