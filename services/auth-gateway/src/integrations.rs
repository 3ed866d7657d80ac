//! Integration routes
//!
//! - `POST /integrations/google/calendar/callback`
//! - `POST /integrations/{client_id}/{agent_id}/{kind}/refresh`

use axum::Json;
use axum::extract::{Path, State};
use credential_store::{RecordKey, StoredCredential};
use google_oauth::ExchangeRequest;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;
use crate::auth::{exchange_code, require};
use crate::error::ApiError;
use crate::metrics;

pub const CALENDAR_INTEGRATION: &str = "google-calendar";

#[derive(Debug, Deserialize)]
pub struct CalendarCallbackRequest {
    pub code: String,
    pub verifier: String,
    pub client_id: u64,
    pub agent_id: u64,
}

#[derive(Debug, Serialize)]
pub struct IntegrationResponse {
    pub client_id: u64,
    pub agent_id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: &'static str,
    pub expires_at: u64,
    pub updated_at: u64,
}

impl IntegrationResponse {
    fn connected(client_id: u64, agent_id: u64, kind: String, stored: &StoredCredential) -> Self {
        Self {
            client_id,
            agent_id,
            kind,
            status: "connected",
            expires_at: stored.expires_at,
            updated_at: stored.updated_at,
        }
    }
}

/// POST /integrations/google/calendar/callback
pub async fn calendar_callback(
    State(state): State<AppState>,
    Json(body): Json<CalendarCallbackRequest>,
) -> Result<Json<IntegrationResponse>, ApiError> {
    require(&body.code, "code")?;
    require(&body.verifier, "verifier")?;

    let request = ExchangeRequest::new(
        body.code,
        body.verifier,
        state.oauth.calendar_redirect_uri.clone(),
    );
    let tokens = exchange_code(&state, &request).await?;

    let key = RecordKey::integration(body.client_id, body.agent_id, CALENDAR_INTEGRATION);
    let stored = state.vault.store_tokens(&key, &tokens).await?;

    info!(
        client_id = body.client_id,
        agent_id = body.agent_id,
        "calendar integration connected"
    );
    Ok(Json(IntegrationResponse::connected(
        body.client_id,
        body.agent_id,
        CALENDAR_INTEGRATION.to_string(),
        &stored,
    )))
}

/// POST /integrations/{client_id}/{agent_id}/{kind}/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Path((client_id, agent_id, kind)): Path<(u64, u64, String)>,
) -> Result<Json<IntegrationResponse>, ApiError> {
    let key = RecordKey::integration(client_id, agent_id, kind.clone());
    let mode = state.exchanger.mode().as_str();

    let result = state.vault.refresh(&key, state.exchanger.as_ref()).await;
    match &result {
        Ok(_) => metrics::record_exchange(mode, Ok(())),
        Err(credential_store::Error::OAuth(e)) => metrics::record_exchange(mode, Err(e)),
        Err(_) => {}
    }
    let stored = result?;

    info!(record = %key, "integration token refreshed");
    Ok(Json(IntegrationResponse::connected(
        client_id, agent_id, kind, &stored,
    )))
}
