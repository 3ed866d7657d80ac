//! Authorization code exchange and token refresh
//!
//! Both operations POST a form to the token endpoint with different grant
//! types. Nothing is retried: authorization codes are single use, so a
//! second attempt with the same code cannot succeed, and refresh retry
//! policy belongs to the caller.
//!
//! Per-call state machine:
//!
//! ```text
//! INITIATED -> (MOCK_RETURN | HTTP_SENT) -> (SUCCESS | PROVIDER_REJECTED | NETWORK_ERROR)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_TIMEOUT_SECS, GOOGLE_TOKEN_ENDPOINT};
use crate::error::{Error, Result};
use crate::token::{ExchangeRequest, TokenResponse, TokenSet};

/// Boxed future returned by exchanger methods, for `Arc<dyn CodeExchanger>`.
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenSet>> + Send + 'a>>;

/// Which exchanger implementation the process runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeMode {
    Live,
    Mock,
}

impl ExchangeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeMode::Live => "live",
            ExchangeMode::Mock => "mock",
        }
    }
}

/// Turns authorization codes and refresh tokens into token sets.
///
/// Uses `Pin<Box<dyn Future>>` return types so the gateway can hold an
/// `Arc<dyn CodeExchanger>` chosen once at startup.
pub trait CodeExchanger: Send + Sync {
    fn mode(&self) -> ExchangeMode;

    /// Redeem an authorization code plus PKCE verifier.
    fn exchange<'a>(&'a self, request: &'a ExchangeRequest) -> ExchangeFuture<'a>;

    /// Obtain a new access token from a refresh token.
    fn refresh<'a>(&'a self, refresh_token: &'a Secret<String>) -> ExchangeFuture<'a>;
}

/// Settings for building an exchanger.
#[derive(Debug, Clone)]
pub struct ExchangerConfig {
    pub mode: ExchangeMode,
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: Option<Secret<String>>,
    pub timeout: Duration,
}

impl Default for ExchangerConfig {
    fn default() -> Self {
        Self {
            mode: ExchangeMode::Live,
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            client_id: String::new(),
            client_secret: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Build the exchanger selected by `config.mode`.
pub fn exchanger_from_config(config: ExchangerConfig) -> Result<Arc<dyn CodeExchanger>> {
    match config.mode {
        ExchangeMode::Mock => {
            warn!("OAuth mock mode enabled: every code exchange returns fixed fake tokens");
            Ok(Arc::new(MockExchanger))
        }
        ExchangeMode::Live => Ok(Arc::new(LiveExchanger::new(config)?)),
    }
}

/// Fixed-response exchanger for offline development and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockExchanger;

impl CodeExchanger for MockExchanger {
    fn mode(&self) -> ExchangeMode {
        ExchangeMode::Mock
    }

    fn exchange<'a>(&'a self, _request: &'a ExchangeRequest) -> ExchangeFuture<'a> {
        Box::pin(async {
            debug!("mock exchange: returning fixed token set");
            Ok(TokenSet::mock())
        })
    }

    fn refresh<'a>(&'a self, _refresh_token: &'a Secret<String>) -> ExchangeFuture<'a> {
        Box::pin(async {
            debug!("mock refresh: returning fixed token set");
            Ok(TokenSet::mock())
        })
    }
}

/// Exchanger that talks to the real token endpoint.
pub struct LiveExchanger {
    client: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: Secret<String>,
}

impl LiveExchanger {
    /// Build a live exchanger whose HTTP client enforces `config.timeout`
    /// on every token endpoint round trip.
    pub fn new(config: ExchangerConfig) -> Result<Self> {
        if !config.token_endpoint.starts_with("https://")
            && !config.token_endpoint.starts_with("http://")
        {
            return Err(Error::Config(format!(
                "token_endpoint must start with http:// or https://, got: {}",
                config.token_endpoint
            )));
        }
        if config.client_id.trim().is_empty() {
            return Err(Error::Config("client_id is required in live mode".into()));
        }
        let client_secret = config
            .client_secret
            .filter(|s| !s.is_blank())
            .ok_or_else(|| Error::Config("client_secret is required in live mode".into()))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            token_endpoint: config.token_endpoint,
            client_id: config.client_id,
            client_secret,
        })
    }

    async fn post_form(
        &self,
        grant_type: &'static str,
        form: &[(&str, &str)],
    ) -> Result<TokenSet> {
        debug!(grant_type, endpoint = %self.token_endpoint, "calling token endpoint");

        let response = self
            .client
            .post(&self.token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| network_error(grant_type, "token endpoint request failed", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| network_error(grant_type, "reading token endpoint response", e))?;

        if !status.is_success() {
            warn!(
                grant_type,
                status = status.as_u16(),
                body = %body,
                "token endpoint rejected request"
            );
            return Err(Error::ExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::InvalidResponse(format!("token endpoint body: {e}")))?;
        let tokens = TokenSet::from_response(parsed)?;

        info!(
            grant_type,
            expires_in = tokens.expires_in,
            has_refresh_token = tokens.refresh_token.is_some(),
            has_email = tokens.claims.email.is_some(),
            "token endpoint call succeeded"
        );
        Ok(tokens)
    }
}

fn network_error(grant_type: &str, context: &str, e: reqwest::Error) -> Error {
    let timeout = e.is_timeout();
    warn!(grant_type, timeout, error = %e, "{context}");
    Error::Network {
        message: format!("{context}: {e}"),
        timeout,
    }
}

impl std::fmt::Debug for LiveExchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveExchanger")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret)
            .finish()
    }
}

impl CodeExchanger for LiveExchanger {
    fn mode(&self) -> ExchangeMode {
        ExchangeMode::Live
    }

    fn exchange<'a>(&'a self, request: &'a ExchangeRequest) -> ExchangeFuture<'a> {
        Box::pin(async move {
            self.post_form(
                "authorization_code",
                &[
                    ("grant_type", "authorization_code"),
                    ("code", request.code.expose().as_str()),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.expose().as_str()),
                    ("redirect_uri", request.redirect_uri.as_str()),
                    ("code_verifier", request.verifier.expose().as_str()),
                ],
            )
            .await
        })
    }

    fn refresh<'a>(&'a self, refresh_token: &'a Secret<String>) -> ExchangeFuture<'a> {
        Box::pin(async move {
            self.post_form(
                "refresh_token",
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.expose().as_str()),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.expose().as_str()),
                ],
            )
            .await
        })
    }
}
