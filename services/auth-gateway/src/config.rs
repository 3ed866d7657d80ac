//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The token encryption key and the OAuth client secret come from the
//! environment or from a file named in the config, never from the TOML
//! itself.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use google_oauth::{
    DEFAULT_TIMEOUT_SECS, ExchangeMode, ExchangerConfig, GOOGLE_AUTHORIZE_ENDPOINT,
    GOOGLE_TOKEN_ENDPOINT,
};
use serde::Deserialize;

pub const ENCRYPTION_KEY_ENV: &str = "TOKEN_ENCRYPTION_KEY";
pub const CLIENT_ID_ENV: &str = "GOOGLE_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "GOOGLE_CLIENT_SECRET";
pub const MOCK_OAUTH_ENV: &str = "DEV_MOCK_OAUTH";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Google OAuth client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file holding the client secret (alternative to GOOGLE_CLIENT_SECRET)
    pub client_secret_file: Option<PathBuf>,
    pub token_endpoint: String,
    pub authorize_endpoint: String,
    /// Must match the redirect registered with Google byte for byte.
    pub login_redirect_uri: String,
    pub calendar_redirect_uri: String,
    pub timeout_secs: u64,
    /// Return fixed fake tokens instead of calling Google.
    pub mock: bool,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            client_secret_file: None,
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            authorize_endpoint: GOOGLE_AUTHORIZE_ENDPOINT.to_string(),
            login_redirect_uri: "http://localhost:8000/auth/google/callback".to_string(),
            calendar_redirect_uri: "http://localhost:8000/integrations/google/calendar/callback"
                .to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            mock: false,
        }
    }
}

/// Credential persistence settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub credentials_path: PathBuf,
    #[serde(skip)]
    pub encryption_key: Option<Secret<String>>,
    /// Path to a file holding the hex key (alternative to TOKEN_ENCRYPTION_KEY)
    pub encryption_key_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            encryption_key: None,
            encryption_key_file: None,
        }
    }
}

fn default_max_connections() -> usize {
    1000
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order, for both the encryption key and the client
    /// secret:
    /// 1. env var
    /// 2. `*_file` path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(client_id) = std::env::var(CLIENT_ID_ENV) {
            config.oauth.client_id = client_id;
        }
        if let Ok(flag) = std::env::var(MOCK_OAUTH_ENV) {
            config.oauth.mock = matches!(flag.trim(), "1" | "true");
        }
        config.oauth.client_secret =
            resolve_secret(CLIENT_SECRET_ENV, config.oauth.client_secret_file.as_deref())?;
        config.storage.encryption_key = resolve_secret(
            ENCRYPTION_KEY_ENV,
            config.storage.encryption_key_file.as_deref(),
        )?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        for (name, url) in [
            ("token_endpoint", &self.oauth.token_endpoint),
            ("authorize_endpoint", &self.oauth.authorize_endpoint),
            ("login_redirect_uri", &self.oauth.login_redirect_uri),
            ("calendar_redirect_uri", &self.oauth.calendar_redirect_uri),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if self.oauth.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.storage.encryption_key.is_none() {
            return Err(common::Error::MissingSetting {
                name: "token encryption key",
                env: ENCRYPTION_KEY_ENV,
            });
        }

        if !self.oauth.mock {
            if self.oauth.client_id.trim().is_empty() {
                return Err(common::Error::MissingSetting {
                    name: "OAuth client id",
                    env: CLIENT_ID_ENV,
                });
            }
            if self.oauth.client_secret.is_none() {
                return Err(common::Error::MissingSetting {
                    name: "OAuth client secret",
                    env: CLIENT_SECRET_ENV,
                });
            }
        }

        Ok(())
    }

    pub fn exchange_mode(&self) -> ExchangeMode {
        if self.oauth.mock {
            ExchangeMode::Mock
        } else {
            ExchangeMode::Live
        }
    }

    /// Settings for building the process-wide code exchanger.
    pub fn exchanger_config(&self) -> ExchangerConfig {
        ExchangerConfig {
            mode: self.exchange_mode(),
            token_endpoint: self.oauth.token_endpoint.clone(),
            client_id: self.oauth.client_id.clone(),
            client_secret: self.oauth.client_secret.clone(),
            timeout: Duration::from_secs(self.oauth.timeout_secs),
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("auth-gateway.toml")
    }
}

/// Read a secret from `env`, falling back to `file`. Blank values count as
/// unset.
fn resolve_secret(env: &str, file: Option<&Path>) -> common::Result<Option<Secret<String>>> {
    if let Ok(value) = std::env::var(env) {
        let value = value.trim().to_owned();
        if !value.is_empty() {
            return Ok(Some(Secret::new(value)));
        }
    }
    let Some(file) = file else {
        return Ok(None);
    };
    let value = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!("failed to read {}: {e}", file.display()))
    })?;
    let value = value.trim().to_owned();
    Ok((!value.is_empty()).then(|| Secret::new(value)))
}
