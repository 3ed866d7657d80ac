//! Cipher + store glue
//!
//! Everything written through the vault is encrypted first; everything read
//! back is decrypted on demand. Plaintext tokens only ever exist in memory,
//! wrapped in `Secret`.

use std::sync::Arc;

use common::Secret;
use google_oauth::{CodeExchanger, IdentityClaims, TokenSet};
use token_cipher::TokenCipher;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::now_millis;
use crate::record::{CredentialStore, RecordKey, StoredCredential};

/// Encrypting front for a [`CredentialStore`].
#[derive(Clone)]
pub struct CredentialVault {
    cipher: Arc<TokenCipher>,
    store: Arc<dyn CredentialStore>,
}

impl CredentialVault {
    pub fn new(cipher: Arc<TokenCipher>, store: Arc<dyn CredentialStore>) -> Self {
        Self { cipher, store }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Encrypt a token set into a storable credential.
    ///
    /// Google omits `refresh_token` on repeat consent and on refresh; the
    /// previously stored (still encrypted) refresh token is carried over in
    /// that case. Identity claims missing from `tokens` are carried over too.
    pub fn seal(
        &self,
        tokens: &TokenSet,
        previous: Option<&StoredCredential>,
        now_millis: u64,
    ) -> Result<StoredCredential> {
        let access_token = self.cipher.encrypt(tokens.access_token.expose())?;
        let refresh_token = match &tokens.refresh_token {
            Some(rt) => Some(self.cipher.encrypt(rt.expose())?),
            None => previous.and_then(|p| p.refresh_token.clone()),
        };

        let prior = previous.map(|p| &p.identity);
        let identity = IdentityClaims {
            email: tokens
                .claims
                .email
                .clone()
                .or_else(|| prior.and_then(|i| i.email.clone())),
            name: tokens
                .claims
                .name
                .clone()
                .or_else(|| prior.and_then(|i| i.name.clone())),
            picture: tokens
                .claims
                .picture
                .clone()
                .or_else(|| prior.and_then(|i| i.picture.clone())),
        };

        Ok(StoredCredential {
            access_token,
            refresh_token,
            expires_at: now_millis.saturating_add(tokens.expires_in.saturating_mul(1000)),
            updated_at: now_millis,
            identity,
        })
    }

    /// Encrypt `tokens` and persist them under `key`, merging with the
    /// record as it stands at write time.
    pub async fn store_tokens(&self, key: &RecordKey, tokens: &TokenSet) -> Result<StoredCredential> {
        let now = now_millis();
        let credential = self
            .store
            .update(key, Box::new(move |previous| self.seal(tokens, previous, now)))
            .await?;
        info!(
            record = %key,
            has_refresh_token = credential.refresh_token.is_some(),
            "stored encrypted credential"
        );
        Ok(credential)
    }

    /// Decrypt the stored access token for `key`.
    pub async fn access_token(&self, key: &RecordKey) -> Result<Secret<String>> {
        let credential = self.load(key).await?;
        self.open(key, &credential.access_token)
    }

    /// Decrypt the stored refresh token for `key`.
    pub async fn refresh_token(&self, key: &RecordKey) -> Result<Secret<String>> {
        let credential = self.load(key).await?;
        let encrypted = credential
            .refresh_token
            .ok_or_else(|| Error::NoRefreshToken(key.to_string()))?;
        self.open(key, &encrypted)
    }

    /// Renew the access token for `key` with its stored refresh token.
    ///
    /// Nothing is written if decryption or the provider call fails.
    pub async fn refresh(
        &self,
        key: &RecordKey,
        exchanger: &dyn CodeExchanger,
    ) -> Result<StoredCredential> {
        let refresh_token = self.refresh_token(key).await?;
        debug!(record = %key, mode = exchanger.mode().as_str(), "refreshing access token");
        let tokens = exchanger.refresh(&refresh_token).await?;
        self.store_tokens(key, &tokens).await
    }

    async fn load(&self, key: &RecordKey) -> Result<StoredCredential> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no credential for {key}")))
    }

    fn open(&self, key: &RecordKey, encrypted: &str) -> Result<Secret<String>> {
        self.cipher.decrypt(encrypted).map(Secret::new).map_err(|e| {
            warn!(record = %key, error = %e, "stored token failed to decrypt");
            Error::Cipher(e)
        })
    }
}
