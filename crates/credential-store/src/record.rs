//! Credential records and the store interface

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use google_oauth::IdentityClaims;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which record the encrypted token fields belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// A signed-in user, identified by email.
    User { email: String },
    /// A third-party integration attached to one agent of one client.
    Integration {
        client_id: u64,
        agent_id: u64,
        kind: String,
    },
}

impl RecordKey {
    pub fn user(email: impl Into<String>) -> Self {
        RecordKey::User {
            email: email.into(),
        }
    }

    pub fn integration(client_id: u64, agent_id: u64, kind: impl Into<String>) -> Self {
        RecordKey::Integration {
            client_id,
            agent_id,
            kind: kind.into(),
        }
    }
}

/// Rendered as `user:<email>` or `integration:<client>:<agent>:<kind>`,
/// which is also the key in the credential file.
impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::User { email } => write!(f, "user:{email}"),
            RecordKey::Integration {
                client_id,
                agent_id,
                kind,
            } => write!(f, "integration:{client_id}:{agent_id}:{kind}"),
        }
    }
}

impl FromStr for RecordKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::CredentialParse(format!("invalid record key: {s}"));
        if let Some(email) = s.strip_prefix("user:") {
            if email.is_empty() {
                return Err(bad());
            }
            return Ok(RecordKey::user(email));
        }
        let rest = s.strip_prefix("integration:").ok_or_else(bad)?;
        let mut parts = rest.splitn(3, ':');
        let client_id = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let agent_id = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let kind = parts.next().filter(|k| !k.is_empty()).ok_or_else(bad)?;
        Ok(RecordKey::integration(client_id, agent_id, kind))
    }
}

/// Token fields as persisted. `access_token` and `refresh_token` hold
/// encrypted tokens, never plaintext.
///
/// `expires_at` and `updated_at` are unix timestamps in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: u64,
    pub updated_at: u64,
    #[serde(flatten)]
    pub identity: IdentityClaims,
}

/// Boxed future returned by store methods, for `Arc<dyn CredentialStore>`.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Builds the new credential for a record from its current value.
pub type UpdateFn<'a> =
    Box<dyn FnOnce(Option<&StoredCredential>) -> Result<StoredCredential> + Send + 'a>;

/// The persistence collaborator the credential core writes through.
pub trait CredentialStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a RecordKey) -> StoreFuture<'a, Option<StoredCredential>>;

    /// Insert or replace the credential for `key`.
    fn put<'a>(
        &'a self,
        key: &'a RecordKey,
        credential: StoredCredential,
    ) -> StoreFuture<'a, ()>;

    /// Replace the credential for `key` with `apply(current)`, with no other
    /// write to the store in between. If `apply` fails nothing is written.
    fn update<'a>(
        &'a self,
        key: &'a RecordKey,
        apply: UpdateFn<'a>,
    ) -> StoreFuture<'a, StoredCredential>;

    /// Remove and return the credential for `key`, if any.
    fn remove<'a>(&'a self, key: &'a RecordKey) -> StoreFuture<'a, Option<StoredCredential>>;

    fn keys(&self) -> StoreFuture<'_, Vec<RecordKey>>;
}
