//! JSON-file credential store
//!
//! Maps record keys to encrypted credentials in a single JSON file. All
//! writes go through an atomic temp-file + rename, and a tokio Mutex
//! serializes concurrent writers (parallel callbacks for the same user, a
//! refresh racing a re-login). The in-memory map only changes once the file
//! write has succeeded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::record::{CredentialStore, RecordKey, StoreFuture, StoredCredential, UpdateFn};

/// File-backed [`CredentialStore`].
///
/// Reads clone out of the in-memory map; the file is the durable copy.
pub struct FileCredentialStore {
    path: PathBuf,
    state: Mutex<HashMap<String, StoredCredential>>,
}

impl FileCredentialStore {
    /// Load credentials from `path`, creating an empty `{}` file on cold start.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let records: HashMap<String, StoredCredential> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            for key in records.keys() {
                if key.parse::<RecordKey>().is_err() {
                    warn!(key = %key, "credential file contains an unrecognized record key");
                }
            }
            info!(path = %path.display(), records = records.len(), "loaded credentials");
            records
        } else {
            info!(path = %path.display(), "credential file not found, starting with empty store");
            let records = HashMap::new();
            write_atomic(&path, &records).await?;
            records
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn get<'a>(&'a self, key: &'a RecordKey) -> StoreFuture<'a, Option<StoredCredential>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.get(&key.to_string()).cloned())
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a RecordKey,
        credential: StoredCredential,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let mut next = state.clone();
            next.insert(key.to_string(), credential);
            write_atomic(&self.path, &next).await?;
            *state = next;
            debug!(record = %key, "stored credential");
            Ok(())
        })
    }

    fn update<'a>(
        &'a self,
        key: &'a RecordKey,
        apply: UpdateFn<'a>,
    ) -> StoreFuture<'a, StoredCredential> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let id = key.to_string();
            let credential = apply(state.get(&id))?;
            let mut next = state.clone();
            next.insert(id, credential.clone());
            write_atomic(&self.path, &next).await?;
            *state = next;
            debug!(record = %key, "updated credential");
            Ok(credential)
        })
    }

    fn remove<'a>(&'a self, key: &'a RecordKey) -> StoreFuture<'a, Option<StoredCredential>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let id = key.to_string();
            if !state.contains_key(&id) {
                return Ok(None);
            }
            let mut next = state.clone();
            let removed = next.remove(&id);
            write_atomic(&self.path, &next).await?;
            *state = next;
            debug!(record = %key, "removed credential");
            Ok(removed)
        })
    }

    fn keys(&self) -> StoreFuture<'_, Vec<RecordKey>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.keys().filter_map(|k| k.parse().ok()).collect())
        })
    }
}

/// Write credentials atomically with 0600 permissions.
async fn write_atomic(path: &Path, data: &HashMap<String, StoredCredential>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
