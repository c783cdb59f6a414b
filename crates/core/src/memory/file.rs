use crate::config::{HistoryCap, StoreConfig};
use crate::memory::{ProfileStore, StorageError, UserProfile};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const LOG_TARGET: &str = "memory::file";

/// One JSON document per user under a table directory.
///
/// Saves write a temporary file and `rename` it over the target, so readers
/// only ever see a complete document. Saves for the same user are serialized
/// on a per-user lock.
#[derive(Clone)]
pub struct JsonFileProfileStore {
    dir: PathBuf,
    cap: HistoryCap,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl JsonFileProfileStore {
    /// Opens (creating if needed) the table directory described by `config`.
    pub async fn open(config: &StoreConfig) -> Result<Self, StorageError> {
        Self::open_dir(config.table_dir(), config.history_cap).await
    }

    pub async fn open_dir(dir: impl Into<PathBuf>, cap: HistoryCap) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::from_io("create table dir", e))?;
        tracing::info!(target: LOG_TARGET, dir = %dir.display(), "profile table ready");
        Ok(Self {
            dir,
            cap,
            locks: Arc::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf, StorageError> {
        if user_id.is_empty() {
            return Err(StorageError::Permanent("empty user id".to_owned()));
        }
        Ok(self.dir.join(format!("{}.json", encode_file_stem(user_id))))
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(user_id.to_owned()).or_default().clone()
    }

    /// Forgets the user's lock once nobody else holds or waits on it.
    async fn release_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(user_id);
        }
    }

    async fn write_atomically(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let tmp = path.with_extension(format!("json.{:016x}.tmp", rand::random::<u64>()));
        let result = async {
            let mut file = tokio::fs::File::create(&tmp)
                .await
                .map_err(|e| StorageError::from_io("create temp file", e))?;
            file.write_all(bytes)
                .await
                .map_err(|e| StorageError::from_io("write profile", e))?;
            file.sync_all()
                .await
                .map_err(|e| StorageError::from_io("sync profile", e))?;
            drop(file);
            tokio::fs::rename(&tmp, path)
                .await
                .map_err(|e| StorageError::from_io("replace profile", e))
        }
        .await;

        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&tmp).await {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(target: LOG_TARGET, path = %tmp.display(), error = %e, "failed to remove temp file");
                }
            }
        }
        result
    }
}

impl ProfileStore for JsonFileProfileStore {
    fn load(&self, user_id: String) -> BoxFuture<'_, Result<UserProfile, StorageError>> {
        async move {
            let path = self.path_for(&user_id)?;
            let raw = match tokio::fs::read(&path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(target: LOG_TARGET, %user_id, "no stored profile, starting fresh");
                    return Ok(UserProfile::new(user_id));
                }
                Err(e) => return Err(StorageError::from_io("read profile", e)),
            };

            let mut profile: UserProfile = serde_json::from_slice(&raw).map_err(|e| {
                StorageError::Permanent(format!("corrupt profile {}: {e}", path.display()))
            })?;
            if profile.user_id != user_id {
                return Err(StorageError::Permanent(format!(
                    "profile {} belongs to another user",
                    path.display()
                )));
            }
            profile.enforce_caps(self.cap);
            Ok(profile)
        }
        .boxed()
    }

    fn save(&self, mut profile: UserProfile) -> BoxFuture<'_, Result<(), StorageError>> {
        async move {
            let path = self.path_for(&profile.user_id)?;
            profile.enforce_caps(self.cap);
            let bytes = serde_json::to_vec_pretty(&profile)
                .map_err(|e| StorageError::Permanent(format!("serialize profile: {e}")))?;

            let lock = self.user_lock(&profile.user_id).await;
            let guard = lock.lock().await;
            let written = self.write_atomically(&path, &bytes).await;
            drop(guard);
            self.release_lock(&profile.user_id, lock).await;
            written?;
            tracing::debug!(target: LOG_TARGET, user_id = %profile.user_id, bytes = bytes.len(), "profile saved");
            Ok(())
        }
        .boxed()
    }
}

/// Percent-encodes everything outside the URL unreserved set, so any platform
/// user id maps to one file name inside the table directory. A leading dot is
/// encoded too, keeping documents visible.
fn encode_file_stem(user_id: &str) -> String {
    let encoded = urlencoding::encode(user_id);
    match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{rest}"),
        None => encoded.into_owned(),
    }
}
