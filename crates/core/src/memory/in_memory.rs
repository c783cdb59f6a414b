use crate::config::HistoryCap;
use crate::memory::{ProfileStore, StorageError, UserProfile};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local store. Records are replaced whole under the write lock, so a
/// reader sees either the old or the new profile.
#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<HashMap<String, UserProfile>>>,
    cap: HistoryCap,
}

impl InMemoryProfileStore {
    pub fn new(cap: HistoryCap) -> Self {
        Self {
            profiles: Arc::default(),
            cap,
        }
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn load(&self, user_id: String) -> BoxFuture<'_, Result<UserProfile, StorageError>> {
        async move {
            let profiles = self.profiles.read().await;
            Ok(profiles
                .get(&user_id)
                .cloned()
                .unwrap_or_else(|| UserProfile::new(user_id)))
        }
        .boxed()
    }

    fn save(&self, mut profile: UserProfile) -> BoxFuture<'_, Result<(), StorageError>> {
        async move {
            profile.enforce_caps(self.cap);
            self.profiles
                .write()
                .await
                .insert(profile.user_id.clone(), profile);
            Ok(())
        }
        .boxed()
    }
}
