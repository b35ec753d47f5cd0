use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::db::AvatarStore;

pub mod queue;

use self::queue::KeyedQueue;

/// Handle → avatar URL lookups backed by the avatar record store.
pub struct IdentityCache {
    store: Arc<dyn AvatarStore>,
    writers: KeyedQueue,
}

impl IdentityCache {
    pub fn new(store: Arc<dyn AvatarStore>) -> Self {
        Self {
            store,
            writers: KeyedQueue::new(),
        }
    }

    pub async fn get_avatar_url(&self, handle: &str) -> Option<String> {
        match self.store.find_by_handle(handle).await {
            Ok(Some(record)) if !record.avatar_url.trim().is_empty() => Some(record.avatar_url),
            Ok(_) => {
                debug!("no avatar stored for handle={}", handle);
                None
            }
            Err(err) => {
                warn!("avatar lookup failed for handle={}: {}", handle, err);
                None
            }
        }
    }

    /// Insert-or-update the avatar for `handle`. Writes for one handle are serialized.
    pub async fn set_avatar_url(&self, handle: &str, avatar_url: &str) -> bool {
        self.writers
            .run(handle, async {
                match self.store.upsert(handle, avatar_url).await {
                    Ok(record) => {
                        info!(
                            "avatar updated handle={} record={} url={}",
                            handle, record.id, avatar_url
                        );
                        true
                    }
                    Err(err) => {
                        error!("failed to store avatar for handle={}: {}", handle, err);
                        false
                    }
                }
            })
            .await
    }
}
