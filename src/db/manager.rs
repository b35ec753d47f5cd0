use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AvatarStoreConfig;
use crate::db::{AirtableStore, AvatarStore, DatabaseError, MemoryAvatarStore};

#[derive(Clone)]
pub struct DatabaseManager {
    avatar_store: Arc<dyn AvatarStore>,
}

impl DatabaseManager {
    pub fn new(config: Option<&AvatarStoreConfig>) -> Result<Self, DatabaseError> {
        let avatar_store: Arc<dyn AvatarStore> = match config {
            Some(config) => {
                let store = AirtableStore::new(config)?;
                info!(
                    "avatar store: airtable base={} table={}",
                    config.base_id, config.table
                );
                Arc::new(store)
            }
            None => {
                warn!("no avatar store configured; avatars will not survive a restart");
                Arc::new(MemoryAvatarStore::new())
            }
        };
        Ok(Self { avatar_store })
    }

    pub fn avatar_store(&self) -> Arc<dyn AvatarStore> {
        self.avatar_store.clone()
    }
}
