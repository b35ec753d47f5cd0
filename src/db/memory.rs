use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{AvatarRecord, AvatarStore, DatabaseError};

/// Process-local avatar table. Entries are lost on restart.
#[derive(Default)]
pub struct MemoryAvatarStore {
    records: Mutex<Vec<AvatarRecord>>,
    next_id: AtomicU64,
}

impl MemoryAvatarStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let store = Self::new();
        {
            let mut guard = store.records.lock();
            for (handle, avatar_url) in records {
                let id = store.allocate_id();
                guard.push(AvatarRecord {
                    id,
                    handle,
                    avatar_url,
                });
            }
        }
        store
    }

    #[cfg(test)]
    pub fn records_for(&self, handle: &str) -> Vec<AvatarRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.handle == handle)
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn allocate_id(&self) -> String {
        format!("mem{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl AvatarStore for MemoryAvatarStore {
    async fn find_by_handle(&self, handle: &str) -> Result<Option<AvatarRecord>, DatabaseError> {
        Ok(self
            .records
            .lock()
            .iter()
            .find(|record| record.handle == handle)
            .cloned())
    }

    async fn create(&self, handle: &str, avatar_url: &str) -> Result<AvatarRecord, DatabaseError> {
        let record = AvatarRecord {
            id: self.allocate_id(),
            handle: handle.to_string(),
            avatar_url: avatar_url.to_string(),
        };
        self.records.lock().push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        record_id: &str,
        avatar_url: &str,
    ) -> Result<AvatarRecord, DatabaseError> {
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|record| record.id == record_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("avatar record {record_id}")))?;
        record.avatar_url = avatar_url.to_string();
        Ok(record.clone())
    }
}
