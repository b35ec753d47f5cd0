use async_trait::async_trait;

use super::DatabaseError;
use super::models::AvatarRecord;

#[async_trait]
pub trait AvatarStore: Send + Sync {
    async fn find_by_handle(&self, handle: &str) -> Result<Option<AvatarRecord>, DatabaseError>;

    async fn create(&self, handle: &str, avatar_url: &str) -> Result<AvatarRecord, DatabaseError>;

    async fn update(
        &self,
        record_id: &str,
        avatar_url: &str,
    ) -> Result<AvatarRecord, DatabaseError>;

    /// Read-then-write upsert. Stores with a native insert-or-update primitive override this.
    async fn upsert(&self, handle: &str, avatar_url: &str) -> Result<AvatarRecord, DatabaseError> {
        match self.find_by_handle(handle).await? {
            Some(existing) => self.update(&existing.id, avatar_url).await,
            None => self.create(handle, avatar_url).await,
        }
    }
}
