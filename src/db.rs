pub use self::airtable::AirtableStore;
pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::memory::MemoryAvatarStore;
pub use self::models::AvatarRecord;
pub use self::stores::AvatarStore;

pub mod airtable;
pub mod error;
pub mod manager;
pub mod memory;
pub mod models;
pub mod stores;
