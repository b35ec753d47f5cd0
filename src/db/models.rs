use serde::{Deserialize, Serialize};

/// One persisted avatar entry, keyed by IRC handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarRecord {
    pub id: String,
    pub handle: String,
    pub avatar_url: String,
}
