use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{Storage, StorageResult};

/// Storage key for the serialized profile
const PROFILE_KEY: &str = "identity-profile";

/// Identity attributes returned by the login exchange. Opaque to the
/// session layer beyond display; stored as a single value so one write
/// replaces all of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct IdentityProfile {
    pub user_id: Option<String>,
    pub open_id: Option<String>,
    pub nickname: Option<String>,
    pub display_name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub is_new_user: bool,
}

impl IdentityProfile {
    pub fn load(storage: &dyn Storage) -> Option<Self> {
        let raw = match storage.get(PROFILE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read identity profile");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable identity profile");
                None
            }
        }
    }

    pub fn save(&self, storage: &dyn Storage) -> StorageResult<()> {
        let raw = serde_json::to_string(self)?;
        storage.set(PROFILE_KEY, &raw)
    }

    pub fn clear(storage: &dyn Storage) -> StorageResult<()> {
        storage.remove(PROFILE_KEY)
    }
}
