use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::{Storage, StorageResult};

/// Storage keys
const TOKEN_KEY: &str = "App-Token";
const REFRESH_TOKEN_KEY: &str = "App-Refresh-Token";
const TOKEN_EXPIRE_KEY: &str = "App-Token-Expire";

/// Session state derived from a credential. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionState {
    Anonymous,
    Active,
    Expired,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Anonymous => "anonymous",
            SessionState::Active => "active",
            SessionState::Expired => "expired",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// `None` means the credential never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if !self.has_token() {
            SessionState::Anonymous
        } else if self.is_expired_at(now) {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }

    pub fn state(&self) -> SessionState {
        self.state_at(Utc::now())
    }
}

/// Durable holder of the access token, refresh token and expiry.
///
/// Values are rehydrated from storage once and written through on every
/// change. The in-memory copy is behind a lock that is never held across
/// an await point.
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
    current: RwLock<Credential>,
}

impl CredentialStore {
    /// Load whatever credential the storage backend already holds.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let access_token = read_key(storage.as_ref(), TOKEN_KEY);
        let refresh_token = read_key(storage.as_ref(), REFRESH_TOKEN_KEY);
        let expires_at = read_key(storage.as_ref(), TOKEN_EXPIRE_KEY).and_then(|raw| {
            let parsed = raw
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis);
            if parsed.is_none() {
                warn!(value = %raw, "Ignoring unparseable token expiry");
            }
            parsed
        });

        let credential = Credential {
            access_token,
            refresh_token,
            expires_at,
        };
        debug!(
            backend = storage.name(),
            state = %credential.state(),
            "Credential rehydrated"
        );

        Self {
            storage,
            current: RwLock::new(credential),
        }
    }

    pub fn get(&self) -> Credential {
        self.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn state(&self) -> SessionState {
        self.read().state()
    }

    pub fn is_expired(&self) -> bool {
        self.read().is_expired()
    }

    /// Store a new access token. An absent expiry or refresh token leaves
    /// the previously stored value in place.
    pub fn set(
        &self,
        access_token: &str,
        expires_at: Option<DateTime<Utc>>,
        refresh_token: Option<&str>,
    ) -> StorageResult<()> {
        let mut current = self.write();

        self.storage.set(TOKEN_KEY, access_token)?;
        current.access_token = Some(access_token.to_string());

        if let Some(expires_at) = expires_at {
            self.storage
                .set(TOKEN_EXPIRE_KEY, &expires_at.timestamp_millis().to_string())?;
            current.expires_at = Some(expires_at);
        }

        if let Some(refresh_token) = refresh_token {
            self.storage.set(REFRESH_TOKEN_KEY, refresh_token)?;
            current.refresh_token = Some(refresh_token.to_string());
        }

        Ok(())
    }

    /// Forget the credential. The in-memory copy is emptied even when the
    /// storage backend fails; the first storage error is returned.
    pub fn clear(&self) -> StorageResult<()> {
        *self.write() = Credential::default();

        let mut first_err = None;
        for key in [TOKEN_KEY, TOKEN_EXPIRE_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove credential key");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Credential> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Credential> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn read_key(storage: &dyn Storage, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(Some(value)) if !value.is_empty() => Some(value),
        Ok(_) => None,
        Err(e) => {
            warn!(key, error = %e, "Failed to read credential key, treating as absent");
            None
        }
    }
}
