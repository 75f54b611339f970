//! Session layer configuration.
//!
//! Everything the host application decides statically lives here: backend
//! location, timeouts, retry policy, page classification and the
//! code-to-message table used when classifying server responses.
//!
//! Configuration is stored at `~/.config/sessiongate/config.json`. Missing
//! fields fall back to the defaults below.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::nav::PageTable;

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "sessiongate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `base_url`
const BASE_URL_ENV: &str = "SESSIONGATE_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Re-check interval while a request waits out a login flight.
const DEFAULT_DEFERRAL_POLL_MS: u64 = 100;

/// A request never waits longer than this for a login flight to finish.
const DEFAULT_DEFERRAL_CEILING_MS: u64 = 10_000;

const DEFAULT_LOGIN_ATTEMPTS: u32 = 3;

const DEFAULT_LOGIN_RETRY_DELAY_MS: u64 = 1_000;

/// Lifetime given to a credential when the server does not send one.
const DEFAULT_CREDENTIAL_LIFETIME_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub deferral_poll_ms: u64,
    pub deferral_ceiling_ms: u64,
    /// Path fragments that identify login/identity calls; these are never deferred.
    pub deferral_exempt_paths: Vec<String>,
    pub login_attempts: u32,
    pub login_retry_delay_ms: u64,
    pub credential_lifetime_days: i64,
    pub endpoints: Endpoints,
    pub pages: PageTable,
    pub error_messages: ErrorMessages,
    /// Extra storage keys wiped on logout.
    pub logout_cleanup_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            deferral_poll_ms: DEFAULT_DEFERRAL_POLL_MS,
            deferral_ceiling_ms: DEFAULT_DEFERRAL_CEILING_MS,
            deferral_exempt_paths: vec!["/login".to_string(), "/getInfo".to_string()],
            login_attempts: DEFAULT_LOGIN_ATTEMPTS,
            login_retry_delay_ms: DEFAULT_LOGIN_RETRY_DELAY_MS,
            credential_lifetime_days: DEFAULT_CREDENTIAL_LIFETIME_DAYS,
            endpoints: Endpoints::default(),
            pages: PageTable::default(),
            error_messages: ErrorMessages::default(),
            logout_cleanup_keys: vec![
                "showNewUserGuide".to_string(),
                "needRetryLogin".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load from the standard location, or defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment overrides on top of the loaded values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the file-backed session store.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn deferral_poll(&self) -> Duration {
        Duration::from_millis(self.deferral_poll_ms.max(1))
    }

    pub fn deferral_ceiling(&self) -> Duration {
        Duration::from_millis(self.deferral_ceiling_ms)
    }

    pub fn login_retry_delay(&self) -> Duration {
        Duration::from_millis(self.login_retry_delay_ms)
    }

    pub fn credential_lifetime(&self) -> chrono::Duration {
        chrono::Duration::days(self.credential_lifetime_days)
    }
}

/// Backend paths the session layer calls itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub login_exchange: String,
    pub logout: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login_exchange: "/c/auth/wx-login".to_string(),
            logout: "/logout".to_string(),
        }
    }
}

/// Application status code to user-facing message table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorMessages {
    pub codes: BTreeMap<i64, String>,
    pub default: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        let codes = [
            (401, "Authentication failed, unable to access system resources"),
            (403, "You do not have permission for this operation"),
            (404, "The requested resource does not exist"),
        ]
        .into_iter()
        .map(|(code, msg)| (code, msg.to_string()))
        .collect();

        Self {
            codes,
            default: "Unknown system error, please contact the administrator".to_string(),
        }
    }
}

impl ErrorMessages {
    /// Table entry, then the server's own message, then the default.
    pub fn resolve(&self, code: i64, server_msg: Option<&str>) -> String {
        if let Some(msg) = self.codes.get(&code) {
            return msg.clone();
        }
        match server_msg {
            Some(msg) if !msg.trim().is_empty() => msg.to_string(),
            _ => self.default.clone(),
        }
    }
}
