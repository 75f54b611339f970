//! Session orchestrator: login, re-authentication and logout workflows.
//!
//! The orchestrator is the only writer of the [`CredentialStore`]. It owns
//! the [`LoginFlight`], so at most one login flow runs at a time and the
//! request gateway holds other calls back until that flow lands.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::error::{LoginFailureKind, SessionError};
use super::flight::{FlightGuard, LoginFlight, LoginFlow};
use super::{CredentialStore, IdentityProfile, SessionState};
use crate::api::{RequestGateway, RequestSpec, SessionExpiryHandler};
use crate::config::Config;
use crate::host::Host;
use crate::storage::Storage;
use crate::utils::encode_component;

/// Timeout for a single credential exchange
const LOGIN_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Display name used when the backend sends neither nickname nor user id
const FALLBACK_DISPLAY_NAME: &str = "WeChat user";

/// Workflow knobs taken from [`Config`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub login_attempts: u32,
    pub login_retry_delay: Duration,
    pub credential_lifetime: chrono::Duration,
    pub login_exchange_path: String,
    pub logout_path: String,
    pub home_page: String,
    pub login_page: String,
    pub logout_cleanup_keys: Vec<String>,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            login_attempts: config.login_attempts.max(1),
            login_retry_delay: config.login_retry_delay(),
            credential_lifetime: config.credential_lifetime(),
            login_exchange_path: config.endpoints.login_exchange.clone(),
            logout_path: config.endpoints.logout.clone(),
            home_page: config.pages.home.clone(),
            login_page: config.pages.login.clone(),
            logout_cleanup_keys: config.logout_cleanup_keys.clone(),
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub flow: LoginFlow,
    pub expires_at: DateTime<Utc>,
    pub profile: IdentityProfile,
}

/// `data` section of the login exchange response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LoginData {
    token: Option<String>,
    expire_time: Option<i64>,
    refresh_token: Option<String>,
    user_id: Option<Value>,
    openid: Option<String>,
    nickname: Option<String>,
    phone: Option<String>,
    is_new_user: Option<bool>,
    avatar_url: Option<String>,
}

pub struct SessionOrchestrator {
    gateway: Arc<RequestGateway>,
    credentials: Arc<CredentialStore>,
    storage: Arc<dyn Storage>,
    flight: LoginFlight,
    host: Host,
    settings: SessionSettings,
}

impl SessionOrchestrator {
    pub fn new(
        gateway: Arc<RequestGateway>,
        credentials: Arc<CredentialStore>,
        storage: Arc<dyn Storage>,
        flight: LoginFlight,
        host: Host,
        settings: SessionSettings,
    ) -> Self {
        Self {
            gateway,
            credentials,
            storage,
            flight,
            host,
            settings,
        }
    }

    pub fn state(&self) -> SessionState {
        self.credentials.state()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn login_in_flight(&self) -> Option<LoginFlow> {
        self.flight.current()
    }

    pub fn profile(&self) -> Option<IdentityProfile> {
        IdentityProfile::load(self.storage.as_ref())
    }

    /// Exchange a one-time identity code for a credential, retrying failed
    /// exchanges up to the configured attempt count.
    pub async fn interactive_login(&self, code: &str) -> Result<LoginOutcome, SessionError> {
        self.login(LoginFlow::Interactive, code).await
    }

    /// Same exchange as [`Self::interactive_login`], started without user
    /// action from a previously obtained identity signal.
    pub async fn silent_login(&self, code: &str) -> Result<LoginOutcome, SessionError> {
        self.login(LoginFlow::Silent, code).await
    }

    async fn login(&self, flow: LoginFlow, code: &str) -> Result<LoginOutcome, SessionError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(SessionError::EmptyIdentityCode);
        }

        let state = self.state();
        if state != SessionState::Anonymous {
            return Err(SessionError::InvalidTransition {
                from: state,
                operation: "log in",
            });
        }

        let guard = self.begin(flow)?;
        let result = self.run_login(&guard, code).await;
        drop(guard);
        result
    }

    /// Recover an expired session: drop the stale credential, fetch a fresh
    /// identity code, log in again and reissue navigation to `target`.
    pub async fn refresh_or_reauthenticate(&self, target: &str) -> Result<LoginOutcome, SessionError> {
        let state = self.state();
        if state != SessionState::Expired {
            return Err(SessionError::InvalidTransition {
                from: state,
                operation: "re-authenticate",
            });
        }

        let guard = self.begin(LoginFlow::Interactive)?;
        info!(destination = %target, "Session expired, re-authenticating");
        if let Err(e) = self.clear_local() {
            warn!(error = %e, "Failed to fully clear expired session");
        }

        let result = match self.host.identity.obtain_code().await {
            Ok(code) => self.run_login(&guard, &code).await,
            Err(e) => {
                warn!(error = %e, "Identity provider failed during re-authentication");
                self.host.prompter.toast(&SessionError::Identity(e.clone()).user_message());
                Err(e.into())
            }
        };
        drop(guard);

        match result {
            Ok(outcome) => {
                debug!(destination = %target, "Resuming navigation after re-authentication");
                self.host.navigator.navigate(target);
                Ok(outcome)
            }
            Err(e) => {
                let url = format!(
                    "{}?reLogin=true&target={}",
                    self.settings.home_page,
                    encode_component(target)
                );
                self.host.navigator.relaunch(&url);
                Err(e)
            }
        }
    }

    /// Invalidate the server-side session (best effort) and clear all local
    /// session state. Local state is cleared even when the server call fails.
    pub async fn logout(&self) -> Result<(), SessionError> {
        if self.credentials.access_token().is_some() {
            let spec = RequestSpec::post(self.settings.logout_path.as_str()).quiet();
            if let Err(e) = self.gateway.send(spec).await {
                warn!(error = %e, "Server-side logout failed, clearing local session anyway");
            }
        } else {
            debug!("No token held, skipping server-side logout");
        }

        self.clear_local()?;
        info!("Logged out");
        Ok(())
    }

    /// Recovery path for a server-rejected session.
    pub async fn logout_and_redirect(&self) {
        if let Err(e) = self.logout().await {
            warn!(error = %e, "Logout reported an error");
        }
        self.host.navigator.relaunch(&self.settings.login_page);
    }

    fn begin(&self, flow: LoginFlow) -> Result<FlightGuard, SessionError> {
        self.flight.try_begin(flow).map_err(|running| {
            warn!(requested = %flow, %running, "Rejecting concurrent login");
            SessionError::LoginInProgress(running)
        })
    }

    /// Exchange, validate and persist. The caller holds the flight.
    async fn run_login(&self, guard: &FlightGuard, code: &str) -> Result<LoginOutcome, SessionError> {
        let flow = guard.flow();
        let result = match self.exchange_with_retry(code).await {
            Ok(body) => self.persist_login(flow, &body),
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                info!(
                    %flow,
                    user_id = ?outcome.profile.user_id,
                    is_new_user = outcome.profile.is_new_user,
                    "Login successful"
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(%flow, error = %e, "Login failed");
                self.host.prompter.toast(&e.user_message());
                Err(e)
            }
        }
    }

    async fn exchange_with_retry(&self, code: &str) -> Result<Value, SessionError> {
        let attempts = self.settings.login_attempts;
        let mut remaining = attempts;

        loop {
            let spec = RequestSpec::post(self.settings.login_exchange_path.as_str())
                .identity_exchange()
                .quiet()
                .body(json!({ "code": code }))
                .timeout(LOGIN_EXCHANGE_TIMEOUT);

            match self.gateway.send(spec).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    remaining -= 1;
                    if remaining == 0 {
                        return Err(SessionError::LoginExhausted {
                            attempts,
                            kind: LoginFailureKind::classify(&e),
                            source: e,
                        });
                    }
                    warn!(remaining, error = %e, "Login exchange failed, retrying");
                    tokio::time::sleep(self.settings.login_retry_delay).await;
                }
            }
        }
    }

    fn persist_login(&self, flow: LoginFlow, body: &Value) -> Result<LoginOutcome, SessionError> {
        let data: LoginData = match body.get("data") {
            Some(data) if data.is_object() => serde_json::from_value(data.clone())
                .map_err(|e| SessionError::MalformedResponse(e.to_string()))?,
            _ => return Err(SessionError::MalformedResponse("missing data".to_string())),
        };
        let token = match data.token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => return Err(SessionError::MalformedResponse("missing token".to_string())),
        };

        // Zero or negative means the server did not set a lifetime.
        let expires_at = data
            .expire_time
            .filter(|ms| *ms > 0)
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(|| Utc::now() + self.settings.credential_lifetime);
        let profile = profile_from(&data);

        let saved = self
            .credentials
            .set(token, Some(expires_at), data.refresh_token.as_deref())
            .and_then(|()| profile.save(self.storage.as_ref()));
        if let Err(e) = saved {
            // Credential and profile land together or not at all.
            warn!(error = %e, "Failed to persist login, rolling back");
            if let Err(rollback) = self.credentials.clear() {
                warn!(error = %rollback, "Failed to roll back credential");
            }
            if let Err(rollback) = IdentityProfile::clear(self.storage.as_ref()) {
                warn!(error = %rollback, "Failed to roll back profile");
            }
            return Err(e.into());
        }

        Ok(LoginOutcome {
            flow,
            expires_at,
            profile,
        })
    }

    fn clear_local(&self) -> Result<(), SessionError> {
        let credential_result = self.credentials.clear();
        let profile_result = IdentityProfile::clear(self.storage.as_ref());
        for key in &self.settings.logout_cleanup_keys {
            if let Err(e) = self.storage.remove(key) {
                warn!(key = %key, error = %e, "Failed to remove session key");
            }
        }
        credential_result?;
        profile_result?;
        Ok(())
    }
}

impl SessionExpiryHandler for SessionOrchestrator {
    fn on_session_expired(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.logout_and_redirect())
    }
}

fn profile_from(data: &LoginData) -> IdentityProfile {
    let user_id = data.user_id.as_ref().and_then(|id| match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let nickname = data.nickname.clone().filter(|n| !n.is_empty());
    let display_name = match (&nickname, &user_id) {
        (Some(nickname), _) => nickname.clone(),
        (None, Some(id)) => format!("User {}", id),
        (None, None) => FALLBACK_DISPLAY_NAME.to_string(),
    };

    IdentityProfile {
        user_id,
        open_id: data.openid.clone().filter(|s| !s.is_empty()),
        nickname,
        display_name,
        phone: data.phone.clone().filter(|s| !s.is_empty()),
        avatar_url: data.avatar_url.clone().filter(|s| !s.is_empty()),
        is_new_user: data.is_new_user.unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::api::{ApiError, GatewaySettings, TransportFailure};
    use crate::auth::INVALID_IDENTITY_CODE;
    use crate::storage::{MemoryStorage, StorageError, StorageResult};
    use crate::testing::{code, ok, Fakes, NavEvent, ScriptedTransport, StaticIdentity};

    struct Harness {
        transport: Arc<ScriptedTransport>,
        storage: Arc<MemoryStorage>,
        credentials: Arc<CredentialStore>,
        fakes: Fakes,
        orchestrator: Arc<SessionOrchestrator>,
    }

    fn harness() -> Harness {
        let storage = Arc::new(MemoryStorage::new());
        harness_with(Fakes::new(true), storage.clone(), storage)
    }

    /// `backend` is what the session layer writes through; `storage` is
    /// the memory store underneath it.
    fn harness_with(fakes: Fakes, storage: Arc<MemoryStorage>, backend: Arc<dyn Storage>) -> Harness {
        let config = Config::default();
        let transport = ScriptedTransport::new();
        let credentials = Arc::new(CredentialStore::load(backend.clone()));
        let flight = LoginFlight::new();
        let gateway = Arc::new(RequestGateway::new(
            transport.clone(),
            credentials.clone(),
            flight.status(),
            fakes.prompter.clone(),
            GatewaySettings::from(&config),
        ));
        let orchestrator = Arc::new(SessionOrchestrator::new(
            gateway,
            credentials.clone(),
            backend,
            flight,
            fakes.host(),
            SessionSettings::from(&config),
        ));
        Harness {
            transport,
            storage,
            credentials,
            fakes,
            orchestrator,
        }
    }

    /// Memory store that refuses writes to one key.
    struct RefusingKey {
        inner: Arc<MemoryStorage>,
        key: &'static str,
    }

    impl Storage for RefusingKey {
        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            if key == self.key {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            self.inner.remove(key)
        }
    }

    fn login_reply(data: Value) -> crate::testing::Reply {
        ok(json!({"code": 200, "msg": "ok", "data": data}))
    }

    #[tokio::test]
    async fn test_interactive_login_stores_credential() {
        let h = harness();
        let expire_ms = (Utc::now() + ChronoDuration::hours(2)).timestamp_millis();
        h.transport.push(login_reply(json!({
            "token": "T2",
            "expireTime": expire_ms,
            "refreshToken": "R2",
            "userId": 42,
            "openid": "o-123",
            "nickname": "Lin",
            "isNewUser": true
        })));

        let outcome = h.orchestrator.interactive_login("abc").await.unwrap();
        assert_eq!(outcome.flow, LoginFlow::Interactive);
        assert_eq!(outcome.expires_at.timestamp_millis(), expire_ms);

        let credential = h.credentials.get();
        assert_eq!(credential.access_token.as_deref(), Some("T2"));
        assert_eq!(credential.refresh_token.as_deref(), Some("R2"));
        assert_eq!(credential.expires_at.map(|t| t.timestamp_millis()), Some(expire_ms));
        assert!(h.orchestrator.is_logged_in());

        let profile = h.orchestrator.profile().unwrap();
        assert_eq!(profile.user_id.as_deref(), Some("42"));
        assert_eq!(profile.open_id.as_deref(), Some("o-123"));
        assert_eq!(profile.display_name, "Lin");
        assert!(profile.is_new_user);

        let request = &h.transport.requests()[0];
        assert!(request.url.ends_with("/c/auth/wx-login"));
        assert_eq!(request.header("Authorization"), None);
        assert_eq!(request.body, Some(json!({"code": "abc"})));
        assert_eq!(request.timeout, LOGIN_EXCHANGE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_login_defaults_to_seven_day_lifetime() {
        let h = harness();
        h.transport.push(login_reply(json!({"token": "T"})));

        let before = Utc::now();
        let outcome = h.orchestrator.silent_login("abc").await.unwrap();
        assert_eq!(outcome.flow, LoginFlow::Silent);
        assert!(outcome.expires_at >= before + ChronoDuration::days(7));
        assert!(outcome.expires_at <= Utc::now() + ChronoDuration::days(7));
        assert_eq!(outcome.profile.display_name, FALLBACK_DISPLAY_NAME);
    }

    #[tokio::test]
    async fn test_display_name_falls_back_to_user_id() {
        let h = harness();
        h.transport.push(login_reply(json!({"token": "T", "userId": "7", "nickname": ""})));

        let outcome = h.orchestrator.interactive_login("abc").await.unwrap();
        assert_eq!(outcome.profile.display_name, "User 7");
        assert_eq!(outcome.profile.nickname, None);
    }

    #[tokio::test]
    async fn test_malformed_response_is_not_retried() {
        let h = harness();
        h.transport.push(login_reply(json!({"userId": 1})));

        let err = h.orchestrator.interactive_login("abc").await.unwrap_err();
        assert!(matches!(err, SessionError::MalformedResponse(_)));
        assert_eq!(h.transport.requests().len(), 1);
        assert_eq!(h.credentials.state(), SessionState::Anonymous);
        assert_eq!(h.fakes.prompter.toasts(), vec!["Unexpected login response"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_exchange_stops_after_attempt_budget() {
        let h = harness();
        for _ in 0..5 {
            h.transport.push(Err(TransportFailure::connectivity()));
        }

        let started = tokio::time::Instant::now();
        let err = h.orchestrator.interactive_login("abc").await.unwrap_err();
        match &err {
            SessionError::LoginExhausted { attempts, kind, source } => {
                assert_eq!(*attempts, 3);
                assert_eq!(*kind, LoginFailureKind::Network);
                assert!(matches!(source, ApiError::Connectivity(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(h.transport.requests().len(), 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(
            h.fakes.prompter.toasts(),
            vec!["Network connection failed, please check your network settings"]
        );
        assert_eq!(h.orchestrator.login_in_flight(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_identity_code_is_reported() {
        let h = harness();
        for _ in 0..3 {
            h.transport.push(code(INVALID_IDENTITY_CODE, "invalid code"));
        }

        let err = h.orchestrator.interactive_login("stale").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::LoginExhausted { kind: LoginFailureKind::InvalidIdentityCode, .. }
        ));
        assert_eq!(err.user_message(), "The authorization code is invalid, please try again");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_on_later_attempt() {
        let h = harness();
        h.transport
            .push(Err(TransportFailure::timeout()))
            .push(login_reply(json!({"token": "T3"})));

        h.orchestrator.interactive_login("abc").await.unwrap();
        assert_eq!(h.transport.requests().len(), 2);
        assert_eq!(h.credentials.access_token().as_deref(), Some("T3"));
        assert!(h.fakes.prompter.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_empty_code_never_hits_network() {
        let h = harness();
        let err = h.orchestrator.interactive_login("  ").await.unwrap_err();
        assert!(matches!(err, SessionError::EmptyIdentityCode));
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_login_is_rejected() {
        let h = harness();
        h.transport.set_latency(Duration::from_millis(300));
        h.transport.push(login_reply(json!({"token": "T"})));

        let first = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.interactive_login("abc").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.orchestrator.login_in_flight(), Some(LoginFlow::Interactive));

        let err = h.orchestrator.silent_login("def").await.unwrap_err();
        assert!(matches!(err, SessionError::LoginInProgress(LoginFlow::Interactive)));

        first.await.unwrap().unwrap();
        assert_eq!(h.transport.count_path("/c/auth/wx-login"), 1);
    }

    #[tokio::test]
    async fn test_login_while_active_is_invalid() {
        let h = harness();
        h.credentials.set("T", None, None).unwrap();

        let err = h.orchestrator.interactive_login("abc").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition { from: SessionState::Active, .. }
        ));
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let h = harness();
        h.credentials.set("T", Some(Utc::now() + ChronoDuration::days(1)), Some("R")).unwrap();
        IdentityProfile::default().save(h.storage.as_ref()).unwrap();
        h.storage.set("needRetryLogin", "1").unwrap();
        h.transport.push(Err(TransportFailure::connectivity()));

        h.orchestrator.logout().await.unwrap();

        assert_eq!(h.credentials.get(), crate::auth::Credential::default());
        assert!(h.orchestrator.profile().is_none());
        assert!(h.storage.is_empty());
        assert_eq!(h.transport.count_path("/logout"), 1);
        assert!(h.fakes.prompter.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_logout_without_token_skips_server() {
        let h = harness();
        h.orchestrator.logout().await.unwrap();
        assert!(h.transport.requests().is_empty());
        assert_eq!(h.credentials.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_logout_and_redirect_relaunches_login_page() {
        let h = harness();
        h.credentials.set("T", None, None).unwrap();

        h.orchestrator.logout_and_redirect().await;
        assert_eq!(h.credentials.state(), SessionState::Anonymous);
        assert_eq!(
            h.fakes.navigator.events(),
            vec![NavEvent::Relaunch("/pages/login".to_string())]
        );
    }

    #[tokio::test]
    async fn test_reauthenticate_resumes_target() {
        let h = harness();
        h.credentials
            .set("OLD", Some(Utc::now() - ChronoDuration::seconds(1)), None)
            .unwrap();
        h.transport.push(login_reply(json!({"token": "NEW"})));

        h.orchestrator
            .refresh_or_reauthenticate("/pages/appointment/index?deptId=3")
            .await
            .unwrap();

        assert_eq!(h.fakes.identity.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.transport.requests()[0].body, Some(json!({"code": "fresh-code"})));
        assert_eq!(h.credentials.access_token().as_deref(), Some("NEW"));
        assert!(h.orchestrator.is_logged_in());
        assert_eq!(
            h.fakes.navigator.events(),
            vec![NavEvent::Navigate("/pages/appointment/index?deptId=3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_reauthenticate_requires_expired_session() {
        let h = harness();
        let err = h.orchestrator.refresh_or_reauthenticate("/pages/mine/index").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition { from: SessionState::Anonymous, .. }
        ));
        assert_eq!(h.fakes.identity.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reauthentication_returns_home() {
        let h = harness();
        h.credentials
            .set("OLD", Some(Utc::now() - ChronoDuration::seconds(1)), None)
            .unwrap();
        for _ in 0..3 {
            h.transport.push(code(500, "down"));
        }

        let err = h.orchestrator.refresh_or_reauthenticate("/pages/mine/index").await.unwrap_err();
        assert!(matches!(err, SessionError::LoginExhausted { .. }));
        assert_eq!(h.credentials.state(), SessionState::Anonymous);
        assert_eq!(
            h.fakes.navigator.events(),
            vec![NavEvent::Relaunch(
                "/pages/index?reLogin=true&target=%2Fpages%2Fmine%2Findex".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_non_positive_expiry_uses_default_lifetime() {
        let h = harness();
        h.transport.push(login_reply(json!({"token": "T", "expireTime": 0})));

        let outcome = h.orchestrator.interactive_login("abc").await.unwrap();
        assert!(outcome.expires_at > Utc::now() + ChronoDuration::days(6));
        assert_eq!(h.credentials.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_failed_profile_write_rolls_back_credential() {
        let storage = Arc::new(MemoryStorage::new());
        let backend = Arc::new(RefusingKey {
            inner: storage.clone(),
            key: "identity-profile",
        });
        let h = harness_with(Fakes::new(true), storage, backend);
        h.transport.push(login_reply(json!({"token": "T", "nickname": "Lin"})));

        let err = h.orchestrator.interactive_login("abc").await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert_eq!(h.credentials.state(), SessionState::Anonymous);
        assert!(h.storage.is_empty());
        assert!(h.orchestrator.profile().is_none());
    }

    #[tokio::test]
    async fn test_identity_failure_during_reauthentication_returns_home() {
        let storage = Arc::new(MemoryStorage::new());
        let mut fakes = Fakes::new(true);
        fakes.identity = StaticIdentity::failing();
        let h = harness_with(fakes, storage.clone(), storage);
        h.credentials
            .set("OLD", Some(Utc::now() - ChronoDuration::seconds(1)), None)
            .unwrap();

        let err = h.orchestrator.refresh_or_reauthenticate("/pages/mine/index").await.unwrap_err();
        assert!(matches!(err, SessionError::Identity(_)));
        assert!(h.transport.requests().is_empty());
        assert_eq!(h.fakes.prompter.toasts(), vec!["Failed to obtain authorization".to_string()]);
        assert_eq!(h.credentials.state(), SessionState::Anonymous);
        assert_eq!(
            h.fakes.navigator.events(),
            vec![NavEvent::Relaunch(
                "/pages/index?reLogin=true&target=%2Fpages%2Fmine%2Findex".to_string()
            )]
        );
    }
}
