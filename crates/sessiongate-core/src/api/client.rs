//! Request gateway: every outbound call goes through [`RequestGateway::send`].
//!
//! The gateway attaches the bearer token, holds calls back while a login
//! flight is running, serializes query parameters and turns the backend's
//! `{code, msg, ...}` envelope into either the payload or a typed
//! [`ApiError`]. User-facing messages are raised here, where the failure is
//! detected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Method;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::query::append_query;
use super::transport::{Transport, TransportRequest};
use super::ApiError;
use crate::auth::{CredentialStore, FlightStatus, SessionState};
use crate::config::{Config, ErrorMessages};
use crate::host::{ConfirmDialog, Prompter};
use crate::utils::redact_token;

// ============================================================================
// Constants
// ============================================================================

/// Application code for success
const CODE_OK: i64 = 200;

/// Application code for an invalid or expired session
const CODE_UNAUTHORIZED: i64 = 401;

/// Application code for an internal server error
const CODE_SERVER_ERROR: i64 = 500;

const REAUTH_TITLE: &str = "Session expired";
const REAUTH_CONTENT: &str =
    "Your login has expired. You can stay on this page, or log in again.";

/// Called when the user accepts the re-authentication prompt after a 401.
pub trait SessionExpiryHandler: Send + Sync {
    fn on_session_expired(&self) -> BoxFuture<'_, ()>;
}

/// One outbound call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub params: Option<Value>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
    /// Send `Authorization: Bearer <token>` when a token exists.
    pub attach_token: bool,
    /// Part of the login/identity exchange; never deferred.
    pub identity_exchange: bool,
    /// Suppress toasts and the re-authentication prompt.
    pub quiet: bool,
    /// Fail fast unless the session is active.
    pub require_session: bool,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: None,
            body: None,
            timeout: None,
            attach_token: true,
            identity_exchange: false,
            quiet: false,
            require_session: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_token(mut self) -> Self {
        self.attach_token = false;
        self
    }

    /// Mark as the credential exchange itself: no token, no deferral.
    pub fn identity_exchange(mut self) -> Self {
        self.attach_token = false;
        self.identity_exchange = true;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn require_session(mut self) -> Self {
        self.require_session = true;
        self
    }
}

/// Gateway knobs taken from [`Config`].
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub default_timeout: Duration,
    pub deferral_poll: Duration,
    pub deferral_ceiling: Duration,
    pub exempt_paths: Vec<String>,
    pub error_messages: ErrorMessages,
}

impl From<&Config> for GatewaySettings {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_timeout: config.request_timeout(),
            deferral_poll: config.deferral_poll(),
            deferral_ceiling: config.deferral_ceiling(),
            exempt_paths: config.deferral_exempt_paths.clone(),
            error_messages: config.error_messages.clone(),
        }
    }
}

pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
    flight: FlightStatus,
    prompter: Arc<dyn Prompter>,
    expiry_handler: OnceLock<Weak<dyn SessionExpiryHandler>>,
    reauth_prompt_open: Arc<AtomicBool>,
    settings: GatewaySettings,
}

impl RequestGateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
        flight: FlightStatus,
        prompter: Arc<dyn Prompter>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            transport,
            credentials,
            flight,
            prompter,
            expiry_handler: OnceLock::new(),
            reauth_prompt_open: Arc::new(AtomicBool::new(false)),
            settings,
        }
    }

    /// Register the 401 recovery path. Only the first registration sticks.
    pub fn set_expiry_handler(&self, handler: Weak<dyn SessionExpiryHandler>) {
        if self.expiry_handler.set(handler).is_err() {
            warn!("Session expiry handler already registered");
        }
    }

    /// Send a request and return the response payload.
    pub async fn send(&self, spec: RequestSpec) -> Result<Value, ApiError> {
        // A new flight may start as soon as one lands; re-check before
        // dispatch, all under one ceiling.
        let deadline = Instant::now() + self.settings.deferral_ceiling;
        while self.should_defer(&spec) {
            self.wait_for_login(&spec.path, deadline).await?;
        }

        if spec.require_session {
            let state = self.credentials.state();
            if state != SessionState::Active {
                debug!(path = %spec.path, %state, "Rejecting request that needs a session");
                return Err(ApiError::NotAuthenticated { state });
            }
        }

        let mut headers = Vec::new();
        if spec.attach_token {
            if let Some(token) = self.credentials.access_token() {
                debug!(token = %redact_token(&token), "Attaching bearer token");
                headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
            }
        }

        let path = append_query(&spec.path, spec.params.as_ref());
        let request = TransportRequest {
            method: spec.method.clone(),
            url: format!("{}{}", self.settings.base_url, path),
            headers,
            body: spec.body.clone(),
            timeout: spec.timeout.unwrap_or(self.settings.default_timeout),
        };
        debug!(method = %request.method, path = %path, "Dispatching request");

        match self.transport.send(request).await {
            Ok(response) => self.classify_response(&spec, response.body),
            Err(failure) => {
                let err = ApiError::from_transport(failure);
                warn!(path = %spec.path, error = %err, "Request failed without a response");
                self.surface(&spec, &err.user_message());
                Err(err)
            }
        }
    }

    /// Whether a call should wait for the login flight to land.
    fn should_defer(&self, spec: &RequestSpec) -> bool {
        !spec.identity_exchange && !self.is_exempt(&spec.path) && self.flight.in_flight()
    }

    fn is_exempt(&self, path: &str) -> bool {
        self.settings
            .exempt_paths
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
    }

    async fn wait_for_login(&self, path: &str, deadline: Instant) -> Result<(), ApiError> {
        debug!(path, flow = ?self.flight.current(), "Login in flight, deferring request");
        let poll = self.settings.deferral_poll;
        let wait = async {
            while self.flight.in_flight() {
                tokio::time::sleep(poll).await;
            }
        };

        match tokio::time::timeout_at(deadline, wait).await {
            Ok(()) => {
                debug!(path, "Login flight landed, resuming request");
                Ok(())
            }
            Err(_) => {
                warn!(path, ceiling = ?self.settings.deferral_ceiling, "Gave up waiting for login");
                Err(ApiError::DeferralTimeout)
            }
        }
    }

    fn classify_response(&self, spec: &RequestSpec, body: Value) -> Result<Value, ApiError> {
        // A missing or zero code counts as success.
        let code = body
            .get("code")
            .and_then(Value::as_i64)
            .filter(|code| *code != 0)
            .unwrap_or(CODE_OK);
        let server_msg = body.get("msg").and_then(Value::as_str);

        match code {
            CODE_OK => Ok(body),
            CODE_UNAUTHORIZED => {
                warn!(path = %spec.path, "Server rejected the session");
                if !spec.quiet && !spec.identity_exchange {
                    self.prompt_reauthentication();
                }
                Err(ApiError::SessionExpired)
            }
            CODE_SERVER_ERROR => {
                let message = self.settings.error_messages.resolve(code, server_msg);
                warn!(path = %spec.path, %message, "Server error");
                self.surface(spec, &message);
                Err(ApiError::ServerError { message })
            }
            _ => {
                let message = self.settings.error_messages.resolve(code, server_msg);
                debug!(path = %spec.path, code, %message, "Server returned non-success code");
                self.surface(spec, &message);
                Err(ApiError::ServerStatus { code, message })
            }
        }
    }

    fn surface(&self, spec: &RequestSpec, message: &str) {
        if !spec.quiet {
            self.prompter.toast(message);
        }
    }

    /// Ask the user whether to log in again. Runs detached; the failing call
    /// has already been rejected by the time the user answers.
    fn prompt_reauthentication(&self) {
        if self.reauth_prompt_open.swap(true, Ordering::SeqCst) {
            debug!("Re-authentication prompt already showing");
            return;
        }

        let prompter = self.prompter.clone();
        let handler = self.expiry_handler.get().and_then(Weak::upgrade);
        let prompt_open = self.reauth_prompt_open.clone();

        tokio::spawn(async move {
            let dialog = ConfirmDialog::new(REAUTH_TITLE, REAUTH_CONTENT).buttons("Log in again", "Stay");
            let accepted = prompter.confirm(dialog).await;
            prompt_open.store(false, Ordering::SeqCst);

            if !accepted {
                debug!("User chose to stay after session expiry");
                return;
            }
            match handler {
                Some(handler) => handler.on_session_expired().await,
                None => warn!("No session expiry handler registered"),
            }
        });
    }
}
