//! Application facade.
//!
//! [`App`] wires the credential store, request gateway, session orchestrator
//! and navigation guard together for a host. It owns one of each and is the
//! surface the host calls into.

use std::sync::{Arc, Weak};

use serde_json::Value;
use tracing::info;

use crate::api::{ApiError, GatewaySettings, RequestGateway, RequestSpec, SessionExpiryHandler, Transport};
use crate::auth::{
    Credential, CredentialStore, IdentityProfile, LoginFlight, LoginOutcome, SessionError,
    SessionOrchestrator, SessionSettings, SessionState,
};
use crate::config::Config;
use crate::host::Host;
use crate::nav::{Decision, Navigation, NavigationGuard};
use crate::storage::Storage;

pub struct App {
    config: Config,
    credentials: Arc<CredentialStore>,
    gateway: Arc<RequestGateway>,
    orchestrator: Arc<SessionOrchestrator>,
    guard: NavigationGuard,
}

impl App {
    /// Build the session layer. The credential store is rehydrated from
    /// `storage` immediately.
    pub fn new(config: Config, transport: Arc<dyn Transport>, storage: Arc<dyn Storage>, host: Host) -> Self {
        let credentials = Arc::new(CredentialStore::load(storage.clone()));
        let flight = LoginFlight::new();

        let gateway = Arc::new(RequestGateway::new(
            transport,
            credentials.clone(),
            flight.status(),
            host.prompter.clone(),
            GatewaySettings::from(&config),
        ));

        let orchestrator = Arc::new(SessionOrchestrator::new(
            gateway.clone(),
            credentials.clone(),
            storage.clone(),
            flight,
            host.clone(),
            SessionSettings::from(&config),
        ));
        let handler = Arc::downgrade(&orchestrator) as Weak<dyn SessionExpiryHandler>;
        gateway.set_expiry_handler(handler);

        let guard = NavigationGuard::new(
            credentials.clone(),
            orchestrator.clone(),
            host.navigator.clone(),
            host.prompter.clone(),
            config.pages.clone(),
        );

        info!(
            backend = %storage.name(),
            base_url = %config.base_url,
            state = %credentials.state(),
            "Session layer ready"
        );

        Self {
            config,
            credentials,
            gateway,
            orchestrator,
            guard,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn send(&self, spec: RequestSpec) -> Result<Value, ApiError> {
        self.gateway.send(spec).await
    }

    pub async fn interactive_login(&self, code: &str) -> Result<LoginOutcome, SessionError> {
        self.orchestrator.interactive_login(code).await
    }

    pub async fn silent_login(&self, code: &str) -> Result<LoginOutcome, SessionError> {
        self.orchestrator.silent_login(code).await
    }

    pub async fn logout(&self) -> Result<(), SessionError> {
        self.orchestrator.logout().await
    }

    pub async fn logout_and_redirect(&self) {
        self.orchestrator.logout_and_redirect().await
    }

    pub async fn refresh_or_reauthenticate(&self, target: &str) -> Result<LoginOutcome, SessionError> {
        self.orchestrator.refresh_or_reauthenticate(target).await
    }

    pub fn is_logged_in(&self) -> bool {
        self.orchestrator.is_logged_in()
    }

    pub fn state(&self) -> SessionState {
        self.credentials.state()
    }

    /// Snapshot of the stored credential.
    pub fn credential(&self) -> Credential {
        self.credentials.get()
    }

    pub fn profile(&self) -> Option<IdentityProfile> {
        self.orchestrator.profile()
    }

    pub fn evaluate(&self, navigation: &Navigation) -> Decision {
        self.guard.evaluate(navigation)
    }

    /// See [`NavigationGuard::intercept`].
    pub fn intercept(&self, navigation: &Navigation) -> bool {
        self.guard.intercept(navigation)
    }
}
