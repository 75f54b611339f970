use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::pages::{PageClassification, PageTable};
use crate::auth::{CredentialStore, SessionOrchestrator, SessionState};
use crate::host::{ConfirmDialog, Navigator, Prompter};
use crate::utils::encode_component;

const LOGIN_REQUIRED_TITLE: &str = "Login required";
const LOGIN_REQUIRED_CONTENT: &str = "This feature requires you to log in. Log in now?";

/// The four host navigation primitives. The guard treats them all alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    NavigateTo,
    RedirectTo,
    ReLaunch,
    SwitchTab,
}

impl fmt::Display for NavigationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavigationKind::NavigateTo => "navigateTo",
            NavigationKind::RedirectTo => "redirectTo",
            NavigationKind::ReLaunch => "reLaunch",
            NavigationKind::SwitchTab => "switchTab",
        };
        f.write_str(name)
    }
}

/// A navigation attempt offered to the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub kind: NavigationKind,
    pub url: String,
}

impl Navigation {
    pub fn new(kind: NavigationKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }
}

/// What to do with a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Cancel and relaunch the home page.
    RedirectHome,
    /// Cancel; the credential is expired, re-authenticate then resume `target`.
    TriggerReauth { target: String },
    /// Cancel; no credential at all, ask the user before logging in.
    SoftPrompt { target: String },
}

/// Decide a navigation attempt. Priority order: an active session always
/// wins, then auth-required pages, then public pages, then the home fallback.
pub fn decide(url: &str, state: SessionState, pages: &PageTable) -> Decision {
    if state == SessionState::Active {
        return Decision::Allow;
    }

    match pages.classify(url) {
        PageClassification::AuthRequired => match state {
            SessionState::Expired => Decision::TriggerReauth {
                target: url.to_string(),
            },
            _ => Decision::SoftPrompt {
                target: url.to_string(),
            },
        },
        PageClassification::Public => Decision::Allow,
        PageClassification::Default => Decision::RedirectHome,
    }
}

pub struct NavigationGuard {
    credentials: Arc<CredentialStore>,
    orchestrator: Arc<SessionOrchestrator>,
    navigator: Arc<dyn Navigator>,
    prompter: Arc<dyn Prompter>,
    pages: PageTable,
}

impl NavigationGuard {
    pub fn new(
        credentials: Arc<CredentialStore>,
        orchestrator: Arc<SessionOrchestrator>,
        navigator: Arc<dyn Navigator>,
        prompter: Arc<dyn Prompter>,
        pages: PageTable,
    ) -> Self {
        Self {
            credentials,
            orchestrator,
            navigator,
            prompter,
            pages,
        }
    }

    pub fn pages(&self) -> &PageTable {
        &self.pages
    }

    /// Decide against the current session state without side effects.
    pub fn evaluate(&self, navigation: &Navigation) -> Decision {
        decide(&navigation.url, self.credentials.state(), &self.pages)
    }

    /// Returns whether the host may proceed. A blocked navigation is
    /// discarded; any follow-up (prompt, re-authentication, redirect) issues
    /// a new navigation. Must be called from within a tokio runtime.
    pub fn intercept(&self, navigation: &Navigation) -> bool {
        let decision = self.evaluate(navigation);
        debug!(kind = %navigation.kind, url = %navigation.url, ?decision, "Navigation intercepted");

        match decision {
            Decision::Allow => true,
            Decision::RedirectHome => {
                self.navigator.relaunch(&self.pages.home);
                false
            }
            Decision::SoftPrompt { target } => {
                self.soft_prompt(target);
                false
            }
            Decision::TriggerReauth { target } => {
                let orchestrator = self.orchestrator.clone();
                tokio::spawn(async move {
                    if let Err(e) = orchestrator.refresh_or_reauthenticate(&target).await {
                        warn!(destination = %target, error = %e, "Re-authentication failed");
                    }
                });
                false
            }
        }
    }

    /// No credential yet (a silent login may still be running): ask, then
    /// send the user home carrying the deferred target.
    fn soft_prompt(&self, target: String) {
        let prompter = self.prompter.clone();
        let navigator = self.navigator.clone();
        let home = self.pages.home.clone();

        tokio::spawn(async move {
            let dialog = ConfirmDialog::new(LOGIN_REQUIRED_TITLE, LOGIN_REQUIRED_CONTENT)
                .buttons("Log in now", "Later");
            if prompter.confirm(dialog).await {
                navigator.relaunch(&format!(
                    "{}?autoLogin=true&target={}",
                    home,
                    encode_component(&target)
                ));
            } else {
                navigator.relaunch(&home);
            }
        });
    }
}
