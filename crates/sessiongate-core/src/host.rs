//! Host collaborators.
//!
//! The session layer never talks to the UI, the platform navigation stack or
//! the identity provider directly. The host application supplies these
//! through the traits below; [`Host`] bundles them for [`crate::App`].

use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

/// A modal confirmation dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmDialog {
    pub title: String,
    pub content: String,
    pub confirm_text: String,
    pub cancel_text: String,
}

impl ConfirmDialog {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            confirm_text: "OK".to_string(),
            cancel_text: "Cancel".to_string(),
        }
    }

    pub fn buttons(mut self, confirm: impl Into<String>, cancel: impl Into<String>) -> Self {
        self.confirm_text = confirm.into();
        self.cancel_text = cancel.into();
        self
    }
}

/// Modal and toast presentation.
pub trait Prompter: Send + Sync {
    /// Show a confirmation dialog. Resolves `true` when the user confirms;
    /// a dismissed or failed dialog counts as cancel.
    fn confirm(&self, dialog: ConfirmDialog) -> BoxFuture<'_, bool>;

    /// Show a transient notification. Fire-and-forget.
    fn toast(&self, message: &str);
}

/// Platform navigation stack.
pub trait Navigator: Send + Sync {
    /// Push a new page.
    fn navigate(&self, url: &str);

    /// Drop the page stack and open `url`.
    fn relaunch(&self, url: &str);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Identity provider failed: {0}")]
pub struct IdentityError(pub String);

/// External identity provider: yields a short-lived one-time code that the
/// backend exchanges for a credential.
pub trait IdentityProvider: Send + Sync {
    fn obtain_code(&self) -> BoxFuture<'_, Result<String, IdentityError>>;
}

/// Everything the host plugs into the session layer.
#[derive(Clone)]
pub struct Host {
    pub prompter: Arc<dyn Prompter>,
    pub navigator: Arc<dyn Navigator>,
    pub identity: Arc<dyn IdentityProvider>,
}
