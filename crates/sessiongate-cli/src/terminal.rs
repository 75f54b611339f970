//! Terminal implementations of the host collaborators.
//!
//! Dialogs read a yes/no answer from stdin, toasts and navigation are
//! printed to stderr. Every dialog answer and navigation is also reported on
//! an event channel so commands can wait for detached follow-ups.

use std::io::{self, BufRead, Write};

use futures::future::BoxFuture;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use sessiongate_core::{ConfirmDialog, IdentityError, IdentityProvider, Navigator, Prompter};

/// Environment variable holding a one-time identity code
const IDENTITY_CODE_ENV: &str = "SESSIONGATE_IDENTITY_CODE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    DialogClosed(bool),
    Navigated(String),
}

pub fn event_channel() -> (UnboundedSender<HostEvent>, UnboundedReceiver<HostEvent>) {
    unbounded_channel()
}

/// Blocking line read, off the async runtime.
async fn read_line(prompt: String) -> io::Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut stderr = io::stderr();
        write!(stderr, "{}", prompt)?;
        stderr.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    })
    .await
    .map_err(io::Error::other)?
}

pub struct TerminalPrompter {
    events: UnboundedSender<HostEvent>,
}

impl TerminalPrompter {
    pub fn new(events: UnboundedSender<HostEvent>) -> Self {
        Self { events }
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, dialog: ConfirmDialog) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let prompt = format!(
                "\n{}\n{}\n[y] {}  [n] {} > ",
                dialog.title, dialog.content, dialog.confirm_text, dialog.cancel_text
            );
            let accepted = match read_line(prompt).await {
                Ok(answer) => matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"),
                Err(e) => {
                    debug!(error = %e, "Dialog read failed, treating as cancel");
                    false
                }
            };
            let _ = self.events.send(HostEvent::DialogClosed(accepted));
            accepted
        })
    }

    fn toast(&self, message: &str) {
        eprintln!("[toast] {}", message);
    }
}

pub struct TerminalNavigator {
    events: UnboundedSender<HostEvent>,
}

impl TerminalNavigator {
    pub fn new(events: UnboundedSender<HostEvent>) -> Self {
        Self { events }
    }

    fn report(&self, verb: &str, url: &str) {
        eprintln!("[{}] {}", verb, url);
        let _ = self.events.send(HostEvent::Navigated(url.to_string()));
    }
}

impl Navigator for TerminalNavigator {
    fn navigate(&self, url: &str) {
        self.report("navigate", url);
    }

    fn relaunch(&self, url: &str) {
        self.report("relaunch", url);
    }
}

/// Takes the code from `SESSIONGATE_IDENTITY_CODE`, else asks for one.
pub struct TerminalIdentity;

impl IdentityProvider for TerminalIdentity {
    fn obtain_code(&self) -> BoxFuture<'_, Result<String, IdentityError>> {
        Box::pin(async move {
            if let Ok(code) = std::env::var(IDENTITY_CODE_ENV) {
                if !code.trim().is_empty() {
                    return Ok(code);
                }
            }
            let code = read_line("Identity code > ".to_string())
                .await
                .map_err(|e| IdentityError(e.to_string()))?;
            if code.is_empty() {
                return Err(IdentityError("no identity code entered".to_string()));
            }
            Ok(code)
        })
    }
}
