//! Sessiongate CLI - drive the session layer from a terminal.
//!
//! Runs the same gateway, login workflow and navigation guard a mobile host
//! would, against a real backend, with stdin dialogs and a file or keychain
//! credential store.

mod terminal;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sessiongate_core::{
    ApiError, App, Config, Decision, FileStorage, Host, IdentityProvider, KeyringStorage, Navigation,
    NavigationKind, RequestSpec, ReqwestTransport, Storage,
};
use terminal::{event_channel, HostEvent, TerminalIdentity, TerminalNavigator, TerminalPrompter};

// ============================================================================
// Constants
// ============================================================================

/// Directory for a daily rolling log file, in addition to stderr
const LOG_DIR_ENV: &str = "SESSIONGATE_LOG_DIR";

/// How long a command waits for a detached follow-up (dialog, re-login)
const FOLLOW_UP_TIMEOUT: Duration = Duration::from_secs(120);

const USAGE: &str = "\
Usage: sessiongate [--keyring] <command>

Commands:
  status                    Show session state and profile
  login [code]              Log in (code from argument, SESSIONGATE_IDENTITY_CODE or prompt)
  logout                    Log out and clear the local session
  get <path> [key=value...] Send a GET request through the gateway
  nav <path>                Run a page through the navigation guard";

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). The returned guard must be
/// held until exit so the file writer flushes.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "sessiongate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let use_keyring = match args.iter().position(|a| a == "--keyring") {
        Some(index) => {
            args.remove(index);
            true
        }
        None => false,
    };
    let Some(command) = args.first().cloned() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    let config = Config::load()?.with_env_overrides();
    let storage: Arc<dyn Storage> = if use_keyring {
        Arc::new(KeyringStorage::new())
    } else {
        let dir = config.data_dir()?;
        Arc::new(FileStorage::open_in(&dir).context("Failed to open credential file")?)
    };
    let transport = Arc::new(ReqwestTransport::new().context("Failed to build HTTP client")?);

    let (events_tx, mut events) = event_channel();
    let identity = Arc::new(TerminalIdentity);
    let host = Host {
        prompter: Arc::new(TerminalPrompter::new(events_tx.clone())),
        navigator: Arc::new(TerminalNavigator::new(events_tx)),
        identity: identity.clone(),
    };
    let app = App::new(config, transport, storage, host);
    info!(%command, "sessiongate starting");

    match command.as_str() {
        "status" => status(&app),
        "login" => login(&app, identity.as_ref(), rest.first().map(String::as_str)).await,
        "logout" => {
            app.logout().await?;
            println!("Logged out");
            Ok(())
        }
        "get" => get(&app, rest, &mut events).await,
        "nav" => match rest.first() {
            Some(path) => nav(&app, path, &mut events).await,
            None => bail!("nav needs a page path"),
        },
        other => {
            eprintln!("{}", USAGE);
            bail!("Unknown command: {}", other)
        }
    }
}

fn status(app: &App) -> Result<()> {
    let credential = app.credential();
    println!("State:   {}", app.state());
    match credential.expires_at {
        Some(at) => println!("Expires: {}", at.to_rfc3339()),
        None if credential.has_token() => println!("Expires: never"),
        None => {}
    }
    if let Some(profile) = app.profile() {
        println!("User:    {}", profile.display_name);
        if let Some(id) = profile.user_id {
            println!("User id: {}", id);
        }
        if profile.is_new_user {
            println!("New user");
        }
    }
    Ok(())
}

async fn login(app: &App, identity: &dyn IdentityProvider, code: Option<&str>) -> Result<()> {
    let code = match code {
        Some(code) => code.to_string(),
        None => identity
            .obtain_code()
            .await
            .context("Could not obtain an identity code")?,
    };
    let outcome = app.interactive_login(&code).await?;
    println!(
        "Logged in as {} (expires {})",
        outcome.profile.display_name,
        outcome.expires_at.to_rfc3339()
    );
    Ok(())
}

async fn get(app: &App, rest: &[String], events: &mut UnboundedReceiver<HostEvent>) -> Result<()> {
    let Some(path) = rest.first() else {
        bail!("get needs a request path");
    };
    let mut spec = RequestSpec::get(path.as_str());
    let params = parse_params(&rest[1..])?;
    if !params.is_empty() {
        spec = spec.params(Value::Object(params));
    }

    match app.send(spec).await {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(ApiError::SessionExpired) => {
            // The re-login dialog runs detached; see it through before exiting.
            let closed = wait_for(events, |e| matches!(e, HostEvent::DialogClosed(_))).await;
            if closed == Some(HostEvent::DialogClosed(true)) {
                wait_for(events, |e| matches!(e, HostEvent::Navigated(_))).await;
            }
            Err(ApiError::SessionExpired.into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn nav(app: &App, path: &str, events: &mut UnboundedReceiver<HostEvent>) -> Result<()> {
    let navigation = Navigation::new(NavigationKind::NavigateTo, path);
    let decision = app.evaluate(&navigation);
    if app.intercept(&navigation) {
        println!("Allowed: {}", path);
        return Ok(());
    }

    println!("Blocked: {:?}", decision);
    if matches!(decision, Decision::SoftPrompt { .. } | Decision::TriggerReauth { .. }) {
        wait_for(events, |e| matches!(e, HostEvent::Navigated(_))).await;
    }
    Ok(())
}

/// Wait for the first event matching `want`, or give up after the follow-up
/// timeout.
async fn wait_for(
    events: &mut UnboundedReceiver<HostEvent>,
    want: impl Fn(&HostEvent) -> bool,
) -> Option<HostEvent> {
    let wait = async {
        while let Some(event) = events.recv().await {
            if want(&event) {
                return Some(event);
            }
        }
        None
    };
    tokio::time::timeout(FOLLOW_UP_TIMEOUT, wait).await.ok().flatten()
}

/// Parse `key=value` pairs into a JSON object of string values.
fn parse_params(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut params = Map::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Expected key=value, got '{}'", pair);
        };
        params.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(params)
}
