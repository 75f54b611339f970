//! Scripted fakes for the host and transport seams, shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::api::{Transport, TransportFailure, TransportRequest, TransportResponse};
use crate::host::{ConfirmDialog, Host, IdentityError, IdentityProvider, Navigator, Prompter};

pub type Reply = Result<TransportResponse, TransportFailure>;

pub fn ok(body: Value) -> Reply {
    Ok(TransportResponse { status: 200, body })
}

pub fn code(code: i64, msg: &str) -> Reply {
    ok(json!({"code": code, "msg": msg}))
}

/// Transport answering from a queue of scripted replies; `{"code": 200}`
/// once the queue runs dry.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<TransportRequest>>,
    latency: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub fn count_path(&self, fragment: &str) -> usize {
        self.urls().iter().filter(|url| url.contains(fragment)).count()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, Reply> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ok(json!({"code": 200})));
        let latency = *self.latency.lock().unwrap();
        Box::pin(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            reply
        })
    }
}

/// Prompter that records everything and answers dialogs with a fixed choice.
pub struct RecordingPrompter {
    answer: AtomicBool,
    pub toasts: Mutex<Vec<String>>,
    pub dialogs: Mutex<Vec<ConfirmDialog>>,
}

impl RecordingPrompter {
    pub fn answering(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer: AtomicBool::new(answer),
            toasts: Mutex::new(Vec::new()),
            dialogs: Mutex::new(Vec::new()),
        })
    }

    pub fn toasts(&self) -> Vec<String> {
        self.toasts.lock().unwrap().clone()
    }

    pub fn dialogs(&self) -> Vec<ConfirmDialog> {
        self.dialogs.lock().unwrap().clone()
    }
}

impl Prompter for RecordingPrompter {
    fn confirm(&self, dialog: ConfirmDialog) -> BoxFuture<'_, bool> {
        self.dialogs.lock().unwrap().push(dialog);
        let answer = self.answer.load(Ordering::SeqCst);
        Box::pin(async move { answer })
    }

    fn toast(&self, message: &str) {
        self.toasts.lock().unwrap().push(message.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    Navigate(String),
    Relaunch(String),
}

#[derive(Default)]
pub struct RecordingNavigator {
    events: Mutex<Vec<NavEvent>>,
}

impl RecordingNavigator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<NavEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        self.events.lock().unwrap().push(NavEvent::Navigate(url.to_string()));
    }

    fn relaunch(&self, url: &str) {
        self.events.lock().unwrap().push(NavEvent::Relaunch(url.to_string()));
    }
}

/// Identity provider handing out a fixed code (or failing).
pub struct StaticIdentity {
    code: Option<String>,
    pub calls: AtomicUsize,
}

impl StaticIdentity {
    pub fn code(code: &str) -> Arc<Self> {
        Arc::new(Self {
            code: Some(code.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            code: None,
            calls: AtomicUsize::new(0),
        })
    }
}

impl IdentityProvider for StaticIdentity {
    fn obtain_code(&self) -> BoxFuture<'_, Result<String, IdentityError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .code
            .clone()
            .ok_or_else(|| IdentityError("authorization denied".to_string()));
        Box::pin(async move { result })
    }
}

pub struct Fakes {
    pub prompter: Arc<RecordingPrompter>,
    pub navigator: Arc<RecordingNavigator>,
    pub identity: Arc<StaticIdentity>,
}

impl Fakes {
    pub fn new(confirm: bool) -> Self {
        Self {
            prompter: RecordingPrompter::answering(confirm),
            navigator: RecordingNavigator::new(),
            identity: StaticIdentity::code("fresh-code"),
        }
    }

    pub fn host(&self) -> Host {
        Host {
            prompter: self.prompter.clone(),
            navigator: self.navigator.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// Let spawned tasks run to completion.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
