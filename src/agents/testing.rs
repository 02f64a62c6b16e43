//! Scripted session engine for orchestrator tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agents::ModelCandidate;
use crate::backend::{
    AgentSession, ContentBlock, Message, Role, SessionConfig, SessionEngine, SessionError,
    SessionEvent, ToolAdmission, ToolHooks,
};

/// One scripted action performed during `send_instruction`.
#[derive(Debug, Clone)]
pub enum Step {
    /// Report a turn boundary to the hooks, then emit `TurnEnd` if `end` is set.
    Turn { index: u32, end: bool },
    /// Ask the hooks to admit a tool; run it (start/end events) only if allowed.
    Tool {
        id: &'static str,
        name: &'static str,
        args: Value,
        is_error: bool,
    },
    /// Emit a raw event.
    Event(SessionEvent),
    /// Append an assistant message.
    Reply(&'static str),
    /// Return this error from `send_instruction`.
    Fail(SessionError),
    /// Block until `cancel` is called, then return `Cancelled`.
    WaitForCancel,
}

pub fn tool(id: &'static str, name: &'static str, args: Value) -> Step {
    Step::Tool {
        id,
        name,
        args,
        is_error: false,
    }
}

pub fn turn(index: u32) -> Step {
    Step::Turn { index, end: true }
}

pub struct ScriptedSession {
    steps: Mutex<Vec<Step>>,
    hooks: Option<Arc<dyn ToolHooks>>,
    buffer: usize,
    events: Mutex<Option<mpsc::Sender<SessionEvent>>>,
    messages: Mutex<Vec<Message>>,
    cancel: CancellationToken,
    cancel_calls: AtomicUsize,
    cancel_error: Option<String>,
    disposed: AtomicBool,
    blocked: Mutex<Vec<String>>,
    annotations: Mutex<Vec<String>>,
}

impl ScriptedSession {
    pub fn new(steps: Vec<Step>, hooks: Option<Arc<dyn ToolHooks>>, buffer: usize) -> Self {
        Self {
            steps: Mutex::new(steps),
            hooks,
            buffer: buffer.max(1),
            events: Mutex::new(None),
            messages: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            cancel_calls: AtomicUsize::new(0),
            cancel_error: None,
            disposed: AtomicBool::new(false),
            blocked: Mutex::new(Vec::new()),
            annotations: Mutex::new(Vec::new()),
        }
    }

    /// A session that waits for cancellation.
    pub fn idle() -> Self {
        Self::new(vec![Step::WaitForCancel], None, 8)
    }

    pub fn failing_cancel(mut self, message: &str) -> Self {
        self.cancel_error = Some(message.to_string());
        self
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn blocked(&self) -> Vec<String> {
        self.blocked.lock().unwrap().clone()
    }

    pub fn annotations(&self) -> Vec<String> {
        self.annotations.lock().unwrap().clone()
    }

    async fn send_event(&self, event: SessionEvent) {
        let sender = self.events.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }
}

#[async_trait]
impl AgentSession for ScriptedSession {
    fn subscribe(&self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel(self.buffer);
        *self.events.lock().unwrap() = Some(tx);
        rx
    }

    async fn send_instruction(&self, text: &str) -> Result<(), SessionError> {
        self.messages
            .lock()
            .unwrap()
            .push(Message::new(Role::User, vec![ContentBlock::text(text)]));

        let steps = std::mem::take(&mut *self.steps.lock().unwrap());
        for step in steps {
            match step {
                Step::Turn { index, end } => {
                    if let Some(hooks) = &self.hooks {
                        hooks.on_turn_start(index);
                    }
                    if end {
                        self.send_event(SessionEvent::TurnEnd).await;
                    }
                }
                Step::Tool {
                    id,
                    name,
                    args,
                    is_error,
                } => {
                    let admission = self
                        .hooks
                        .as_ref()
                        .map(|hooks| hooks.admit_tool_call(name))
                        .unwrap_or(ToolAdmission::Allow);
                    if let ToolAdmission::Block { reason } = admission {
                        self.blocked.lock().unwrap().push(reason);
                        continue;
                    }
                    self.send_event(SessionEvent::ToolCallStart {
                        id: id.to_string(),
                        name: name.to_string(),
                        args,
                    })
                    .await;
                    if let Some(hooks) = &self.hooks {
                        let annotated = hooks.annotate_tool_result(vec![ContentBlock::text("ok")]);
                        let text = annotated
                            .iter()
                            .filter_map(ContentBlock::as_text)
                            .collect::<String>();
                        self.annotations.lock().unwrap().push(text);
                    }
                    self.send_event(SessionEvent::ToolCallEnd {
                        id: id.to_string(),
                        is_error,
                    })
                    .await;
                }
                Step::Event(event) => self.send_event(event).await,
                Step::Reply(text) => self
                    .messages
                    .lock()
                    .unwrap()
                    .push(Message::assistant_text(text)),
                Step::Fail(error) => return Err(error),
                Step::WaitForCancel => {
                    self.cancel.cancelled().await;
                    return Err(SessionError::Cancelled);
                }
            }
        }
        Ok(())
    }

    fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    async fn cancel(&self) -> Result<(), SessionError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
        match &self.cancel_error {
            Some(message) => Err(SessionError::Failed(message.clone())),
            None => Ok(()),
        }
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

/// Engine that hands out one scripted session per `start`, keyed by model.
#[derive(Default)]
pub struct ScriptedEngine {
    scripts: Mutex<HashMap<String, VecDeque<Result<Vec<Step>, SessionError>>>>,
    started: Mutex<Vec<SessionConfig>>,
    sessions: Mutex<Vec<Arc<ScriptedSession>>>,
    cancel_on_start: Mutex<Option<CancellationToken>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, model: &str, steps: Vec<Step>) -> Self {
        self.push(model, Ok(steps))
    }

    /// Cancel `token` inside the next `start`, then yield before returning.
    pub fn cancel_on_start(self, token: CancellationToken) -> Self {
        *self.cancel_on_start.lock().unwrap() = Some(token);
        self
    }

    pub fn start_error(self, model: &str, error: SessionError) -> Self {
        self.push(model, Err(error))
    }

    fn push(self, model: &str, script: Result<Vec<Step>, SessionError>) -> Self {
        let key = model
            .parse::<ModelCandidate>()
            .map(|candidate| candidate.key())
            .unwrap_or_else(|_| model.to_lowercase());
        self.scripts
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .push_back(script);
        self
    }

    pub fn started(&self) -> Vec<SessionConfig> {
        self.started.lock().unwrap().clone()
    }

    pub fn started_models(&self) -> Vec<String> {
        self.started()
            .iter()
            .map(|config| config.model.key())
            .collect()
    }

    pub fn sessions(&self) -> Vec<Arc<ScriptedSession>> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionEngine for ScriptedEngine {
    async fn start(&self, config: SessionConfig) -> Result<Arc<dyn AgentSession>, SessionError> {
        self.started.lock().unwrap().push(config.clone());
        let cancel = self.cancel_on_start.lock().unwrap().take();
        if let Some(token) = cancel {
            token.cancel();
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
        }
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&config.model.key())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(SessionError::Start(format!("no script for {}", config.model))));

        let steps = script?;
        let session = Arc::new(ScriptedSession::new(
            steps,
            Some(config.hooks.clone()),
            config.event_buffer,
        ));
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}
