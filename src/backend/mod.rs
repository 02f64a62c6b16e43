//! Session engine contracts.
//!
//! The finder never talks to a model directly. It starts a session through a
//! [`SessionEngine`], consumes the session's typed event stream, and reads the
//! final message history. Tool execution and sandboxing live behind the engine.

pub mod events;
pub mod hooks;
pub mod message;
pub mod registry;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::agents::{ModelCandidate, ThinkingLevel};
use crate::tools::ToolSpec;

pub use events::SessionEvent;
pub use hooks::{ToolAdmission, ToolHooks};
pub use message::{last_assistant_text, ContentBlock, Message, Role};
pub use registry::{ModelRegistry, StaticModelRegistry};

/// Errors surfaced by a session engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to start session: {0}")]
    Start(String),

    /// The session stopped because cancellation was requested.
    #[error("Request was aborted")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

/// Everything an engine needs to start a finder session.
#[derive(Clone)]
pub struct SessionConfig {
    pub model: ModelCandidate,
    pub thinking_level: Option<ThinkingLevel>,
    pub system_prompt: String,
    pub tools: Vec<ToolSpec>,
    /// Tool-call admission and tool-result annotation.
    pub hooks: Arc<dyn ToolHooks>,
    pub workspace: PathBuf,
    /// Capacity of the event channel handed out by [`AgentSession::subscribe`].
    pub event_buffer: usize,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("model", &self.model)
            .field("thinking_level", &self.thinking_level)
            .field("tools", &self.tools.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("workspace", &self.workspace)
            .field("event_buffer", &self.event_buffer)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait SessionEngine: Send + Sync {
    async fn start(&self, config: SessionConfig) -> Result<Arc<dyn AgentSession>, SessionError>;
}

/// A running agent session.
///
/// # Invariants
/// - Events are delivered in engine dispatch order
/// - `ToolCallStart` for an id precedes its `ToolCallEnd`
#[async_trait]
pub trait AgentSession: Send + Sync {
    /// Open the event stream. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> mpsc::Receiver<SessionEvent>;

    /// Send the initial instruction and wait for the agent loop to finish.
    async fn send_instruction(&self, text: &str) -> Result<(), SessionError>;

    /// Message history accumulated so far.
    fn messages(&self) -> Vec<Message>;

    /// Request cancellation and wait until the engine acknowledges it.
    async fn cancel(&self) -> Result<(), SessionError>;

    /// Release engine resources. Called exactly once per started session.
    fn dispose(&self);
}
