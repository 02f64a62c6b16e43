//! Finder orchestrator.
//!
//! Drives one finder invocation end to end:
//!
//! ```text
//!   query ──► SelectionPlan ──► SessionEngine::start ──► AgentSession
//!                 ▲                                          │
//!                 │  quota / error                           │ TurnEnd / ToolCall*
//!                 └──── UnavailabilityRegistry ◄─────────────┤
//!                                                            ▼
//!                                     RunBoard ──► FinderUpdate / FinderOutcome
//! ```
//!
//! Candidates are tried one after another. A failed attempt puts its model
//! in cooldown and the next candidate from the same plan is started, until
//! an attempt completes, the invocation is aborted, or the plan runs dry.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::failure::{
    classify_failure, final_failure_message, is_abort_like, looks_like_silent_failure,
};
use super::model_select::{ModelCandidate, ModelSelection, SelectionPlan};
use super::run::{AbortController, RunBoard, UpdateSender};
use super::types::{
    AttemptFailure, FinderDetails, FinderOutcome, RunRecord, RunStatus, ABORTED_SUMMARY,
    NO_OUTPUT_SUMMARY,
};
use crate::backend::{
    last_assistant_text, AgentSession, ContentBlock, ModelRegistry, SessionConfig, SessionEngine,
    SessionError, SessionEvent, ToolAdmission, ToolHooks,
};
use crate::budget::TurnBudget;
use crate::config::Config;
use crate::prompts::{system_prompt, user_prompt};
use crate::provider_health::UnavailabilityRegistry;
use crate::tools::read_only_tools;

/// Message returned for an empty query.
pub const INVALID_QUERY_MESSAGE: &str =
    "Invalid parameters: expected `query` to be a non-empty string.";

/// Input of one finder invocation.
#[derive(Debug, Clone)]
pub struct FinderRequest {
    pub query: String,
    /// The caller's ambient model, tried once after every override.
    pub fallback_model: Option<ModelCandidate>,
}

impl FinderRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            fallback_model: None,
        }
    }

    pub fn with_fallback(mut self, model: ModelCandidate) -> Self {
        self.fallback_model = Some(model);
        self
    }
}

/// How a single model attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptResult {
    /// The run reached `done` or `aborted`; stop trying candidates.
    Finished,
    /// The run errored with this message; the next candidate may be tried.
    Failed(String),
}

/// Runs read-only search sessions under a turn budget.
pub struct Finder {
    config: Config,
    models: Arc<dyn ModelRegistry>,
    engine: Arc<dyn SessionEngine>,
    health: UnavailabilityRegistry,
}

impl Finder {
    pub fn new(
        config: Config,
        models: Arc<dyn ModelRegistry>,
        engine: Arc<dyn SessionEngine>,
        health: UnavailabilityRegistry,
    ) -> Self {
        Self {
            config,
            models,
            engine,
            health,
        }
    }

    /// Run one finder invocation.
    ///
    /// Never fails: every failure ends up in the returned outcome. Progress
    /// snapshots are pushed to `updates` while the run is live. Cancelling
    /// `cancel` aborts the run and cancels the live session; this call returns
    /// only after that cancellation has settled.
    pub async fn run(
        &self,
        request: FinderRequest,
        cancel: CancellationToken,
        updates: Option<UpdateSender>,
    ) -> FinderOutcome {
        let query = request.query.trim();
        if query.is_empty() {
            return invalid_query_outcome(&self.config);
        }

        let board = Arc::new(RunBoard::new(
            query,
            Some(self.config.workspace.clone()),
            updates,
        ));
        let controller = Arc::new(AbortController::new(board.clone()));

        if cancel.is_cancelled() {
            debug!("Cancellation requested before start");
            controller.abort_all().await;
            return board.outcome(None);
        }

        board.emit(true);
        let _watcher = AbortOnCancel::spawn(cancel, controller.clone());

        let mut plan = SelectionPlan::new(
            self.config.model_overrides.clone(),
            request.fallback_model.clone(),
        );
        let mut failure_text = None;

        loop {
            if !begin_attempt(&board, &controller) {
                break;
            }

            let Some(selection) = plan
                .next_candidate(self.models.as_ref(), &self.health)
                .await
            else {
                let attempts = board.attempts();
                let message = if attempts.is_empty() {
                    plan.no_candidate_message()
                } else {
                    final_failure_message(&attempts)
                };
                warn!(attempts = attempts.len(), "{}", message);
                if !attempts.is_empty() {
                    failure_text = Some(message.clone());
                }
                board.update_run(true, |run| {
                    run.finish(RunStatus::Error, message.clone(), Some(message))
                });
                break;
            };

            board.set_selection(&selection);
            info!(
                model = %selection.label(),
                reason = %selection.reason,
                attempt = board.attempts().len() + 1,
                "Starting finder attempt"
            );

            match self.run_attempt(query, &selection, &board, &controller).await {
                AttemptResult::Finished => break,
                AttemptResult::Failed(message) => {
                    let reason = classify_failure(&message);
                    let until = self.health.mark(&selection.candidate, reason).await;
                    warn!(
                        model = %selection.label(),
                        reason = %reason,
                        until = %until,
                        error = %message,
                        "Finder attempt failed, model put in cooldown"
                    );
                    board.push_attempt(AttemptFailure {
                        model_label: selection.label(),
                        reason,
                        message,
                    });
                }
            }
        }

        controller.wait_settled().await;
        board.outcome(failure_text)
    }

    async fn run_attempt(
        &self,
        query: &str,
        selection: &ModelSelection,
        board: &RunBoard,
        controller: &Arc<AbortController>,
    ) -> AttemptResult {
        let budget = TurnBudget::new(self.config.max_turns);
        let session_config = SessionConfig {
            model: selection.candidate.clone(),
            thinking_level: selection.thinking_level,
            system_prompt: system_prompt(budget.max_turns()),
            tools: read_only_tools(),
            hooks: Arc::new(FinderHooks {
                budget,
                controller: controller.clone(),
            }),
            workspace: self.config.workspace.clone(),
            event_buffer: self.config.event_buffer,
        };

        let session = match self.engine.start(session_config).await {
            Ok(session) => session,
            Err(error) => return finish_with_error(board, controller, error),
        };

        let id = Uuid::new_v4();
        let _active = ActiveSession {
            controller: controller.clone(),
            id,
            session: session.clone(),
        };
        if controller.register(id, session.clone()) {
            debug!("Abort already in flight, cancelling new session");
            if let Err(error) = session.cancel().await {
                warn!(error = %error, "Session cancellation failed");
            }
            board.update_run(true, RunRecord::abort);
            return AttemptResult::Finished;
        }

        let mut events = session.subscribe();
        let prompt = user_prompt(query);
        let instruction = session.send_instruction(&prompt);
        tokio::pin!(instruction);

        let result = loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => apply_event(board, event),
                result = &mut instruction => break result,
            }
        };
        while let Ok(event) = events.try_recv() {
            apply_event(board, event);
        }
        drop(events);

        if let Err(error) = result {
            return finish_with_error(board, controller, error);
        }

        let aborted = controller.is_aborted();
        let text = last_assistant_text(&session.messages()).trim().to_string();
        let summary = match (text.is_empty(), aborted) {
            (false, _) => text,
            (true, true) => ABORTED_SUMMARY.to_string(),
            (true, false) => NO_OUTPUT_SUMMARY.to_string(),
        };
        let status = if aborted {
            RunStatus::Aborted
        } else {
            RunStatus::Done
        };
        board.update_run(true, |run| run.finish(status, summary, None));

        if let Some(run) = board.primary_run() {
            if looks_like_silent_failure(&run) {
                warn!(
                    model = %selection.label(),
                    turns = run.turns,
                    "Finder finished without tool calls or output"
                );
            } else {
                info!(
                    model = %selection.label(),
                    status = %run.status,
                    turns = run.turns,
                    tool_calls = run.tool_calls.len(),
                    "Finder attempt finished"
                );
            }
        }
        AttemptResult::Finished
    }
}

/// Reset the run for a new attempt unless the invocation was aborted.
///
/// An aborted invocation keeps its run untouched: either the abort already
/// marked it aborted, or it reached a terminal status before the abort.
fn begin_attempt(board: &RunBoard, controller: &AbortController) -> bool {
    if controller.is_aborted() {
        return false;
    }
    board.update_run(false, RunRecord::reset);
    true
}

fn apply_event(board: &RunBoard, event: SessionEvent) {
    match event {
        SessionEvent::TurnEnd => {
            board.update_run(false, RunRecord::record_turn);
        }
        SessionEvent::ToolCallStart { id, name, args } => {
            board.update_run(true, |run| run.record_tool_start(id, name, args));
        }
        SessionEvent::ToolCallEnd { id, is_error } => {
            board.update_run(true, |run| run.record_tool_end(&id, is_error));
        }
    }
}

fn finish_with_error(
    board: &RunBoard,
    controller: &AbortController,
    error: SessionError,
) -> AttemptResult {
    if controller.is_aborted() || is_abort_like(&error) {
        debug!(error = %error, "Session ended by cancellation");
        board.update_run(true, |run| {
            run.finish(RunStatus::Aborted, ABORTED_SUMMARY.to_string(), None)
        });
        return AttemptResult::Finished;
    }

    let message = error.to_string();
    board.update_run(true, |run| {
        run.finish(RunStatus::Error, message.clone(), Some(message.clone()))
    });
    AttemptResult::Failed(message)
}

fn invalid_query_outcome(config: &Config) -> FinderOutcome {
    FinderOutcome {
        text: INVALID_QUERY_MESSAGE.to_string(),
        details: FinderDetails {
            status: RunStatus::Error,
            workspace: Some(config.workspace.clone()),
            subagent_provider: None,
            subagent_model_id: None,
            subagent_selection: None,
            runs: Vec::new(),
            attempts: Vec::new(),
        },
        is_error: true,
    }
}

/// Session hooks: the turn budget, plus a hard block once aborted.
struct FinderHooks {
    budget: TurnBudget,
    controller: Arc<AbortController>,
}

impl ToolHooks for FinderHooks {
    fn on_turn_start(&self, turn_index: u32) {
        self.budget.on_turn_start(turn_index);
    }

    fn admit_tool_call(&self, tool_name: &str) -> ToolAdmission {
        if self.controller.is_aborted() {
            return ToolAdmission::Block {
                reason: SessionError::Cancelled.to_string(),
            };
        }
        self.budget.admit_tool_call(tool_name)
    }

    fn annotate_tool_result(&self, content: Vec<ContentBlock>) -> Vec<ContentBlock> {
        self.budget.annotate_tool_result(content)
    }
}

/// Unregisters and disposes a session on every exit path.
struct ActiveSession {
    controller: Arc<AbortController>,
    id: Uuid,
    session: Arc<dyn AgentSession>,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.controller.unregister(self.id);
        self.session.dispose();
    }
}

/// Forwards an external cancellation into the abort controller.
/// The watcher task stops when this guard is dropped.
struct AbortOnCancel(JoinHandle<()>);

impl AbortOnCancel {
    fn spawn(cancel: CancellationToken, controller: Arc<AbortController>) -> Self {
        Self(tokio::spawn(async move {
            cancel.cancelled().await;
            controller.abort_all().await;
        }))
    }
}

impl Drop for AbortOnCancel {
    fn drop(&mut self) {
        self.0.abort();
    }
}
