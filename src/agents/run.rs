//! Shared state for one finder invocation.
//!
//! [`RunBoard`] owns the run records and pushes progress snapshots to the
//! caller. [`AbortController`] tracks the live sessions and turns an external
//! cancellation into a single, idempotent abort.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use uuid::Uuid;

use super::model_select::ModelSelection;
use super::status::{combined_text, overall_status};
use super::types::{
    AttemptFailure, FinderDetails, FinderOutcome, FinderUpdate, RunRecord, RunStatus, SelectionInfo,
};
use crate::backend::{AgentSession, SessionError};

/// Minimum spacing between throttled progress updates.
pub const PROGRESS_THROTTLE: Duration = Duration::from_millis(120);

/// Channel the caller receives progress snapshots on.
pub type UpdateSender = mpsc::UnboundedSender<FinderUpdate>;

#[derive(Debug)]
struct BoardState {
    runs: Vec<RunRecord>,
    workspace: Option<PathBuf>,
    selection: Option<ModelSelection>,
    attempts: Vec<AttemptFailure>,
    last_emit: Option<Instant>,
}

impl BoardState {
    fn details(&self) -> FinderDetails {
        FinderDetails {
            status: overall_status(&self.runs),
            workspace: self.workspace.clone(),
            subagent_provider: self.selection.as_ref().map(|s| s.candidate.provider.clone()),
            subagent_model_id: self.selection.as_ref().map(|s| s.candidate.id.clone()),
            subagent_selection: self.selection.as_ref().map(SelectionInfo::from),
            runs: self.runs.clone(),
            attempts: self.attempts.clone(),
        }
    }
}

/// Run records plus throttled progress emission.
///
/// Mutations and the snapshot they trigger happen under one lock, so updates
/// reach the caller in state order and `turns` never goes backwards.
#[derive(Debug)]
pub struct RunBoard {
    state: Mutex<BoardState>,
    updates: Option<UpdateSender>,
}

impl RunBoard {
    pub fn new(query: &str, workspace: Option<PathBuf>, updates: Option<UpdateSender>) -> Self {
        Self {
            state: Mutex::new(BoardState {
                runs: vec![RunRecord::new(query)],
                workspace,
                selection: None,
                attempts: Vec::new(),
                last_emit: None,
            }),
            updates,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mutate the primary run, then emit. `force` bypasses the throttle.
    pub fn update_run<R>(&self, force: bool, f: impl FnOnce(&mut RunRecord) -> R) -> Option<R> {
        let mut state = self.lock();
        let out = state.runs.first_mut().map(f);
        self.emit_locked(&mut state, force);
        out
    }

    /// Mark every non-terminal run aborted and emit immediately.
    pub fn abort_runs(&self) -> usize {
        let mut state = self.lock();
        let aborted = state.runs.iter_mut().map(RunRecord::abort).filter(|&done| done).count();
        self.emit_locked(&mut state, true);
        aborted
    }

    pub fn set_selection(&self, selection: &ModelSelection) {
        self.lock().selection = Some(selection.clone());
    }

    pub fn push_attempt(&self, failure: AttemptFailure) {
        self.lock().attempts.push(failure);
    }

    pub fn attempts(&self) -> Vec<AttemptFailure> {
        self.lock().attempts.clone()
    }

    pub fn primary_run(&self) -> Option<RunRecord> {
        self.lock().runs.first().cloned()
    }

    /// Push a snapshot unless one went out less than [`PROGRESS_THROTTLE`] ago.
    pub fn emit(&self, force: bool) {
        let mut state = self.lock();
        self.emit_locked(&mut state, force);
    }

    fn emit_locked(&self, state: &mut BoardState, force: bool) {
        let Some(updates) = &self.updates else {
            return;
        };
        let now = Instant::now();
        if !force {
            if let Some(last) = state.last_emit {
                if now.duration_since(last) < PROGRESS_THROTTLE {
                    return;
                }
            }
        }
        state.last_emit = Some(now);

        let update = FinderUpdate {
            text: combined_text(&state.runs),
            details: state.details(),
        };
        // The caller may have stopped listening; progress is best-effort.
        let _ = updates.send(update);
    }

    /// Final result. `text` replaces the run summary when given.
    pub fn outcome(&self, text: Option<String>) -> FinderOutcome {
        let state = self.lock();
        let details = state.details();
        FinderOutcome {
            text: text.unwrap_or_else(|| combined_text(&state.runs)),
            is_error: details.status == RunStatus::Error,
            details,
        }
    }
}

/// Cooperative abort across every live session of an invocation.
pub struct AbortController {
    board: Arc<RunBoard>,
    aborted: AtomicBool,
    sessions: Mutex<HashMap<Uuid, Arc<dyn AgentSession>>>,
    settled: watch::Sender<bool>,
}

impl AbortController {
    pub fn new(board: Arc<RunBoard>) -> Self {
        let (settled, _) = watch::channel(false);
        Self {
            board,
            aborted: AtomicBool::new(false),
            sessions: Mutex::new(HashMap::new()),
            settled,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<dyn AgentSession>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions().len()
    }

    /// Track a live session. Returns `true` if an abort already started; the
    /// session is then not tracked and the caller must cancel it itself.
    pub fn register(&self, id: Uuid, session: Arc<dyn AgentSession>) -> bool {
        let mut sessions = self.sessions();
        if self.is_aborted() {
            return true;
        }
        sessions.insert(id, session);
        false
    }

    pub fn unregister(&self, id: Uuid) {
        self.sessions().remove(&id);
    }

    /// Abort the invocation: mark runs aborted, emit, then cancel every live
    /// session concurrently and wait for all of them to settle.
    ///
    /// Only the first call does anything. Cancellation failures are collected
    /// and returned, never propagated.
    pub async fn abort_all(&self) -> Vec<SessionError> {
        // Flag and snapshot under the session lock so a concurrent `register`
        // lands on exactly one side of the abort.
        let sessions: Vec<_> = {
            let sessions = self.sessions();
            if self.aborted.swap(true, Ordering::SeqCst) {
                return Vec::new();
            }
            sessions.values().cloned().collect()
        };

        let aborted_runs = self.board.abort_runs();
        tracing::info!(
            aborted_runs,
            sessions = sessions.len(),
            "Aborting finder invocation"
        );

        let results = futures::future::join_all(sessions.iter().map(|session| session.cancel())).await;
        let errors: Vec<SessionError> = results.into_iter().filter_map(Result::err).collect();
        for error in &errors {
            tracing::warn!(error = %error, "Session cancellation failed");
        }

        self.settled.send_replace(true);
        errors
    }

    /// Wait for an in-flight abort to finish cancelling sessions.
    /// Returns immediately if no abort was requested.
    pub async fn wait_settled(&self) {
        if !self.is_aborted() {
            return;
        }
        let mut settled = self.settled.subscribe();
        let _ = settled.wait_for(|done| *done).await;
    }
}
