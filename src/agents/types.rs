//! Core types for finder runs.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::model_select::{ModelSelection, SelectionSource, ThinkingLevel};
use crate::provider_health::CooldownReason;

/// Most recent tool calls kept per run.
pub const MAX_TOOL_CALLS_TO_KEEP: usize = 80;

/// Summary used when a run is aborted.
pub const ABORTED_SUMMARY: &str = "Aborted";
/// Summary used when a run finished without assistant text.
pub const NO_OUTPUT_SUMMARY: &str = "(no output)";

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Done,
    Error,
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// One tool invocation inside a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub args: Value,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// One execution attempt of the search task.
///
/// # Invariants
/// - Once `status` is terminal, the record is never mutated again
/// - `tool_calls.len() <= MAX_TOOL_CALLS_TO_KEEP`, oldest evicted first
/// - `ended_at` is set exactly when the status becomes terminal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub status: RunStatus,
    pub query: String,
    pub turns: u32,
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Running,
            query: query.into(),
            turns: 0,
            tool_calls: Vec::new(),
            summary_text: None,
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Start a fresh attempt, discarding the previous attempt's state.
    pub fn reset(&mut self) {
        self.status = RunStatus::Running;
        self.turns = 0;
        self.tool_calls.clear();
        self.summary_text = None;
        self.error = None;
        self.started_at = Utc::now();
        self.ended_at = None;
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Count a completed turn. Ignored once terminal.
    pub fn record_turn(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.turns += 1;
        true
    }

    /// Append a tool call, evicting the oldest entries past the cap.
    pub fn record_tool_start(&mut self, id: String, name: String, args: Value) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.tool_calls.push(ToolCallRecord {
            id,
            name,
            args,
            started_at: Utc::now(),
            ended_at: None,
            is_error: None,
        });
        if self.tool_calls.len() > MAX_TOOL_CALLS_TO_KEEP {
            let excess = self.tool_calls.len() - MAX_TOOL_CALLS_TO_KEEP;
            self.tool_calls.drain(..excess);
        }
        true
    }

    /// Close the tool call with `id`. Unknown ids are ignored.
    pub fn record_tool_end(&mut self, id: &str, is_error: bool) -> bool {
        if self.is_terminal() {
            return false;
        }
        match self.tool_calls.iter_mut().find(|call| call.id == id) {
            Some(call) => {
                call.ended_at = Some(Utc::now());
                call.is_error = Some(is_error);
                true
            }
            None => false,
        }
    }

    /// Move to a terminal status. Returns `false` if already terminal.
    pub fn finish(&mut self, status: RunStatus, summary: String, error: Option<String>) -> bool {
        debug_assert!(status.is_terminal());
        if self.is_terminal() {
            return false;
        }
        self.status = status;
        self.summary_text = Some(summary);
        self.error = error;
        self.ended_at = Some(Utc::now());
        true
    }

    /// Mark aborted, keeping any summary already present.
    pub fn abort(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        let summary = self
            .summary_text
            .take()
            .unwrap_or_else(|| ABORTED_SUMMARY.to_string());
        self.finish(RunStatus::Aborted, summary, None)
    }
}

/// How the subagent model was chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionInfo {
    pub source: SelectionSource,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<ThinkingLevel>,
}

impl From<&ModelSelection> for SelectionInfo {
    fn from(selection: &ModelSelection) -> Self {
        Self {
            source: selection.source,
            reason: selection.reason.clone(),
            thinking_level: selection.thinking_level,
        }
    }
}

/// A model attempt that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptFailure {
    pub model_label: String,
    pub reason: CooldownReason,
    pub message: String,
}

/// Structured state for progress rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinderDetails {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subagent_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subagent_model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subagent_selection: Option<SelectionInfo>,
    pub runs: Vec<RunRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptFailure>,
}

/// A partial or final snapshot pushed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinderUpdate {
    pub text: String,
    pub details: FinderDetails,
}

/// Terminal result of one finder invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinderOutcome {
    pub text: String,
    pub details: FinderDetails,
    pub is_error: bool,
}
