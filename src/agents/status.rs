//! Status and text projections over run records.
//!
//! Pure functions: nothing here mutates a run.

use serde_json::Value;

use super::types::{RunRecord, RunStatus, ToolCallRecord, NO_OUTPUT_SUMMARY};
use crate::tools::{BASH_TOOL, READ_TOOL};
use crate::util::{collapse_whitespace, shorten};

/// Placeholder shown while a run has no summary yet.
pub const SEARCHING_PLACEHOLDER: &str = "(searching...)";

/// Aggregate status of a set of runs.
///
/// running > error > aborted (only if every run aborted) > done.
pub fn overall_status(runs: &[RunRecord]) -> RunStatus {
    if runs.iter().any(|run| run.status == RunStatus::Running) {
        return RunStatus::Running;
    }
    if runs.iter().any(|run| run.status == RunStatus::Error) {
        return RunStatus::Error;
    }
    if !runs.is_empty() && runs.iter().all(|run| run.status == RunStatus::Aborted) {
        return RunStatus::Aborted;
    }
    RunStatus::Done
}

/// Text shown for a set of runs: the first run's summary or a placeholder.
pub fn combined_text(runs: &[RunRecord]) -> String {
    let Some(run) = runs.first() else {
        return NO_OUTPUT_SUMMARY.to_string();
    };
    match (&run.summary_text, run.status) {
        (Some(summary), _) => summary.trim().to_string(),
        (None, RunStatus::Running) => SEARCHING_PLACEHOLDER.to_string(),
        (None, _) => NO_OUTPUT_SUMMARY.to_string(),
    }
}

/// One-line description of a tool call for progress rendering.
pub fn format_tool_call(call: &ToolCallRecord) -> String {
    let args = call.args.as_object();
    let str_arg = |key: &str| args.and_then(|a| a.get(key)).and_then(Value::as_str);
    let int_arg = |key: &str| {
        args.and_then(|a| a.get(key))
            .and_then(Value::as_i64)
            .filter(|value| *value != 0)
    };

    match call.name.as_str() {
        READ_TOOL => {
            let path = str_arg("path").unwrap_or_default();
            let offset = int_arg("offset");
            let limit = int_arg("limit");
            let range = if offset.is_some() || limit.is_some() {
                let start = offset.unwrap_or(1);
                match limit.and_then(|limit| start.checked_add(limit)?.checked_sub(1)) {
                    Some(end) => format!(":{}-{}", start, end),
                    None => format!(":{}", start),
                }
            } else {
                String::new()
            };
            format!("read {}{}", path, range)
        }
        BASH_TOOL => {
            let command = collapse_whitespace(str_arg("command").unwrap_or_default());
            let suffix = int_arg("timeout")
                .map(|timeout| format!(" (timeout {}s)", timeout))
                .unwrap_or_default();
            format!("bash {}{}", shorten(&command, 120), suffix)
                .trim_end()
                .to_string()
        }
        other => other.to_string(),
    }
}
