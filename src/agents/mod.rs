//! Agents module - the finder subagent.
//!
//! # Components
//! - **Finder**: orchestrates one invocation, retrying across model candidates
//! - **SelectionPlan**: ordered override list plus a once-only fallback
//! - **RunBoard / AbortController**: run state, throttled progress, cooperative abort
//!
//! # Design Principles
//! - One live session per invocation at a time
//! - Terminal run states are never overwritten
//! - The public operation never fails; failures are data in the outcome

mod failure;
mod finder;
pub mod model_select;
mod run;
mod status;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use failure::{
    classify_failure, final_failure_message, is_abort_like, is_quota_error,
    looks_like_silent_failure,
};
pub use finder::{Finder, FinderRequest, INVALID_QUERY_MESSAGE};
pub use model_select::{
    parse_model_overrides, ModelCandidate, ModelOverride, ModelOverrides, ModelSelection,
    OverrideParseError, SelectionPlan, SelectionSource, ThinkingLevel,
};
pub use run::{AbortController, RunBoard, UpdateSender, PROGRESS_THROTTLE};
pub use status::{combined_text, format_tool_call, overall_status, SEARCHING_PLACEHOLDER};
pub use types::{
    AttemptFailure, FinderDetails, FinderOutcome, FinderUpdate, RunRecord, RunStatus,
    SelectionInfo, ToolCallRecord, ABORTED_SUMMARY, MAX_TOOL_CALLS_TO_KEEP, NO_OUTPUT_SUMMARY,
};
