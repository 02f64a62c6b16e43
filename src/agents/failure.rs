//! Failure classification for model attempts.
//!
//! Distinguishes quota/rate-limit failures (long cooldown) from generic ones
//! (short cooldown), and recognizes cancellation-shaped errors, which are
//! never reported as errors.

use super::types::{AttemptFailure, RunRecord, RunStatus, NO_OUTPUT_SUMMARY};
use crate::backend::SessionError;
use crate::provider_health::CooldownReason;
use crate::util::shorten;

/// Substrings (lowercase) that mark a quota or rate-limit failure.
const QUOTA_PHRASES: &[&str] = &[
    "rate limit",
    "rate_limit",
    "quota",
    "429",
    "insufficient_quota",
    "exceeded your current quota",
    "out of credits",
    "billing",
];

/// Substrings (lowercase) that mark a cancellation.
const ABORT_PHRASES: &[&str] = &["aborted", "cancelled", "canceled"];

/// Whether `message` looks like a quota or rate-limit failure.
///
/// Heuristic substring match; a message mentioning e.g. "billing" for another
/// reason is still classified as quota.
pub fn is_quota_error(message: &str) -> bool {
    let lowered = message.to_lowercase();
    QUOTA_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// Whether `error` represents a cancellation rather than a failure.
pub fn is_abort_like(error: &SessionError) -> bool {
    match error {
        SessionError::Cancelled => true,
        other => {
            let lowered = other.to_string().to_lowercase();
            ABORT_PHRASES.iter().any(|phrase| lowered.contains(phrase))
        }
    }
}

/// Cooldown reason for a failure message.
pub fn classify_failure(message: &str) -> CooldownReason {
    if is_quota_error(message) {
        CooldownReason::Quota
    } else {
        CooldownReason::Error
    }
}

/// A run that completed without calling tools or producing text.
pub fn looks_like_silent_failure(run: &RunRecord) -> bool {
    run.status == RunStatus::Done
        && run.tool_calls.is_empty()
        && run
            .summary_text
            .as_deref()
            .map_or(true, |summary| summary.is_empty() || summary == NO_OUTPUT_SUMMARY)
}

/// Message listing every failed attempt.
pub fn final_failure_message(failures: &[AttemptFailure]) -> String {
    if failures.is_empty() {
        return "Finder failed: no model attempts were executed.".to_string();
    }

    let summary = failures
        .iter()
        .enumerate()
        .map(|(idx, failure)| {
            format!(
                "{}) {} [{}] {}",
                idx + 1,
                failure.model_label,
                failure.reason,
                shorten(&failure.message, 120)
            )
        })
        .collect::<Vec<_>>()
        .join("; ");

    format!(
        "Finder failed after {} model attempt{}: {}",
        failures.len(),
        if failures.len() == 1 { "" } else { "s" },
        summary
    )
}
