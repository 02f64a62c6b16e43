//! Model candidate selection for the finder subagent.
//!
//! # Policy
//! 1. Walk `FINDER_MODELS` overrides in declaration order, skipping entries that
//!    are not in the registry or are currently in cooldown.
//! 2. Otherwise try the ambient fallback model, at most once per plan.
//!
//! The plan is mutable: the override cursor only moves forward and the fallback
//! latch never resets, so one plan drives every attempt of a retry loop.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::ModelRegistry;
use crate::provider_health::UnavailabilityRegistry;

/// Environment key holding the ordered override list.
pub const MODELS_ENV: &str = "FINDER_MODELS";

/// Reasoning effort requested for an override entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    Off,
    Minimal,
    Low,
    Medium,
    High,
    XHigh,
}

impl ThinkingLevel {
    pub const ALL: [ThinkingLevel; 6] = [
        Self::Off,
        Self::Minimal,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::XHigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::XHigh => "xhigh",
        }
    }

    fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(|level| level.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ThinkingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThinkingLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == lowered)
            .ok_or(())
    }
}

/// An executable model backend, identified by `(provider, id)`.
///
/// Equality and hashing ignore ASCII case on both fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCandidate {
    pub provider: String,
    pub id: String,
}

impl ModelCandidate {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
        }
    }

    /// Normalized `provider/id` key used by the cooldown registry.
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.provider.trim().to_lowercase(),
            self.id.trim().to_lowercase()
        )
    }

    pub fn matches(&self, provider: &str, id: &str) -> bool {
        self.provider.eq_ignore_ascii_case(provider) && self.id.eq_ignore_ascii_case(id)
    }
}

impl PartialEq for ModelCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.provider, &other.id)
    }
}

impl Eq for ModelCandidate {}

impl Hash for ModelCandidate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider.to_ascii_lowercase().hash(state);
        self.id.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for ModelCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.id)
    }
}

impl FromStr for ModelCandidate {
    type Err = String;

    /// Parse `provider/model`. The model id may contain further slashes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value.split_once('/') {
            Some((provider, id)) if !provider.trim().is_empty() && !id.trim().is_empty() => {
                Ok(Self::new(provider.trim(), id.trim()))
            }
            _ => Err(format!("expected \"provider/model\", got \"{}\"", s)),
        }
    }
}

/// One parsed `provider/model:thinking` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOverride {
    pub provider: String,
    pub model_id: String,
    pub thinking_level: ThinkingLevel,
    /// 1-based position of the token in the raw list (blank tokens still count).
    pub ordinal: usize,
}

/// Parsed override configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelOverrides {
    pub entries: Vec<ModelOverride>,
    /// Whether the variable was present and non-blank. Only affects messaging.
    pub configured: bool,
}

/// A malformed `FINDER_MODELS` token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OverrideParseError {
    #[error("Invalid FINDER_MODELS token #{ordinal}: empty token. Remove it or provide \"provider/model:thinking\".")]
    EmptyToken { ordinal: usize },

    #[error("Invalid FINDER_MODELS token #{ordinal} \"{token}\". Expected format \"provider/model:thinking\" where thinking is one of: {valid}.")]
    BadFormat {
        ordinal: usize,
        token: String,
        valid: String,
    },

    #[error("Invalid FINDER_MODELS token #{ordinal} \"{token}\": unsupported thinking level \"{level}\". Valid values: {valid}.")]
    UnknownThinking {
        ordinal: usize,
        token: String,
        level: String,
        valid: String,
    },
}

/// Parse a single override token.
pub fn parse_override_token(raw: &str, ordinal: usize) -> Result<ModelOverride, OverrideParseError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(OverrideParseError::EmptyToken { ordinal });
    }

    let bad_format = || OverrideParseError::BadFormat {
        ordinal,
        token: raw.to_string(),
        valid: ThinkingLevel::valid_values(),
    };

    let slash = value.find('/').ok_or_else(bad_format)?;
    if slash == 0 || slash == value.len() - 1 {
        return Err(bad_format());
    }

    let provider = value[..slash].trim();
    let model_with_thinking = value[slash + 1..].trim();
    let colon = model_with_thinking.rfind(':').ok_or_else(bad_format)?;
    if colon == 0 || colon == model_with_thinking.len() - 1 {
        return Err(bad_format());
    }

    let model_id = model_with_thinking[..colon].trim();
    let thinking = model_with_thinking[colon + 1..].trim().to_lowercase();

    if provider.is_empty() || model_id.is_empty() {
        return Err(bad_format());
    }

    let thinking_level =
        thinking
            .parse::<ThinkingLevel>()
            .map_err(|_| OverrideParseError::UnknownThinking {
                ordinal,
                token: raw.to_string(),
                level: thinking.clone(),
                valid: ThinkingLevel::valid_values(),
            })?;

    Ok(ModelOverride {
        provider: provider.to_string(),
        model_id: model_id.to_string(),
        thinking_level,
        ordinal,
    })
}

/// Parse the comma-separated override list. A single bad token fails the whole list.
pub fn parse_model_overrides(raw: Option<&str>) -> Result<ModelOverrides, OverrideParseError> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(ModelOverrides::default());
    };

    let mut entries = Vec::new();
    for (idx, token) in raw.split(',').enumerate() {
        if token.trim().is_empty() {
            continue;
        }
        entries.push(parse_override_token(token, idx + 1)?);
    }

    Ok(ModelOverrides {
        entries,
        configured: true,
    })
}

/// Where a selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SelectionSource {
    Override { ordinal: usize },
    Fallback,
}

/// A candidate handed out by [`SelectionPlan::next_candidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub candidate: ModelCandidate,
    pub thinking_level: Option<ThinkingLevel>,
    pub source: SelectionSource,
    pub reason: String,
}

impl ModelSelection {
    /// `provider/model[:thinking]`.
    pub fn label(&self) -> String {
        match self.thinking_level {
            Some(level) => format!("{}:{}", self.candidate, level),
            None => self.candidate.to_string(),
        }
    }
}

/// Per-invocation selection state.
#[derive(Debug, Clone)]
pub struct SelectionPlan {
    overrides: Vec<ModelOverride>,
    next_override: usize,
    fallback: Option<ModelCandidate>,
    fallback_consumed: bool,
    overrides_configured: bool,
}

impl SelectionPlan {
    pub fn new(overrides: ModelOverrides, fallback: Option<ModelCandidate>) -> Self {
        Self {
            overrides: overrides.entries,
            next_override: 0,
            fallback,
            fallback_consumed: false,
            overrides_configured: overrides.configured,
        }
    }

    /// Return the next usable candidate, advancing the plan.
    ///
    /// # Algorithm
    /// 1. Pop overrides in order; return the first one present in `registry`
    ///    and not in cooldown.
    /// 2. Latch the fallback as consumed, then return it if present and usable.
    pub async fn next_candidate(
        &mut self,
        registry: &dyn ModelRegistry,
        health: &UnavailabilityRegistry,
    ) -> Option<ModelSelection> {
        let available = registry.list_available();

        while let Some(entry) = self.overrides.get(self.next_override).cloned() {
            self.next_override += 1;

            let Some(matched) = find_available(&available, &entry.provider, &entry.model_id) else {
                tracing::debug!(
                    ordinal = entry.ordinal,
                    provider = %entry.provider,
                    model = %entry.model_id,
                    "Override not in registry, skipping"
                );
                continue;
            };
            if health.is_unavailable(&matched).await {
                tracing::debug!(
                    ordinal = entry.ordinal,
                    model = %matched,
                    "Override in cooldown, skipping"
                );
                continue;
            }

            let reason = format!(
                "{} token #{}: {}:{}",
                MODELS_ENV, entry.ordinal, matched, entry.thinking_level
            );
            return Some(ModelSelection {
                candidate: matched,
                thinking_level: Some(entry.thinking_level),
                source: SelectionSource::Override {
                    ordinal: entry.ordinal,
                },
                reason,
            });
        }

        if self.fallback_consumed {
            return None;
        }
        self.fallback_consumed = true;

        let fallback = self.fallback.as_ref()?;
        let matched = find_available(&available, &fallback.provider, &fallback.id)?;
        if health.is_unavailable(&matched).await {
            tracing::debug!(model = %matched, "Fallback model in cooldown");
            return None;
        }

        let source = if self.overrides_configured {
            format!("fallback model after {} filtering", MODELS_ENV)
        } else {
            format!("fallback model ({} unset/blank)", MODELS_ENV)
        };
        Some(ModelSelection {
            reason: format!("{}: {}", source, matched),
            candidate: matched,
            thinking_level: None,
            source: SelectionSource::Fallback,
        })
    }

    /// Message explaining why no candidate could be selected.
    pub fn no_candidate_message(&self) -> String {
        match (self.overrides_configured, self.fallback.is_some()) {
            (true, false) => format!(
                "No model candidates available after {} filtering, and no fallback model is set. \
                 Configure at least one available model or provide a fallback model.",
                MODELS_ENV
            ),
            (false, _) => format!(
                "No models available: {} is unset/blank and the fallback model is missing or unavailable.",
                MODELS_ENV
            ),
            (true, true) => format!(
                "No model candidates available after {} filtering. \
                 The fallback model was unavailable or temporarily unavailable.",
                MODELS_ENV
            ),
        }
    }
}

fn find_available(available: &[ModelCandidate], provider: &str, id: &str) -> Option<ModelCandidate> {
    available
        .iter()
        .find(|candidate| candidate.matches(provider, id))
        .cloned()
}
