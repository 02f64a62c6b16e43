//! Configuration management for the finder.
//!
//! Configuration can be set via environment variables:
//! - `FINDER_MODELS` - Optional. Ordered override list of `provider/model:thinking`
//!   tokens, comma separated. Thinking is one of off, minimal, low, medium, high, xhigh.
//! - `FINDER_MAX_TURNS` - Optional. Turn cap per session. Defaults to `6`.
//! - `FINDER_EVENT_BUFFER` - Optional. Capacity of the session event channel.
//!   `FINDER_MAX_LISTENERS` is accepted as an alias. Defaults to `100`.
//! - `FINDER_WORKSPACE` - Optional. Workspace directory. Defaults to current directory.

use std::path::PathBuf;
use thiserror::Error;

use crate::agents::model_select::{parse_model_overrides, ModelOverrides, OverrideParseError, MODELS_ENV};
use crate::budget::DEFAULT_MAX_TURNS;
use crate::util::non_blank;

/// Default capacity of the session event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 100;

const MAX_TURNS_ENV: &str = "FINDER_MAX_TURNS";
const EVENT_BUFFER_ENV: &str = "FINDER_EVENT_BUFFER";
const EVENT_BUFFER_ALIAS_ENV: &str = "FINDER_MAX_LISTENERS";
const WORKSPACE_ENV: &str = "FINDER_WORKSPACE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error(transparent)]
    ModelOverrides(#[from] OverrideParseError),
}

/// Finder configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ordered model overrides
    pub model_overrides: ModelOverrides,

    /// Turn cap for each session (>= 1)
    pub max_turns: u32,

    /// Session event channel capacity
    pub event_buffer: usize,

    /// Workspace directory handed to the session engine
    pub workspace: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_overrides: ModelOverrides::default(),
            max_turns: DEFAULT_MAX_TURNS,
            event_buffer: DEFAULT_EVENT_BUFFER,
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ModelOverrides` if any `FINDER_MODELS` token is malformed,
    /// and `ConfigError::InvalidValue` for a bad `FINDER_MAX_TURNS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_overrides = parse_model_overrides(lookup(MODELS_ENV).as_deref())?;

        let max_turns = match non_blank(&lookup, MAX_TURNS_ENV) {
            Some(raw) => {
                let value: u32 = raw.trim().parse().map_err(|e| {
                    ConfigError::InvalidValue(MAX_TURNS_ENV.to_string(), format!("{}", e))
                })?;
                if value == 0 {
                    return Err(ConfigError::InvalidValue(
                        MAX_TURNS_ENV.to_string(),
                        "must be at least 1".to_string(),
                    ));
                }
                value
            }
            None => DEFAULT_MAX_TURNS,
        };

        let event_buffer = non_blank(&lookup, EVENT_BUFFER_ENV)
            .map(|raw| (EVENT_BUFFER_ENV, raw))
            .or_else(|| non_blank(&lookup, EVENT_BUFFER_ALIAS_ENV).map(|raw| (EVENT_BUFFER_ALIAS_ENV, raw)))
            .and_then(|(key, raw)| match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => Some(value),
                _ => {
                    tracing::warn!(key, value = %raw, "Ignoring invalid event buffer size");
                    None
                }
            })
            .unwrap_or(DEFAULT_EVENT_BUFFER);

        let workspace = non_blank(&lookup, WORKSPACE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        Ok(Self {
            model_overrides,
            max_turns,
            event_buffer,
            workspace,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(model_overrides: ModelOverrides, workspace: PathBuf) -> Self {
        Self {
            model_overrides,
            workspace,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = assert_ok!(Config::from_lookup(lookup(&[])));
        assert!(!config.model_overrides.configured);
        assert_eq!(config.max_turns, 6);
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
    }

    #[test]
    fn parses_all_keys() {
        let config = assert_ok!(Config::from_lookup(lookup(&[
            ("FINDER_MODELS", "acme/x:low,acme/y:xhigh"),
            ("FINDER_MAX_TURNS", "4"),
            ("FINDER_EVENT_BUFFER", "256"),
            ("FINDER_WORKSPACE", "/srv/repo"),
        ])));
        assert_eq!(config.model_overrides.entries.len(), 2);
        assert_eq!(config.max_turns, 4);
        assert_eq!(config.event_buffer, 256);
        assert_eq!(config.workspace, PathBuf::from("/srv/repo"));
    }

    #[test]
    fn malformed_override_fails_whole_config() {
        let err = assert_err!(Config::from_lookup(lookup(&[(
            "FINDER_MODELS",
            "acme/x:low,broken"
        )])));
        let message = err.to_string();
        assert!(message.contains("token #2"), "{}", message);
        assert!(message.contains("\"provider/model:thinking\""), "{}", message);
    }

    #[test]
    fn zero_or_garbage_turn_cap_is_rejected() {
        assert_err!(Config::from_lookup(lookup(&[("FINDER_MAX_TURNS", "0")])));
        assert_err!(Config::from_lookup(lookup(&[("FINDER_MAX_TURNS", "six")])));
    }

    #[test]
    fn invalid_event_buffer_keeps_default() {
        let config = assert_ok!(Config::from_lookup(lookup(&[("FINDER_EVENT_BUFFER", "-5")])));
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);

        let config = assert_ok!(Config::from_lookup(lookup(&[("FINDER_MAX_LISTENERS", "32")])));
        assert_eq!(config.event_buffer, 32);
    }
}
