use std::env;

use serde::Serialize;
use thiserror::Error;

use crate::selector::SelectionPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown response selection policy `{0}` (expected random, round_robin or first)")]
    UnknownSelectionPolicy(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantConfig {
    pub selection: SelectionPolicy,
    pub session_ttl_hours: i64,
    pub max_turns: usize,
    pub history_turns: usize,
    pub knowledge_hits: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            selection: SelectionPolicy::Random,
            session_ttl_hours: 24,
            max_turns: 40,
            history_turns: 6,
            knowledge_hits: 3,
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_selection(None)
    }

    /// Like [`AssistantConfig::from_env`], but an explicit `selection` wins
    /// and `BALLOT_SELECTION` is then not parsed at all.
    pub fn from_env_with_selection(selection: Option<SelectionPolicy>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let selection = resolve_selection(
            selection,
            env::var("BALLOT_SELECTION").ok(),
            defaults.selection,
        )?;

        Ok(Self {
            selection,
            session_ttl_hours: env_parse("BALLOT_SESSION_TTL_HOURS")
                .filter(|hours: &i64| *hours > 0)
                .unwrap_or(defaults.session_ttl_hours),
            max_turns: env_parse("BALLOT_SESSION_MAX_TURNS")
                .filter(|turns: &usize| *turns > 0)
                .unwrap_or(defaults.max_turns),
            history_turns: env_parse("BALLOT_HISTORY_TURNS").unwrap_or(defaults.history_turns),
            knowledge_hits: env_parse("BALLOT_KNOWLEDGE_HITS").unwrap_or(defaults.knowledge_hits),
        })
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }
}

fn resolve_selection(
    explicit: Option<SelectionPolicy>,
    raw: Option<String>,
    default: SelectionPolicy,
) -> Result<SelectionPolicy, ConfigError> {
    if let Some(selection) = explicit {
        return Ok(selection);
    }

    match raw {
        Some(value) if !value.trim().is_empty() => value.parse(),
        _ => Ok(default),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
}
