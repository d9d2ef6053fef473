use std::env;
use std::fmt;

use crate::error::EscalationError;

const KEY_PREFIX: &str = "sk-";
const MIN_KEY_LEN: usize = 20;

/// A key that passed the local format checks. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn parse(raw: &str) -> Result<Self, EscalationError> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(EscalationError::MissingCredential);
        }
        if key.chars().any(char::is_whitespace) {
            return Err(EscalationError::InvalidCredential("contains whitespace"));
        }
        if !key.starts_with(KEY_PREFIX) {
            return Err(EscalationError::InvalidCredential("expected an `sk-` prefix"));
        }
        if key.len() < MIN_KEY_LEN {
            return Err(EscalationError::InvalidCredential("too short"));
        }
        Ok(Self(key.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = self.0.chars().rev().take(4).collect::<Vec<_>>();
        let tail = tail.into_iter().rev().collect::<String>();
        write!(f, "ApiKey(sk-...{tail})")
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com".to_string(),
            temperature: 0.7,
            connect_timeout_secs: 6,
            timeout_secs: 20,
        }
    }
}

impl OpenAiSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = first_configured([
            env::var("BALLOT_OPENAI_API_KEY").ok(),
            env::var("OPENAI_API_KEY").ok(),
        ]);

        Self {
            api_key,
            model: env::var("BALLOT_OPENAI_MODEL")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(defaults.model),
            base_url: env::var("BALLOT_OPENAI_BASE_URL")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(defaults.base_url),
            temperature: env::var("BALLOT_OPENAI_TEMPERATURE")
                .ok()
                .and_then(|value| value.parse::<f32>().ok())
                .filter(|value| (0.0..=2.0).contains(value))
                .unwrap_or(defaults.temperature),
            connect_timeout_secs: defaults.connect_timeout_secs,
            timeout_secs: env::var("BALLOT_OPENAI_TIMEOUT_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(defaults.timeout_secs),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn validated_key(&self) -> Result<ApiKey, EscalationError> {
        match self.api_key.as_deref() {
            Some(raw) => ApiKey::parse(raw),
            None => Err(EscalationError::MissingCredential),
        }
    }
}

/// First value that is set and not blank; an empty variable does not shadow
/// the ones after it.
fn first_configured<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}
