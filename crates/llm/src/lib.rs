//! Escalation to a hosted language model.
//!
//! The assistant only branches on whether a usable credential exists; any
//! failure here is reported to the caller, which answers from the rule tables
//! instead.

mod credential;
mod error;
mod openai;

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{info, warn};

pub use credential::{ApiKey, OpenAiSettings};
pub use error::EscalationError;
pub use openai::{
    build_payload, extract_output_text, CompletionRequest, HistoryMessage, OpenAiClient, Role,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    DisabledMissingKey,
    DisabledInvalidKey,
    Enabled,
    Rejected,
}

pub struct Escalator {
    client: Option<OpenAiClient>,
    startup_status: EscalationStatus,
    rejected: AtomicBool,
}

impl Escalator {
    pub fn disabled() -> Self {
        Self {
            client: None,
            startup_status: EscalationStatus::DisabledMissingKey,
            rejected: AtomicBool::new(false),
        }
    }

    /// Validates the configured credential and builds the client. Never
    /// fails: a missing or malformed key yields a disabled escalator.
    pub fn from_settings(settings: &OpenAiSettings) -> Self {
        let key = match settings.validated_key() {
            Ok(key) => key,
            Err(EscalationError::MissingCredential) => {
                warn!("OpenAI API key not found. Using fallback responses.");
                return Self::disabled();
            }
            Err(error) => {
                warn!(error = %error, "OpenAI API key unusable. Using fallback responses.");
                return Self {
                    client: None,
                    startup_status: EscalationStatus::DisabledInvalidKey,
                    rejected: AtomicBool::new(false),
                };
            }
        };

        match OpenAiClient::new(settings, key) {
            Ok(client) => {
                info!(model = %client.model(), "OpenAI escalation enabled");
                Self {
                    client: Some(client),
                    startup_status: EscalationStatus::Enabled,
                    rejected: AtomicBool::new(false),
                }
            }
            Err(error) => {
                warn!(error = %error, "failed to build OpenAI client. Using fallback responses.");
                Self {
                    client: None,
                    startup_status: EscalationStatus::DisabledInvalidKey,
                    rejected: AtomicBool::new(false),
                }
            }
        }
    }

    pub fn status(&self) -> EscalationStatus {
        if self.rejected.load(Ordering::Relaxed) {
            EscalationStatus::Rejected
        } else {
            self.startup_status
        }
    }

    pub fn is_available(&self) -> bool {
        self.status() == EscalationStatus::Enabled
    }

    pub fn model(&self) -> Option<&str> {
        self.client.as_ref().map(OpenAiClient::model)
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, EscalationError> {
        let client = match (&self.client, self.status()) {
            (Some(client), EscalationStatus::Enabled) => client,
            (_, EscalationStatus::Rejected) => return Err(EscalationError::Rejected(401)),
            (_, EscalationStatus::DisabledInvalidKey) => {
                return Err(EscalationError::InvalidCredential("disabled at startup"))
            }
            _ => return Err(EscalationError::MissingCredential),
        };

        let result = client.complete(request).await;
        if let Err(error) = &result {
            if error.disables_credential() && !self.rejected.swap(true, Ordering::Relaxed) {
                warn!(error = %error, "OpenAI credential rejected; escalation disabled until restart");
            }
        }
        result
    }
}
