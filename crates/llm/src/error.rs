use thiserror::Error;

#[derive(Debug, Error)]
pub enum EscalationError {
    #[error("OpenAI API key not found")]
    MissingCredential,
    #[error("OpenAI API key is malformed: {0}")]
    InvalidCredential(&'static str),
    #[error("OpenAI rejected the configured API key (status {0})")]
    Rejected(u16),
    #[error("OpenAI non-success status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("OpenAI request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("OpenAI response could not be decoded: {0}")]
    Decode(String),
    #[error("OpenAI output text missing")]
    EmptyOutput,
}

impl EscalationError {
    /// Errors after which retrying with the same credential is pointless.
    pub fn disables_credential(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential | Self::InvalidCredential(_) | Self::Rejected(_)
        )
    }
}
