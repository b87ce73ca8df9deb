use deskpilot_providers::ProviderError;
use deskpilot_tools::ScreenshotError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("No API key stored for provider '{0}'")]
    Missing(String),

    #[error("Credential store unreadable: {0}")]
    Unreadable(String),

    #[error("Credential store write failed: {0}")]
    WriteFailed(String),
}

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Prompt '{0}' not found")]
    NotFound(String),

    #[error("Prompt '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end a run with outcome `failed`.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Screenshot error: {0}")]
    Screenshot(#[from] ScreenshotError),
}

impl From<ProviderError> for RunError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MissingCredential(provider) => {
                Self::Credential(CredentialError::Missing(provider))
            }
            ProviderError::InvalidResponseShape(_) => Self::Protocol(err.to_string()),
            ProviderError::Http { .. } | ProviderError::Transport { .. } => {
                Self::Transport(err.to_string())
            }
            ProviderError::Cancelled => Self::Transport(err.to_string()),
        }
    }
}
