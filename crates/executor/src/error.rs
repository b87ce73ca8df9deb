use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),
}

impl SandboxError {
    /// Stable status code reported back to the model.
    pub fn status(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::PolicyViolation(_) => "policy_violation",
            Self::ExecutableNotFound(_) => "executable_not_found",
            Self::SpawnFailed(_) => "spawn_failed",
        }
    }
}
