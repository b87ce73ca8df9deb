use thiserror::Error;

/// Failure of a single tool call. Never fatal to the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Input injection failed: {0}")]
    Injection(String),
}

impl ActionError {
    /// Clarifying question for errors the model should resolve by asking.
    pub fn clarifying_question(&self) -> Option<String> {
        match self {
            Self::Malformed(reason) => Some(format!(
                "A requested action could not be understood ({}). What exactly should be done?",
                reason
            )),
            Self::UnknownAction(action) => Some(format!(
                "The action '{}' is not supported. Which supported action should be used instead?",
                action
            )),
            Self::UnknownTool(tool) => Some(format!(
                "The tool '{}' does not exist. Which available tool should be used instead?",
                tool
            )),
            Self::Injection(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ScreenshotError {
    #[error("Screen capture failed: {0}")]
    Capture(String),

    #[error("Image processing failed: {0}")]
    Image(String),

    #[error("Screenshot exceeds size budget: smallest candidate {smallest} base64 bytes, limit {limit}")]
    SizeExceeded { smallest: usize, limit: usize },
}

/// Errors that end the run from inside a dispatch.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Run cancelled")]
    Cancelled,

    #[error(transparent)]
    Screenshot(#[from] ScreenshotError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_questions_only_for_model_errors() {
        assert!(ActionError::UnknownAction("fly".into())
            .clarifying_question()
            .unwrap()
            .contains("'fly'"));
        assert!(ActionError::Malformed("x missing".into())
            .clarifying_question()
            .is_some());
        assert!(ActionError::Injection("no backend".into())
            .clarifying_question()
            .is_none());
    }

    #[test]
    fn test_size_exceeded_display() {
        let err = ScreenshotError::SizeExceeded {
            smallest: 900,
            limit: 100,
        };
        assert!(err.to_string().contains("900"));
    }
}
