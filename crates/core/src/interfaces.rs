//! Collaborators the orchestrator consumes but does not implement.

use crate::error::{CredentialError, PromptError};
use crate::prompt::PromptTemplate;
use async_trait::async_trait;
use serde::Serialize;

/// Source of task prompt templates.
#[async_trait]
pub trait PromptCatalog: Send + Sync {
    async fn load_prompt(&self, name: &str) -> Result<PromptTemplate, PromptError>;
}

/// Secret storage keyed by provider id.
pub trait CredentialStore: Send + Sync {
    fn read_key(&self, provider_id: &str) -> Result<Option<String>, CredentialError>;

    fn write_key(&self, provider_id: &str, secret: &str) -> Result<(), CredentialError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    RunStarted,
    Request,
    Response,
    Retry,
    Compaction,
    ToolCall,
    ToolResult,
    Completion,
    Error,
    Cancelled,
}

/// Fire-and-forget lifecycle trace receiver.
pub trait TraceSink: Send + Sync {
    fn trace(&self, kind: TraceKind, message: &str);
}
