pub mod compactor;
pub mod completion;
pub mod credentials;
pub mod error;
pub mod interfaces;
pub mod metrics;
pub mod orchestrator;
pub mod prompt;
pub mod result;

pub use compactor::ConversationCompactor;
pub use completion::{Completion, CompletionParser};
pub use credentials::CredentialCache;
pub use error::{CredentialError, PromptError, RunError};
pub use interfaces::{CredentialStore, PromptCatalog, TraceKind, TraceSink};
pub use orchestrator::{RunConfig, ToolLoopOrchestrator, MAX_TURNS};
pub use prompt::{PromptConfig, PromptTemplate, PromptVariables};
pub use result::{dedupe_questions, AutomationRunResult, RunOutcome};
