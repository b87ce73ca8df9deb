pub mod anthropic;
pub mod http;
pub mod responses;
pub mod retry;
pub mod traits;
pub mod types;

pub use anthropic::AnthropicAdapter;
pub use http::HttpTransport;
pub use responses::ResponsesAdapter;
pub use retry::{AttemptRecord, RetryOutcome, RetryPolicy, TransportRetrier};
pub use traits::{
    CallLogSink, CallRecord, EncodeRequest, HistoryMode, ProviderAdapter, ProviderError,
    Transport, TransportFailureKind, WireRequest,
};
pub use types::{ContentBlock, ConversationMessage, DecodedResponse, Role, ToolCall, ToolDefinition};
