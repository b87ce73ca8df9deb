use crate::types::{ConversationMessage, DecodedResponse, ToolDefinition};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Network-level failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailureKind {
    SecureConnectionFailed,
    ConnectionLost,
    TimedOut,
    CannotFindHost,
    DnsLookupFailed,
    NotConnectedToInternet,
    Other,
}

impl TransportFailureKind {
    /// Transient failures the retrier is allowed to repeat.
    pub fn is_transient(self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl fmt::Display for TransportFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SecureConnectionFailed => "secure connection failed",
            Self::ConnectionLost => "network connection lost",
            Self::TimedOut => "request timed out",
            Self::CannotFindHost => "cannot find host",
            Self::DnsLookupFailed => "DNS lookup failed",
            Self::NotConnectedToInternet => "not connected to the internet",
            Self::Other => "transport failure",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No API key stored for provider '{0}'")]
    MissingCredential(String),

    #[error("Invalid response shape: {0}")]
    InvalidResponseShape(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport failure ({kind}): {description}")]
    Transport {
        kind: TransportFailureKind,
        description: String,
    },

    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn transport(kind: TransportFailureKind, description: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            description: description.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { kind, .. } if kind.is_transient())
    }
}

/// How an adapter expects conversation history to be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// Resend the whole (compacted) message list every turn.
    FullHistory,
    /// Send only the new turn and carry an opaque continuation token.
    Incremental,
}

/// Input to one encode call.
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub tools: &'a [ToolDefinition],
    pub conversation: &'a [ConversationMessage],
    pub model: &'a str,
    pub continuation_token: Option<&'a str>,
}

/// A fully built HTTP request, ready for a transport.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

/// Encodes and decodes one vendor's wire protocol.
pub trait ProviderAdapter: Send + Sync {
    /// Key used to look the credential up.
    fn provider_id(&self) -> &str;

    fn history_mode(&self) -> HistoryMode;

    fn endpoint(&self) -> &str;

    fn auth_headers(&self, api_key: &str) -> Vec<(String, String)>;

    fn encode(&self, request: EncodeRequest<'_>) -> Result<serde_json::Value, ProviderError>;

    fn decode(&self, response: &serde_json::Value) -> Result<DecodedResponse, ProviderError>;

    fn build_request(
        &self,
        request: EncodeRequest<'_>,
        api_key: &str,
    ) -> Result<WireRequest, ProviderError> {
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        headers.extend(self.auth_headers(api_key));
        Ok(WireRequest {
            url: self.endpoint().to_string(),
            headers,
            body: self.encode(request)?,
        })
    }
}

/// Sends one request and returns the parsed JSON body of a 2xx response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &WireRequest, attempt: u32)
        -> Result<serde_json::Value, ProviderError>;
}

/// Timing, status and byte counts of one HTTP attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub url: String,
    pub attempt: u32,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub http_status: Option<u16>,
    pub request_bytes: usize,
    pub response_bytes: usize,
    pub error: Option<String>,
}

/// Fire-and-forget receiver of per-attempt call records.
pub trait CallLogSink: Send + Sync {
    fn record(&self, record: &CallRecord);
}
