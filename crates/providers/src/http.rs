//! reqwest-backed transport with failure classification and call logging.

use crate::traits::*;
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct HttpTransport {
    client: Client,
    call_log: Option<Arc<dyn CallLogSink>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            call_log: None,
        }
    }

    pub fn with_call_log(mut self, sink: Arc<dyn CallLogSink>) -> Self {
        self.call_log = Some(sink);
        self
    }

    fn log_call(&self, record: CallRecord) {
        if let Some(sink) = &self.call_log {
            sink.record(&record);
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Full error chain, lowercased, for keyword classification.
fn error_chain(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

/// Map a reqwest failure onto a transport failure kind.
pub fn classify_message(message: &str, is_timeout: bool, is_connect: bool) -> TransportFailureKind {
    let lower = message.to_lowercase();
    if is_timeout || lower.contains("timed out") {
        return TransportFailureKind::TimedOut;
    }
    if lower.contains("dns") || lower.contains("failed to lookup") || lower.contains("resolve") {
        return TransportFailureKind::DnsLookupFailed;
    }
    if lower.contains("tls") || lower.contains("certificate") || lower.contains("handshake") {
        return TransportFailureKind::SecureConnectionFailed;
    }
    if lower.contains("network is unreachable") || lower.contains("no route to host") {
        return TransportFailureKind::NotConnectedToInternet;
    }
    if lower.contains("connection reset")
        || lower.contains("connection closed")
        || lower.contains("broken pipe")
        || lower.contains("incomplete message")
    {
        return TransportFailureKind::ConnectionLost;
    }
    if is_connect && lower.contains("host") {
        return TransportFailureKind::CannotFindHost;
    }
    TransportFailureKind::Other
}

fn classify(err: &reqwest::Error) -> ProviderError {
    let chain = error_chain(err);
    let kind = classify_message(&chain, err.is_timeout(), err.is_connect());
    ProviderError::transport(kind, chain)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &WireRequest,
        attempt: u32,
    ) -> Result<serde_json::Value, ProviderError> {
        let body = serde_json::to_vec(&request.body)
            .map_err(|e| ProviderError::InvalidResponseShape(format!("encode failed: {}", e)))?;
        let request_bytes = body.len();

        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let started_at = chrono::Utc::now();
        let start = Instant::now();
        debug!("POST {} ({} bytes, attempt {})", request.url, request_bytes, attempt);

        let mut record = CallRecord {
            url: request.url.clone(),
            attempt,
            started_at,
            duration_ms: 0,
            http_status: None,
            request_bytes,
            response_bytes: 0,
            error: None,
        };

        let response = match builder.body(body).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = classify(&e);
                warn!("Transport failure: {}", err);
                record.duration_ms = start.elapsed().as_millis() as u64;
                record.error = Some(err.to_string());
                self.log_call(record);
                return Err(err);
            }
        };

        let status = response.status();
        record.http_status = Some(status.as_u16());
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = classify(&e);
                record.duration_ms = start.elapsed().as_millis() as u64;
                record.error = Some(err.to_string());
                self.log_call(record);
                return Err(err);
            }
        };
        record.response_bytes = bytes.len();
        record.duration_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            let message = String::from_utf8_lossy(&bytes).to_string();
            let err = ProviderError::Http {
                status: status.as_u16(),
                message,
            };
            record.error = Some(err.to_string());
            self.log_call(record);
            return Err(err);
        }

        self.log_call(record);
        serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::InvalidResponseShape(format!("body is not JSON: {}", e)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tls() {
        assert_eq!(
            classify_message("error trying to connect: tls handshake eof", false, true),
            TransportFailureKind::SecureConnectionFailed
        );
    }

    #[test]
    fn test_classify_dns() {
        assert_eq!(
            classify_message("dns error: failed to lookup address information", false, true),
            TransportFailureKind::DnsLookupFailed
        );
    }

    #[test]
    fn test_classify_timeout_flag_wins() {
        assert_eq!(
            classify_message("operation aborted", true, false),
            TransportFailureKind::TimedOut
        );
    }

    #[test]
    fn test_classify_connection_lost() {
        assert_eq!(
            classify_message("connection reset by peer", false, false),
            TransportFailureKind::ConnectionLost
        );
    }

    #[test]
    fn test_classify_refused_is_not_transient() {
        let kind = classify_message("tcp connect error: Connection refused", false, true);
        assert_eq!(kind, TransportFailureKind::Other);
        assert!(!kind.is_transient());
    }

    #[test]
    fn test_classify_unreachable() {
        assert_eq!(
            classify_message("Network is unreachable (os error 101)", false, true),
            TransportFailureKind::NotConnectedToInternet
        );
    }
}
