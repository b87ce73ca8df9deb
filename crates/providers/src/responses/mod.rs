//! Responses-API adapter: sends only the incremental turn and chains
//! server-side history through `previous_response_id`.

mod transform;
pub mod types;

use crate::traits::*;
use crate::types::DecodedResponse;
use serde_json::Value;
use transform::*;
use types::*;

pub const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

pub struct ResponsesAdapter {
    endpoint: String,
}

impl ResponsesAdapter {
    pub fn new() -> Self {
        Self::with_endpoint(OPENAI_RESPONSES_URL.to_string())
    }

    pub fn with_endpoint(endpoint: String) -> Self {
        Self { endpoint }
    }
}

impl Default for ResponsesAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderAdapter for ResponsesAdapter {
    fn provider_id(&self) -> &str {
        "openai"
    }

    fn history_mode(&self) -> HistoryMode {
        HistoryMode::Incremental
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn auth_headers(&self, api_key: &str) -> Vec<(String, String)> {
        vec![("authorization".to_string(), format!("Bearer {}", api_key))]
    }

    fn encode(&self, request: EncodeRequest<'_>) -> Result<Value, ProviderError> {
        let body = ResponsesRequest {
            model: request.model.to_string(),
            store: true,
            input: build_input(request.conversation),
            tools: request
                .tools
                .iter()
                .map(|tool| FunctionTool {
                    tool_type: "function".to_string(),
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                })
                .collect(),
            previous_response_id: request.continuation_token.map(str::to_string),
            truncation: "auto".to_string(),
        };
        serde_json::to_value(body)
            .map_err(|e| ProviderError::InvalidResponseShape(format!("encode failed: {}", e)))
    }

    fn decode(&self, response: &Value) -> Result<DecodedResponse, ProviderError> {
        let parsed: ResponsesResponse = serde_json::from_value(response.clone())
            .map_err(|e| ProviderError::InvalidResponseShape(e.to_string()))?;
        parse_output(parsed)
    }
}
