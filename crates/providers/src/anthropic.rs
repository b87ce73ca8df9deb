//! Messages-API adapter: resends the full compacted history every turn.

use crate::traits::*;
use crate::types::*;
use serde_json::{json, Value};

pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    endpoint: String,
    max_tokens: u32,
}

impl AnthropicAdapter {
    pub fn new() -> Self {
        Self::with_endpoint(ANTHROPIC_MESSAGES_URL.to_string())
    }

    pub fn with_endpoint(endpoint: String) -> Self {
        Self {
            endpoint,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl Default for AnthropicAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
        ContentBlock::Image { media_type, data } => json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": media_type,
                "data": data
            }
        }),
        ContentBlock::ToolUse { id, name, input } => json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content.iter().map(encode_block).collect::<Vec<_>>(),
            "is_error": is_error
        }),
    }
}

fn encode_message(message: &ConversationMessage) -> Value {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    json!({
        "role": role,
        "content": message.content.iter().map(encode_block).collect::<Vec<_>>()
    })
}

fn required_str<'a>(block: &'a Value, field: &str) -> Result<&'a str, ProviderError> {
    block
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ProviderError::InvalidResponseShape(format!("tool_use block missing '{}'", field))
        })
}

impl ProviderAdapter for AnthropicAdapter {
    fn provider_id(&self) -> &str {
        "anthropic"
    }

    fn history_mode(&self) -> HistoryMode {
        HistoryMode::FullHistory
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn auth_headers(&self, api_key: &str) -> Vec<(String, String)> {
        vec![
            ("x-api-key".to_string(), api_key.to_string()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ]
    }

    fn encode(&self, request: EncodeRequest<'_>) -> Result<Value, ProviderError> {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema
                })
            })
            .collect();

        Ok(json!({
            "model": request.model,
            "max_tokens": self.max_tokens,
            "tools": tools,
            "messages": request
                .conversation
                .iter()
                .map(encode_message)
                .collect::<Vec<_>>()
        }))
    }

    fn decode(&self, response: &Value) -> Result<DecodedResponse, ProviderError> {
        if response.get("type").and_then(Value::as_str) == Some("error") {
            let message = response["error"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            return Err(ProviderError::InvalidResponseShape(format!(
                "error payload: {}",
                message
            )));
        }

        let blocks = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProviderError::InvalidResponseShape("response has no content array".to_string())
            })?;

        let mut decoded = DecodedResponse::default();
        let mut texts = Vec::new();

        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        texts.push(text.to_string());
                    }
                }
                Some("tool_use") => {
                    decoded.tool_calls.push(ToolCall {
                        id: required_str(block, "id")?.to_string(),
                        name: required_str(block, "name")?.to_string(),
                        input: block.get("input").cloned().unwrap_or_else(|| json!({})),
                    });
                }
                // thinking and other block kinds carry nothing the loop acts on
                _ => {}
            }
        }

        decoded.text_output = texts.join("\n");
        if decoded.tool_calls.is_empty() && decoded.text_output.trim().is_empty() {
            return Err(ProviderError::InvalidResponseShape(
                "response contained neither text nor tool calls".to_string(),
            ));
        }
        Ok(decoded)
    }
}
