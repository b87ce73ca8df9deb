use super::types::*;
use crate::traits::ProviderError;
use crate::types::{ContentBlock, ConversationMessage, DecodedResponse, Role, ToolCall};
use serde_json::Value;

fn data_url(media_type: &str, data: &str) -> String {
    format!("data:{};base64,{}", media_type, data)
}

/// Flatten tool-result content into the string output the API expects.
fn tool_output_text(content: &[ContentBlock], is_error: bool) -> String {
    let mut text = content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    if content.iter().any(ContentBlock::is_image) {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("[screenshot attached in the following message]");
    }
    if is_error {
        format!("ERROR: {}", text)
    } else {
        text
    }
}

pub fn build_input(conversation: &[ConversationMessage]) -> Vec<InputItem> {
    let mut items = Vec::new();

    for message in conversation {
        match message.role {
            Role::User => {
                let mut content = Vec::new();
                let mut result_images = Vec::new();
                for block in &message.content {
                    match block {
                        ContentBlock::Text { text } => {
                            content.push(InputContent::InputText { text: text.clone() })
                        }
                        ContentBlock::Image { media_type, data } => {
                            content.push(InputContent::InputImage {
                                image_url: data_url(media_type, data),
                            })
                        }
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content: result,
                            is_error,
                        } => {
                            items.push(InputItem::FunctionCallOutput {
                                call_id: tool_use_id.clone(),
                                output: tool_output_text(result, *is_error),
                            });
                            for nested in result {
                                if let ContentBlock::Image { media_type, data } = nested {
                                    result_images.push(InputContent::InputImage {
                                        image_url: data_url(media_type, data),
                                    });
                                }
                            }
                        }
                        ContentBlock::ToolUse { .. } => {}
                    }
                }
                // function outputs must precede any follow-up user content
                content.extend(result_images);
                if !content.is_empty() {
                    items.push(InputItem::Message {
                        role: "user".to_string(),
                        content,
                    });
                }
            }
            Role::Assistant => {
                let mut content = Vec::new();
                for block in &message.content {
                    match block {
                        ContentBlock::Text { text } => {
                            content.push(InputContent::OutputText { text: text.clone() })
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            items.push(InputItem::FunctionCall {
                                call_id: id.clone(),
                                name: name.clone(),
                                arguments: input.to_string(),
                            });
                        }
                        _ => {}
                    }
                }
                if !content.is_empty() {
                    items.push(InputItem::Message {
                        role: "assistant".to_string(),
                        content,
                    });
                }
            }
        }
    }

    items
}

fn required_str<'a>(item: &'a Value, field: &str) -> Result<&'a str, ProviderError> {
    item.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ProviderError::InvalidResponseShape(format!("function_call missing '{}'", field))
        })
}

pub fn parse_output(response: ResponsesResponse) -> Result<DecodedResponse, ProviderError> {
    if let Some(error) = response.error.filter(|e| !e.is_null()) {
        return Err(ProviderError::InvalidResponseShape(format!(
            "error payload: {}",
            error
        )));
    }

    let token = response
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponseShape("response has no id".to_string()))?;
    let output = response
        .output
        .ok_or_else(|| ProviderError::InvalidResponseShape("No output in response".to_string()))?;

    let mut decoded = DecodedResponse {
        continuation_token: Some(token),
        ..DecodedResponse::default()
    };
    let mut texts = Vec::new();

    for item in &output {
        match item.get("type").and_then(Value::as_str) {
            Some("function_call") => {
                let raw_arguments = item
                    .get("arguments")
                    .and_then(Value::as_str)
                    .unwrap_or("{}");
                // unparseable arguments are surfaced to the dispatcher as a raw string
                let input = serde_json::from_str(raw_arguments)
                    .unwrap_or_else(|_| Value::String(raw_arguments.to_string()));
                decoded.tool_calls.push(ToolCall {
                    id: required_str(item, "call_id")?.to_string(),
                    name: required_str(item, "name")?.to_string(),
                    input,
                });
            }
            Some("message") => {
                if let Some(parts) = item.get("content").and_then(Value::as_array) {
                    for part in parts {
                        if part.get("type").and_then(Value::as_str) == Some("output_text") {
                            if let Some(text) = part.get("text").and_then(Value::as_str) {
                                texts.push(text.to_string());
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    decoded.text_output = texts.join("\n");
    if decoded.tool_calls.is_empty() && decoded.text_output.trim().is_empty() {
        return Err(ProviderError::InvalidResponseShape(
            "response contained neither text nor function calls".to_string(),
        ));
    }
    Ok(decoded)
}
