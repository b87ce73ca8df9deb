//! Vendor-neutral conversation types shared by every adapter.

use serde::{Deserialize, Serialize};

/// Message role in the conversation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One ordered content block inside a message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        media_type: String,
        /// Base64 payload, without a data-URL prefix.
        data: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Vec<ContentBlock>,
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Image {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// Number of image blocks in this block, including nested tool-result content.
    pub fn image_count(&self) -> usize {
        match self {
            Self::Image { .. } => 1,
            Self::ToolResult { content, .. } => content.iter().map(Self::image_count).sum(),
            _ => 0,
        }
    }
}

/// A single protocol turn.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ConversationMessage {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn image_count(&self) -> usize {
        self.content.iter().map(ContentBlock::image_count).sum()
    }
}

/// One model-requested action.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Vendor-neutral tool definition; adapters map it onto their own field names.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Normalized provider reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedResponse {
    pub tool_calls: Vec<ToolCall>,
    pub text_output: String,
    pub continuation_token: Option<String>,
}

impl DecodedResponse {
    /// Assistant message to append to the local history.
    pub fn to_assistant_message(&self) -> ConversationMessage {
        let mut content = Vec::new();
        if !self.text_output.is_empty() {
            content.push(ContentBlock::text(self.text_output.clone()));
        }
        for call in &self.tool_calls {
            content.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
            });
        }
        ConversationMessage::assistant(content)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_block_serialization_tag() {
        let block = ContentBlock::text("hi");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"], "hi");
    }

    #[test]
    fn test_nested_image_count() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "t1".to_string(),
            content: vec![
                ContentBlock::text("ok"),
                ContentBlock::image("image/png", "AAAA"),
            ],
            is_error: false,
        };
        assert_eq!(block.image_count(), 1);

        let msg = ConversationMessage::user(vec![block, ContentBlock::image("image/png", "BBBB")]);
        assert_eq!(msg.image_count(), 2);
    }

    #[test]
    fn test_assistant_message_from_response() {
        let decoded = DecodedResponse {
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "computer".to_string(),
                input: json!({"action": "screenshot"}),
            }],
            text_output: "Taking a look".to_string(),
            continuation_token: None,
        };
        let msg = decoded.to_assistant_message();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.len(), 2);
        assert!(matches!(&msg.content[1], ContentBlock::ToolUse { id, .. } if id == "call_1"));
    }

    #[test]
    fn test_empty_text_not_appended() {
        let decoded = DecodedResponse::default();
        assert!(decoded.to_assistant_message().content.is_empty());
    }
}
