use crate::message::{AssistantMessage, ContentBlock, UserMessage};
use serde::{Deserialize, Serialize};

/// One user request together with every response and tool result that answered it.
///
/// A `Turn` is only ever built with a triggering user message and at least one
/// assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user: UserMessage,
    pub assistants: Vec<AssistantMessage>,
    #[serde(default)]
    pub tool_results: Vec<UserMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Turn {
    pub fn user_text(&self) -> String {
        self.user.text()
    }

    /// Text of the final assistant message, which is what the user saw last.
    pub fn final_text(&self) -> String {
        self.assistants
            .last()
            .map(AssistantMessage::text)
            .unwrap_or_default()
    }

    /// Every `ToolUse` block across the turn's assistant messages, in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = &ContentBlock> {
        self.assistants
            .iter()
            .flat_map(|a| a.content.iter())
            .filter(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }
}

/// A tool invocation resolved against its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    /// `None` when no result for this call was seen within the turn.
    pub output: Option<serde_json::Value>,
    /// Timestamp of the user record that carried the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub is_error: bool,
}
