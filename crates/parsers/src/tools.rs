use tracehook_core::{ContentBlock, ToolCall, Turn, UserMessage};

/// Resolve each `ToolUse` block against the tool results collected for a turn.
///
/// Results are searched in arrival order and the first block whose
/// `tool_use_id` matches wins. A call without a result gets `output: None`.
/// Results that belong to calls from an earlier turn are not looked up.
pub fn resolve_tool_calls<'a>(
    blocks: impl IntoIterator<Item = &'a ContentBlock>,
    tool_results: &[UserMessage],
) -> Vec<ToolCall> {
    blocks
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some(resolve_one(id, name, input, tool_results)),
            _ => None,
        })
        .collect()
}

/// All tool calls made anywhere in `turn`.
pub fn turn_tool_calls(turn: &Turn) -> Vec<ToolCall> {
    resolve_tool_calls(turn.tool_uses(), &turn.tool_results)
}

fn resolve_one(
    id: &str,
    name: &str,
    input: &serde_json::Value,
    tool_results: &[UserMessage],
) -> ToolCall {
    let matched = tool_results.iter().find_map(|message| {
        message.content.iter().find_map(|block| match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } if tool_use_id == id => Some((message, content, is_error.unwrap_or(false))),
            _ => None,
        })
    });

    match matched {
        Some((message, content, is_error)) => ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            input: input.clone(),
            output: Some(content.clone()),
            timestamp: message.timestamp.clone(),
            is_error,
        },
        None => ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            input: input.clone(),
            output: None,
            timestamp: None,
            is_error: false,
        },
    }
}
