//! Builders for raw Claude Code transcript records, shared by tests.

use serde_json::{Value, json};

/// Plain user prompt.
pub fn user(text: &str, timestamp: &str) -> Value {
    json!({
        "type": "user",
        "sessionId": "test-session",
        "timestamp": timestamp,
        "message": {"role": "user", "content": text},
    })
}

/// User prompt carrying a specific session id.
pub fn user_in_session(text: &str, session_id: &str, timestamp: &str) -> Value {
    let mut record = user(text, timestamp);
    record["sessionId"] = json!(session_id);
    record
}

/// User record that returns the output of tool `tool_use_id`.
pub fn tool_result(tool_use_id: &str, output: &str, timestamp: &str) -> Value {
    json!({
        "type": "user",
        "timestamp": timestamp,
        "message": {
            "role": "user",
            "content": [{"type": "tool_result", "tool_use_id": tool_use_id, "content": output}],
        },
    })
}

/// Assistant record (one response part) with arbitrary content blocks.
pub fn assistant(message_id: &str, content: Value, timestamp: &str) -> Value {
    json!({
        "type": "assistant",
        "timestamp": timestamp,
        "message": {
            "id": message_id,
            "role": "assistant",
            "model": "claude-sonnet-4-5",
            "content": content,
        },
    })
}

pub fn assistant_text(message_id: &str, text: &str, timestamp: &str) -> Value {
    assistant(message_id, json!([{"type": "text", "text": text}]), timestamp)
}

pub fn assistant_tool_use(
    message_id: &str,
    tool_use_id: &str,
    name: &str,
    input: Value,
    timestamp: &str,
) -> Value {
    assistant(
        message_id,
        json!([{"type": "tool_use", "id": tool_use_id, "name": name, "input": input}]),
        timestamp,
    )
}

/// Attach a `usage` object to an assistant record.
pub fn with_usage(mut record: Value, input_tokens: u64, output_tokens: u64) -> Value {
    record["message"]["usage"] = json!({
        "input_tokens": input_tokens,
        "output_tokens": output_tokens,
    });
    record
}

/// System record reporting how long the previous turn took.
pub fn turn_duration(duration_ms: u64, timestamp: &str) -> Value {
    json!({
        "type": "system",
        "subtype": "turn_duration",
        "durationMs": duration_ms,
        "timestamp": timestamp,
    })
}

/// Serialize records as JSONL text (trailing newline included).
pub fn to_jsonl(records: &[Value]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.to_string());
        out.push('\n');
    }
    out
}
