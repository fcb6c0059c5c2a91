//! Normalizes raw transcript records into [`ClassifiedMessage`]s.
//!
//! Classification fails closed: anything that does not look like a user,
//! assistant or system record is discarded rather than reported as an error,
//! so new record kinds in the transcript format never break a batch.

use serde_json::{Map, Value};
use tracehook_core::{
    AssistantMessage, ClassifiedMessage, ContentBlock, SessionMetadata, SystemMessage, Usage,
    UserMessage,
};

/// Classify one parsed transcript line. Returns `None` for framework-injected
/// (`isMeta`) records and for shapes we do not recognize.
pub fn classify(record: &Value) -> Option<ClassifiedMessage> {
    let obj = record.as_object()?;
    if obj.get("isMeta").and_then(Value::as_bool) == Some(true) {
        return None;
    }

    let kind = obj.get("type").and_then(Value::as_str);
    let envelope = obj.get("message").and_then(Value::as_object);
    let content = resolve_content(obj, envelope);
    let timestamp = resolve_timestamp(obj, envelope);

    if kind == Some("user") {
        return Some(ClassifiedMessage::User(UserMessage {
            content,
            timestamp,
            session_id: string_field(obj, "sessionId"),
            metadata: session_metadata(obj),
        }));
    }

    if let Some(envelope) = envelope {
        return Some(ClassifiedMessage::Assistant(AssistantMessage {
            id: string_field(envelope, "id"),
            model: string_field(envelope, "model"),
            content,
            usage: extract_usage(envelope).or_else(|| extract_usage(obj)),
            timestamp,
        }));
    }

    if kind == Some("system") {
        return Some(ClassifiedMessage::System(SystemMessage {
            subtype: string_field(obj, "subtype").unwrap_or_default(),
            duration_ms: obj.get("durationMs").and_then(as_count),
            timestamp,
        }));
    }

    None
}

/// The envelope's `content` wins over the record's own.
fn resolve_content(obj: &Map<String, Value>, envelope: Option<&Map<String, Value>>) -> Vec<ContentBlock> {
    let raw = match envelope {
        Some(envelope) => envelope.get("content"),
        None => obj.get("content"),
    };
    match raw {
        Some(Value::String(text)) => vec![ContentBlock::text(text.clone())],
        Some(Value::Array(items)) => items.iter().map(parse_block).collect(),
        _ => Vec::new(),
    }
}

fn parse_block(item: &Value) -> ContentBlock {
    if let Value::String(text) = item {
        return ContentBlock::text(text.clone());
    }
    let Some(obj) = item.as_object() else {
        return ContentBlock::Other { raw: item.clone() };
    };

    match obj.get("type").and_then(Value::as_str) {
        Some("text") => ContentBlock::Text {
            text: string_field(obj, "text").unwrap_or_default(),
        },
        Some("tool_use") => match (string_field(obj, "id"), string_field(obj, "name")) {
            (Some(id), Some(name)) => ContentBlock::ToolUse {
                id,
                name,
                input: obj.get("input").cloned().unwrap_or(Value::Null),
            },
            _ => ContentBlock::Other { raw: item.clone() },
        },
        Some("tool_result") => match string_field(obj, "tool_use_id") {
            Some(tool_use_id) => ContentBlock::ToolResult {
                tool_use_id,
                content: obj.get("content").cloned().unwrap_or(Value::Null),
                is_error: obj.get("is_error").and_then(Value::as_bool),
            },
            None => ContentBlock::Other { raw: item.clone() },
        },
        _ => ContentBlock::Other { raw: item.clone() },
    }
}

/// A top-level timestamp takes precedence over the envelope's. Non-string
/// values resolve to absent.
fn resolve_timestamp(obj: &Map<String, Value>, envelope: Option<&Map<String, Value>>) -> Option<String> {
    let raw = obj
        .get("timestamp")
        .filter(|v| !v.is_null())
        .or_else(|| envelope.and_then(|e| e.get("timestamp")));
    raw.and_then(Value::as_str).map(str::to_string)
}

fn extract_usage(obj: &Map<String, Value>) -> Option<Usage> {
    let usage = obj.get("usage")?.as_object()?;
    let count = |key: &str| usage.get(key).and_then(as_count);

    let input = count("input_tokens");
    let output = count("output_tokens");
    let cache_read = count("cache_read_input_tokens");
    let cache_creation = count("cache_creation_input_tokens");
    if input.is_none() && output.is_none() && cache_read.is_none() && cache_creation.is_none() {
        return None;
    }

    let input = input.unwrap_or(0);
    let output = output.unwrap_or(0);
    Some(Usage {
        input,
        output,
        total: input.saturating_add(output),
        cache_read_input_tokens: cache_read,
        cache_creation_input_tokens: cache_creation,
    })
}

fn session_metadata(obj: &Map<String, Value>) -> Option<SessionMetadata> {
    let metadata = SessionMetadata {
        version: string_field(obj, "version"),
        slug: string_field(obj, "slug"),
        cwd: string_field(obj, "cwd"),
        git_branch: string_field(obj, "gitBranch"),
    };
    (!metadata.is_empty()).then_some(metadata)
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Non-negative numeric value; floats are truncated.
fn as_count(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(record: Value) -> UserMessage {
        match classify(&record) {
            Some(ClassifiedMessage::User(user)) => user,
            other => panic!("expected user, got {other:?}"),
        }
    }

    fn assistant(record: Value) -> AssistantMessage {
        match classify(&record) {
            Some(ClassifiedMessage::Assistant(assistant)) => assistant,
            other => panic!("expected assistant, got {other:?}"),
        }
    }

    #[test]
    fn test_string_content_becomes_text_block() {
        let msg = user(json!({
            "type": "user",
            "message": {"role": "user", "content": "hello"},
            "timestamp": "2026-01-01T00:00:00Z",
        }));
        assert_eq!(msg.content, vec![ContentBlock::text("hello")]);
        assert_eq!(msg.timestamp.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn test_envelope_content_is_authoritative() {
        let msg = user(json!({
            "type": "user",
            "content": "outer",
            "message": {"content": "inner"},
        }));
        assert_eq!(msg.text(), "inner");
    }

    #[test]
    fn test_record_content_used_without_envelope() {
        let msg = user(json!({"type": "user", "content": [{"type": "text", "text": "bare"}]}));
        assert_eq!(msg.text(), "bare");
    }

    #[test]
    fn test_non_array_content_is_empty() {
        let msg = user(json!({"type": "user", "message": {"content": 42}}));
        assert!(msg.content.is_empty());
    }

    #[test]
    fn test_meta_records_are_discarded() {
        let record = json!({
            "type": "user",
            "isMeta": true,
            "message": {"content": "<command-name>/clear</command-name>"},
        });
        assert!(classify(&record).is_none());

        let assistant = json!({"type": "assistant", "isMeta": true, "message": {"content": []}});
        assert!(classify(&assistant).is_none());
    }

    #[test]
    fn test_unknown_shapes_are_discarded() {
        assert!(classify(&json!({"type": "file-history-snapshot", "snapshot": {}})).is_none());
        assert!(classify(&json!({"type": "summary", "summary": "x"})).is_none());
        assert!(classify(&json!("just a string")).is_none());
        assert!(classify(&json!([1, 2, 3])).is_none());
    }

    #[test]
    fn test_assistant_detected_by_envelope() {
        let msg = assistant(json!({
            "type": "assistant",
            "timestamp": "2026-01-01T00:00:01Z",
            "message": {
                "id": "msg_1",
                "model": "claude-opus-4-6",
                "content": [
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "tool_use", "id": "tu1", "name": "Read", "input": {"file_path": "/a"}},
                ],
            },
        }));
        assert_eq!(msg.id.as_deref(), Some("msg_1"));
        assert_eq!(msg.model.as_deref(), Some("claude-opus-4-6"));
        assert_eq!(msg.content.len(), 2);
        assert!(matches!(msg.content[0], ContentBlock::Other { .. }));
        assert!(matches!(
            &msg.content[1],
            ContentBlock::ToolUse { id, name, .. } if id == "tu1" && name == "Read"
        ));
        assert!(msg.usage.is_none());
    }

    #[test]
    fn test_top_level_timestamp_wins() {
        let msg = assistant(json!({
            "timestamp": "2026-01-01T00:00:05Z",
            "message": {"content": [], "timestamp": "2026-01-01T00:00:00Z"},
        }));
        assert_eq!(msg.timestamp.as_deref(), Some("2026-01-01T00:00:05Z"));

        let nested = assistant(json!({
            "message": {"content": [], "timestamp": "2026-01-01T00:00:00Z"},
        }));
        assert_eq!(nested.timestamp.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn test_non_string_timestamp_is_absent() {
        let msg = assistant(json!({"timestamp": 1700000000, "message": {"content": []}}));
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn test_usage_extraction() {
        let msg = assistant(json!({
            "message": {
                "content": [],
                "usage": {
                    "input_tokens": 10,
                    "output_tokens": 32,
                    "cache_read_input_tokens": 1000,
                    "service_tier": "standard",
                },
            },
        }));
        let usage = msg.usage.unwrap();
        assert_eq!(usage.input, 10);
        assert_eq!(usage.output, 32);
        assert_eq!(usage.total, 42);
        assert_eq!(usage.cache_read_input_tokens, Some(1000));
        assert_eq!(usage.cache_creation_input_tokens, None);
    }

    #[test]
    fn test_usage_without_numbers_is_omitted() {
        let msg = assistant(json!({
            "message": {"content": [], "usage": {"service_tier": "standard"}},
        }));
        assert!(msg.usage.is_none());
    }

    #[test]
    fn test_system_turn_duration() {
        let record = json!({
            "type": "system",
            "subtype": "turn_duration",
            "durationMs": 12345,
            "timestamp": "2026-01-01T00:00:04Z",
        });
        match classify(&record) {
            Some(ClassifiedMessage::System(sys)) => {
                assert!(sys.is_turn_duration());
                assert_eq!(sys.duration_ms, Some(12345));
            }
            other => panic!("expected system, got {other:?}"),
        }
    }

    #[test]
    fn test_user_metadata_and_session_id() {
        let msg = user(json!({
            "type": "user",
            "sessionId": "sess-1",
            "version": "2.1.0",
            "cwd": "/repo",
            "gitBranch": "main",
            "slug": "quiet-river",
            "message": {"content": "hi"},
        }));
        assert_eq!(msg.session_id.as_deref(), Some("sess-1"));
        let meta = msg.metadata.unwrap();
        assert_eq!(meta.version.as_deref(), Some("2.1.0"));
        assert_eq!(meta.cwd.as_deref(), Some("/repo"));
        assert_eq!(meta.git_branch.as_deref(), Some("main"));
        assert_eq!(meta.slug.as_deref(), Some("quiet-river"));
    }

    #[test]
    fn test_tool_result_block_parsing() {
        let msg = user(json!({
            "type": "user",
            "message": {"content": [
                {"type": "tool_result", "tool_use_id": "tu1", "content": "data", "is_error": true},
            ]},
        }));
        assert!(msg.is_tool_result_carrier());
        assert_eq!(
            msg.content[0],
            ContentBlock::ToolResult {
                tool_use_id: "tu1".to_string(),
                content: json!("data"),
                is_error: Some(true),
            }
        );
    }

    #[test]
    fn test_huge_token_counts_saturate() {
        let Some(ClassifiedMessage::Assistant(msg)) = classify(&json!({
            "message": {
                "content": [],
                "usage": {"input_tokens": 1e20, "output_tokens": u64::MAX},
            },
        })) else {
            panic!("expected assistant");
        };
        let usage = msg.usage.unwrap();
        assert_eq!(usage.input, u64::MAX);
        assert_eq!(usage.output, u64::MAX);
        assert_eq!(usage.total, u64::MAX);
    }
}
