//! Turn → trace tree projection.
//!
//! Each turn becomes one trace with a single agent span underneath it, one
//! generation per assistant message, and one tool span per tool call made in
//! that message. Ids are derived from the session id and turn number so a
//! resubmitted turn overwrites its earlier copy instead of duplicating it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracehook_core::{SessionMetadata, Turn, Usage};
use tracehook_parsers::resolve_tool_calls;

pub const TRACE_TAG: &str = "claude-code";
pub const AGENT_SPAN_NAME: &str = "Claude Code";
pub const GENERATION_NAME: &str = "Claude Response";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceTree {
    pub id: String,
    pub name: String,
    pub session_id: String,
    pub turn_number: usize,
    pub input: String,
    pub output: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub metadata: Map<String, Value>,
    pub tags: Vec<String>,
    pub agent: AgentSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpan {
    pub id: String,
    pub name: String,
    pub input: String,
    pub output: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub generations: Vec<Generation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub id: String,
    pub name: String,
    pub model: Option<String>,
    /// Only the first generation of a turn carries the user prompt.
    pub input: Option<String>,
    pub output: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub usage: Option<Usage>,
    pub tools: Vec<ToolSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpan {
    pub id: String,
    pub name: String,
    pub tool_use_id: String,
    pub input: Value,
    pub output: Option<Value>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub level: SpanLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanLevel {
    Default,
    Error,
}

/// Parse an RFC 3339 transcript timestamp.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Project `turn` into a trace tree.
///
/// `turn_number` is 1-based across the whole session. `metadata` is attached
/// to the trace when present and non-empty. `now` closes the last generation.
pub fn project_turn(
    turn: &Turn,
    session_id: &str,
    turn_number: usize,
    metadata: Option<&SessionMetadata>,
    now: DateTime<Utc>,
) -> TraceTree {
    let trace_id = format!("{session_id}-turn-{turn_number}");
    let agent_id = format!("{trace_id}-agent");
    let input = turn.user_text();
    let output = turn.final_text();

    let start_time = parse_timestamp(turn.user.timestamp.as_deref());
    let end_time = turn_end(turn, start_time);

    let starts: Vec<Option<DateTime<Utc>>> = turn
        .assistants
        .iter()
        .map(|a| parse_timestamp(a.timestamp.as_deref()))
        .collect();

    let generations = turn
        .assistants
        .iter()
        .enumerate()
        .map(|(index, assistant)| {
            let id = format!("{trace_id}-generation-{}", index + 1);
            let start = starts[index];
            let end = match starts.get(index + 1) {
                Some(next) => *next,
                None => Some(now),
            };

            let mut previous_end = start;
            let tools = resolve_tool_calls(&assistant.content, &turn.tool_results)
                .into_iter()
                .map(|call| {
                    let tool_start = previous_end.or(start);
                    let tool_end = parse_timestamp(call.timestamp.as_deref());
                    previous_end = tool_end;
                    ToolSpan {
                        id: format!("{id}-tool-{}", call.id),
                        name: format!("Tool: {}", call.name),
                        tool_use_id: call.id,
                        input: call.input,
                        output: call.output,
                        start_time: tool_start,
                        end_time: tool_end,
                        level: if call.is_error {
                            SpanLevel::Error
                        } else {
                            SpanLevel::Default
                        },
                    }
                })
                .collect();

            Generation {
                name: GENERATION_NAME.to_string(),
                model: assistant.model.clone(),
                input: (index == 0).then(|| input.clone()),
                output: assistant.text(),
                start_time: start,
                end_time: end,
                usage: assistant.usage.clone(),
                tools,
                id,
            }
        })
        .collect();

    let mut trace_metadata = Map::new();
    trace_metadata.insert("turn_number".into(), json!(turn_number));
    trace_metadata.insert("session_id".into(), json!(session_id));
    if let Some(duration_ms) = turn.duration_ms {
        trace_metadata.insert("duration_ms".into(), json!(duration_ms));
    }
    if let Some(meta) = metadata.filter(|m| !m.is_empty()) {
        let fields = [
            ("version", &meta.version),
            ("slug", &meta.slug),
            ("cwd", &meta.cwd),
            ("git_branch", &meta.git_branch),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                trace_metadata.insert(key.into(), json!(value));
            }
        }
    }

    TraceTree {
        name: format!("Claude Code - Turn {turn_number}"),
        session_id: session_id.to_string(),
        turn_number,
        start_time,
        end_time,
        metadata: trace_metadata,
        tags: vec![TRACE_TAG.to_string()],
        agent: AgentSpan {
            id: agent_id,
            name: AGENT_SPAN_NAME.to_string(),
            input: input.clone(),
            output: output.clone(),
            start_time,
            end_time,
            generations,
        },
        id: trace_id,
        input,
        output,
    }
}

/// Start plus the recorded duration, else the latest timestamp seen in the turn.
fn turn_end(turn: &Turn, start: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    if let (Some(start), Some(ms)) = (start, turn.duration_ms) {
        let end = i64::try_from(ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .and_then(|d| start.checked_add_signed(d));
        if end.is_some() {
            return end;
        }
    }
    turn.assistants
        .iter()
        .map(|a| a.timestamp.as_deref())
        .chain(turn.tool_results.iter().map(|r| r.timestamp.as_deref()))
        .filter_map(parse_timestamp)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tracehook_core::{AssistantMessage, ContentBlock, UserMessage};

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, secs).unwrap()
    }

    fn ts(secs: u32) -> Option<String> {
        Some(format!("2026-01-01T00:00:{secs:02}Z"))
    }

    fn user(content: Vec<ContentBlock>, timestamp: Option<String>) -> UserMessage {
        UserMessage {
            content,
            timestamp,
            session_id: None,
            metadata: None,
        }
    }

    fn assistant(content: Vec<ContentBlock>, timestamp: Option<String>) -> AssistantMessage {
        AssistantMessage {
            id: None,
            model: Some("claude-sonnet-4-5".into()),
            content,
            usage: None,
            timestamp,
        }
    }

    fn tool_use(id: &str, name: &str) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input: json!({"path": "a.rs"}),
        }
    }

    fn tool_result(id: &str, is_error: bool) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: id.into(),
            content: json!("ok"),
            is_error: Some(is_error),
        }
    }

    fn tool_turn() -> Turn {
        Turn {
            user: user(vec![ContentBlock::text("fix it")], ts(0)),
            assistants: vec![
                assistant(
                    vec![ContentBlock::text("looking"), tool_use("r1", "Read"), tool_use("b1", "Bash")],
                    ts(1),
                ),
                assistant(vec![ContentBlock::text("done")], ts(5)),
            ],
            tool_results: vec![
                user(vec![tool_result("r1", false)], ts(2)),
                user(vec![tool_result("b1", true)], ts(4)),
            ],
            duration_ms: None,
        }
    }

    #[test]
    fn test_tree_shape_and_names() {
        let tree = project_turn(&tool_turn(), "s1", 3, None, at(9));
        assert_eq!(tree.id, "s1-turn-3");
        assert_eq!(tree.name, "Claude Code - Turn 3");
        assert_eq!(tree.tags, vec!["claude-code"]);
        assert_eq!(tree.input, "fix it");
        assert_eq!(tree.output, "done");
        assert_eq!(tree.agent.name, "Claude Code");
        assert_eq!(tree.agent.input, "fix it");
        assert_eq!(tree.agent.generations.len(), 2);

        let first = &tree.agent.generations[0];
        assert_eq!(first.name, "Claude Response");
        assert_eq!(first.input.as_deref(), Some("fix it"));
        assert_eq!(tree.agent.generations[1].input, None);
        assert_eq!(first.tools.len(), 2);
        assert_eq!(first.tools[0].name, "Tool: Read");
        assert_eq!(first.tools[1].level, SpanLevel::Error);
        assert_eq!(first.tools[0].level, SpanLevel::Default);
    }

    #[test]
    fn test_timing_chain() {
        let tree = project_turn(&tool_turn(), "s1", 1, None, at(9));
        assert_eq!(tree.start_time, Some(at(0)));
        // no duration: latest timestamp across assistants and tool results
        assert_eq!(tree.end_time, Some(at(5)));

        let first = &tree.agent.generations[0];
        assert_eq!(first.start_time, Some(at(1)));
        assert_eq!(first.end_time, Some(at(5)));
        assert_eq!(first.tools[0].start_time, Some(at(1)));
        assert_eq!(first.tools[0].end_time, Some(at(2)));
        assert_eq!(first.tools[1].start_time, Some(at(2)));
        assert_eq!(first.tools[1].end_time, Some(at(4)));

        assert_eq!(tree.agent.generations[1].end_time, Some(at(9)));
    }

    #[test]
    fn test_duration_sets_end() {
        let mut turn = tool_turn();
        turn.duration_ms = Some(2_500);
        let tree = project_turn(&turn, "s1", 1, None, at(9));
        assert_eq!(tree.end_time, Some(at(0) + Duration::milliseconds(2_500)));
        assert_eq!(tree.metadata["duration_ms"], json!(2_500));
    }

    #[test]
    fn test_missing_timestamps_are_omitted() {
        let turn = Turn {
            user: user(vec![ContentBlock::text("q")], None),
            assistants: vec![assistant(vec![tool_use("x", "Grep")], Some("not a date".into()))],
            tool_results: vec![],
            duration_ms: Some(1_000),
        };
        let tree = project_turn(&turn, "s1", 1, None, at(9));
        assert_eq!(tree.start_time, None);
        assert_eq!(tree.end_time, None);
        let tool = &tree.agent.generations[0].tools[0];
        assert_eq!(tool.output, None);
        assert_eq!(tool.start_time, None);
        assert_eq!(tool.end_time, None);
    }

    #[test]
    fn test_metadata_and_usage() {
        let mut turn = tool_turn();
        turn.assistants[1].usage = Some(Usage {
            input: 10,
            output: 4,
            total: 14,
            ..Default::default()
        });
        let meta = SessionMetadata {
            version: Some("2.0.1".into()),
            git_branch: Some("main".into()),
            ..Default::default()
        };
        let tree = project_turn(&turn, "s1", 7, Some(&meta), at(9));
        assert_eq!(tree.metadata["turn_number"], json!(7));
        assert_eq!(tree.metadata["session_id"], json!("s1"));
        assert_eq!(tree.metadata["version"], json!("2.0.1"));
        assert_eq!(tree.metadata["git_branch"], json!("main"));
        assert!(!tree.metadata.contains_key("cwd"));
        assert_eq!(tree.agent.generations[0].usage, None);
        assert_eq!(tree.agent.generations[1].usage.as_ref().map(|u| u.total), Some(14));
    }

    #[test]
    fn test_empty_metadata_is_not_attached() {
        let tree = project_turn(&tool_turn(), "s1", 1, Some(&SessionMetadata::default()), at(9));
        assert_eq!(tree.metadata.len(), 2);
    }
}
