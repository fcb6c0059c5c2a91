//! Wire types for `POST /api/public/ingestion`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format a timestamp the way the ingestion API expects (RFC 3339, millis, `Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One element of an ingestion `batch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IngestionEvent {
    TraceCreate {
        id: String,
        timestamp: String,
        body: TraceBody,
    },
    SpanCreate {
        id: String,
        timestamp: String,
        body: ObservationBody,
    },
    GenerationCreate {
        id: String,
        timestamp: String,
        body: ObservationBody,
    },
}

impl IngestionEvent {
    pub fn trace(body: TraceBody, at: DateTime<Utc>) -> Self {
        Self::TraceCreate {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: format_timestamp(at),
            body,
        }
    }

    pub fn span(body: ObservationBody, at: DateTime<Utc>) -> Self {
        Self::SpanCreate {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: format_timestamp(at),
            body,
        }
    }

    pub fn generation(body: ObservationBody, at: DateTime<Utc>) -> Self {
        Self::GenerationCreate {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: format_timestamp(at),
            body,
        }
    }

    /// Event id (not the trace/observation id).
    pub fn id(&self) -> &str {
        match self {
            Self::TraceCreate { id, .. }
            | Self::SpanCreate { id, .. }
            | Self::GenerationCreate { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceBody {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Body shared by `span-create` and `generation-create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationBody {
    pub id: String,
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_observation_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<ObservationLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageBody>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationLevel {
    Debug,
    Default,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBody {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    #[serde(default = "default_unit")]
    pub unit: String,
}

impl UsageBody {
    pub fn tokens(input: u64, output: u64, total: u64) -> Self {
        Self {
            input,
            output,
            total,
            unit: default_unit(),
        }
    }
}

fn default_unit() -> String {
    "TOKENS".to_string()
}

/// Response to an ingestion request. Langfuse answers 207 with per-event results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionResponse {
    #[serde(default)]
    pub successes: Vec<IngestionSuccess>,
    #[serde(default)]
    pub errors: Vec<IngestionFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionSuccess {
    pub id: String,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionFailure {
    pub id: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_trace_event_wire_shape() {
        let event = IngestionEvent::trace(
            TraceBody {
                id: "t1".into(),
                name: "Claude Code - Turn 1".into(),
                session_id: Some("s1".into()),
                tags: vec!["claude-code".into()],
                ..Default::default()
            },
            at(),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "trace-create");
        assert_eq!(value["timestamp"], "2026-03-01T12:00:00.000Z");
        assert_eq!(value["body"]["sessionId"], "s1");
        assert_eq!(value["body"]["tags"], json!(["claude-code"]));
        assert!(value["body"].get("input").is_none());
        assert_eq!(value["id"].as_str(), Some(event.id()));
    }

    #[test]
    fn test_observation_event_wire_shape() {
        let event = IngestionEvent::generation(
            ObservationBody {
                id: "g1".into(),
                trace_id: "t1".into(),
                parent_observation_id: Some("a1".into()),
                name: "Claude Response".into(),
                level: Some(ObservationLevel::Default),
                usage: Some(UsageBody::tokens(10, 5, 15)),
                ..Default::default()
            },
            at(),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "generation-create");
        assert_eq!(value["body"]["traceId"], "t1");
        assert_eq!(value["body"]["parentObservationId"], "a1");
        assert_eq!(value["body"]["level"], "DEFAULT");
        assert_eq!(
            value["body"]["usage"],
            json!({"input": 10, "output": 5, "total": 15, "unit": "TOKENS"})
        );
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = IngestionEvent::span(ObservationBody::default(), at());
        let b = IngestionEvent::span(ObservationBody::default(), at());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_partial_response_parses() {
        let response: IngestionResponse = serde_json::from_value(json!({
            "successes": [{"id": "e1", "status": 201}],
            "errors": [{"id": "e2", "status": 400, "message": "invalid body"}]
        }))
        .unwrap();
        assert_eq!(response.successes.len(), 1);
        assert_eq!(response.errors[0].message.as_deref(), Some("invalid body"));
    }
}
