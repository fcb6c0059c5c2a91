//! Where projected traces go.

use std::future::Future;
use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracehook_api_client::ingestion::format_timestamp;
use tracehook_api_client::{
    IngestionEvent, LangfuseClient, ObservationBody, ObservationLevel, TraceBody, UsageBody,
};

use crate::projector::{SpanLevel, TraceTree};

/// Backend seam for trace submission.
///
/// `submit` may buffer; nothing is guaranteed delivered until `flush` returns `Ok`.
pub trait TraceSink {
    fn submit(&mut self, trace: TraceTree) -> impl Future<Output = Result<()>> + Send;
    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Buffers ingestion events and sends them to Langfuse in batches.
pub struct LangfuseSink {
    client: LangfuseClient,
    batch_size: usize,
    pending: Vec<IngestionEvent>,
}

impl LangfuseSink {
    pub fn new(client: LangfuseClient, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            pending: Vec::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn send_full_batches(&mut self) -> Result<()> {
        while self.pending.len() >= self.batch_size {
            self.send_front(self.batch_size).await?;
        }
        Ok(())
    }

    /// Send the oldest `count` events. They leave the buffer only once sent,
    /// so a failed batch is retried by the next flush.
    async fn send_front(&mut self, count: usize) -> Result<()> {
        let batch = &self.pending[..count];
        self.client.ingest(batch).await.with_context(|| {
            format!("Failed to send {} events to {}", batch.len(), self.client.host())
        })?;
        self.pending.drain(..count);
        Ok(())
    }
}

impl TraceSink for LangfuseSink {
    async fn submit(&mut self, trace: TraceTree) -> Result<()> {
        self.pending.extend(trace_events(&trace, Utc::now()));
        self.send_full_batches().await
    }

    async fn flush(&mut self) -> Result<()> {
        while !self.pending.is_empty() {
            let count = self.pending.len().min(self.batch_size);
            self.send_front(count).await?;
        }
        Ok(())
    }
}

/// Writes each trace as one JSON line (used for `--dry-run`).
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> TraceSink for JsonLinesSink<W> {
    async fn submit(&mut self, trace: TraceTree) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &trace).context("Failed to encode trace")?;
        self.writer.write_all(b"\n").context("Failed to write trace")?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush trace output")
    }
}

/// Keeps traces in memory. Can be told to fail after a number of submissions.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub traces: Vec<TraceTree>,
    pub flushes: usize,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn failing_after(accepted: usize) -> Self {
        Self {
            fail_after: Some(accepted),
            ..Self::default()
        }
    }
}

impl TraceSink for MemorySink {
    async fn submit(&mut self, trace: TraceTree) -> Result<()> {
        if self.fail_after.is_some_and(|limit| self.traces.len() >= limit) {
            bail!("sink rejected {}", trace.id);
        }
        self.traces.push(trace);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// Flatten a trace tree into ingestion events, parents before children.
pub fn trace_events(trace: &TraceTree, at: DateTime<Utc>) -> Vec<IngestionEvent> {
    let time = |t: Option<DateTime<Utc>>| t.map(format_timestamp);
    let mut events = Vec::new();

    events.push(IngestionEvent::trace(
        TraceBody {
            id: trace.id.clone(),
            name: trace.name.clone(),
            session_id: Some(trace.session_id.clone()),
            timestamp: time(trace.start_time),
            input: Some(json!(trace.input)),
            output: Some(json!(trace.output)),
            metadata: Some(Value::Object(trace.metadata.clone())),
            tags: trace.tags.clone(),
        },
        at,
    ));

    let agent = &trace.agent;
    events.push(IngestionEvent::span(
        ObservationBody {
            id: agent.id.clone(),
            trace_id: trace.id.clone(),
            name: agent.name.clone(),
            start_time: time(agent.start_time),
            end_time: time(agent.end_time),
            input: Some(json!(agent.input)),
            output: Some(json!(agent.output)),
            metadata: Some(json!({ "observation_type": "agent" })),
            ..Default::default()
        },
        at,
    ));

    for generation in &agent.generations {
        let metadata = generation.usage.as_ref().and_then(|usage| {
            let mut cache = serde_json::Map::new();
            if let Some(read) = usage.cache_read_input_tokens {
                cache.insert("cache_read_input_tokens".into(), json!(read));
            }
            if let Some(created) = usage.cache_creation_input_tokens {
                cache.insert("cache_creation_input_tokens".into(), json!(created));
            }
            (!cache.is_empty()).then_some(Value::Object(cache))
        });
        events.push(IngestionEvent::generation(
            ObservationBody {
                id: generation.id.clone(),
                trace_id: trace.id.clone(),
                parent_observation_id: Some(agent.id.clone()),
                name: generation.name.clone(),
                start_time: time(generation.start_time),
                end_time: time(generation.end_time),
                input: generation.input.as_ref().map(|text| json!(text)),
                output: Some(json!(generation.output)),
                metadata,
                model: generation.model.clone(),
                usage: generation
                    .usage
                    .as_ref()
                    .map(|u| UsageBody::tokens(u.input, u.output, u.total)),
                ..Default::default()
            },
            at,
        ));

        for tool in &generation.tools {
            events.push(IngestionEvent::span(
                ObservationBody {
                    id: tool.id.clone(),
                    trace_id: trace.id.clone(),
                    parent_observation_id: Some(generation.id.clone()),
                    name: tool.name.clone(),
                    start_time: time(tool.start_time),
                    end_time: time(tool.end_time),
                    input: Some(tool.input.clone()),
                    output: tool.output.clone(),
                    metadata: Some(json!({
                        "observation_type": "tool",
                        "tool_use_id": tool.tool_use_id,
                    })),
                    level: Some(match tool.level {
                        SpanLevel::Default => ObservationLevel::Default,
                        SpanLevel::Error => ObservationLevel::Error,
                    }),
                    ..Default::default()
                },
                at,
            ));
        }
    }
    events
}
