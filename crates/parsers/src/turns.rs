//! Turn reconstruction.
//!
//! A single left-to-right fold over classified records. A turn opens on a
//! user prompt and closes when the next user prompt arrives (or input ends).
//! Tool-result records and system records never close a turn.

use crate::classify::classify;
use serde_json::Value;
use tracehook_core::{AssistantMessage, ClassifiedMessage, Turn, UserMessage};

/// Complete turns found in a batch of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnBatch {
    pub turns: Vec<Turn>,
    /// Number of leading input records folded into `turns`. Records at
    /// `consumed..` belong to no emitted turn and must be re-read next run.
    pub consumed: usize,
}

/// Classify and fold a batch of raw records into turns.
pub fn build_turns(records: &[Value]) -> TurnBatch {
    let mut builder = TurnBuilder::new();
    for record in records {
        builder.push(classify(record));
    }
    builder.finish()
}

/// Groups the streamed parts of one assistant response.
///
/// Claude Code writes one transcript record per content block of a response,
/// all sharing `message.id`. Parts are buffered until a record with a
/// different id shows up.
#[derive(Debug, Default)]
struct AssistantAccumulator {
    parts: Vec<AssistantMessage>,
    merge_key: Option<String>,
}

impl AssistantAccumulator {
    fn push(&mut self, message: AssistantMessage, out: &mut Vec<AssistantMessage>) {
        if let Some(key) = message.id.as_deref() {
            if self.merge_key.as_deref() != Some(key) {
                self.flush_into(out);
                self.merge_key = Some(key.to_string());
            }
        }
        self.parts.push(message);
    }

    fn flush_into(&mut self, out: &mut Vec<AssistantMessage>) {
        self.merge_key = None;
        if let Some(merged) = merge_parts(std::mem::take(&mut self.parts)) {
            out.push(merged);
        }
    }

    fn clear(&mut self) {
        self.parts.clear();
        self.merge_key = None;
    }
}

/// Concatenate response parts into one message. Model, id and timestamp come
/// from the first part; usage from the last part that reports it at the end,
/// falling back to the first.
pub fn merge_parts(parts: Vec<AssistantMessage>) -> Option<AssistantMessage> {
    let mut parts = parts.into_iter();
    let mut merged = parts.next()?;
    let first_usage = merged.usage.take();
    let mut last_usage = None;
    let mut has_more = false;

    for part in parts {
        has_more = true;
        last_usage = part.usage;
        merged.content.extend(part.content);
    }

    merged.usage = if has_more {
        last_usage.or(first_usage)
    } else {
        first_usage
    };
    Some(merged)
}

/// Incremental form of [`build_turns`].
#[derive(Debug, Default)]
pub struct TurnBuilder {
    turns: Vec<Turn>,
    position: usize,
    current_user: Option<UserMessage>,
    current_assistants: Vec<AssistantMessage>,
    accumulator: AssistantAccumulator,
    current_tool_results: Vec<UserMessage>,
    pending_duration_ms: Option<u64>,
    last_complete_turn_end: usize,
}

impl TurnBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next record. `None` (a discarded record) still occupies a
    /// position in the input sequence.
    pub fn push(&mut self, message: Option<ClassifiedMessage>) {
        let index = self.position;
        self.position += 1;

        match message {
            None => {}
            Some(ClassifiedMessage::System(system)) => {
                if system.is_turn_duration() {
                    if let Some(ms) = system.duration_ms {
                        self.pending_duration_ms = Some(ms);
                    }
                }
            }
            Some(ClassifiedMessage::User(user)) if user.is_tool_result_carrier() => {
                self.current_tool_results.push(user);
            }
            Some(ClassifiedMessage::User(user)) => {
                self.finalize(index);
                self.reset();
                self.current_user = Some(user);
            }
            Some(ClassifiedMessage::Assistant(assistant)) => {
                self.accumulator
                    .push(assistant, &mut self.current_assistants);
            }
        }
    }

    /// Close the trailing turn and return everything emitted.
    pub fn finish(mut self) -> TurnBatch {
        self.finalize(self.position);
        TurnBatch {
            turns: self.turns,
            consumed: self.last_complete_turn_end,
        }
    }

    fn finalize(&mut self, boundary: usize) {
        self.accumulator.flush_into(&mut self.current_assistants);
        if self.current_assistants.is_empty() {
            return;
        }
        let Some(user) = self.current_user.take() else {
            return;
        };
        self.turns.push(Turn {
            user,
            assistants: std::mem::take(&mut self.current_assistants),
            tool_results: std::mem::take(&mut self.current_tool_results),
            duration_ms: self.pending_duration_ms.take(),
        });
        self.last_complete_turn_end = boundary;
    }

    fn reset(&mut self) {
        self.current_user = None;
        self.current_assistants.clear();
        self.accumulator.clear();
        self.current_tool_results.clear();
        self.pending_duration_ms = None;
    }
}
