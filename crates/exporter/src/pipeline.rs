//! Per-session export: read past the cursor, build turns, submit, advance.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use tracehook_core::StateStore;
use tracehook_parsers::{build_turns, read_since};

use crate::projector::project_turn;
use crate::recovery::recover_predecessor;
use crate::sink::TraceSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Write the cursor file after each session. Off for dry runs.
    pub persist_state: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            persist_state: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: String,
    pub new_turns: usize,
    pub last_line: usize,
    pub turn_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub recovered: Option<SessionOutcome>,
    pub current: SessionOutcome,
}

/// Export the unprocessed tail of one session's transcript.
///
/// The cursor only moves after every turn was submitted and the sink flushed.
/// On a submission failure what was already submitted is flushed and the
/// error returned with the cursor untouched.
pub async fn process_session<S: TraceSink>(
    session_id: &str,
    transcript: &Path,
    store: &mut StateStore,
    sink: &mut S,
    options: ExportOptions,
    now: DateTime<Utc>,
) -> Result<SessionOutcome> {
    let last_line = store.last_line(session_id);
    let turn_count = store.turn_count(session_id);
    let unchanged = SessionOutcome {
        session_id: session_id.to_string(),
        new_turns: 0,
        last_line,
        turn_count,
    };

    let Some(slice) = read_since(transcript, last_line)? else {
        debug!("Session {}: nothing new after line {}", session_id, last_line);
        return Ok(unchanged);
    };

    let batch = build_turns(&slice.records);
    if batch.turns.is_empty() {
        debug!(
            "Session {}: {} new records, no complete turn yet",
            session_id,
            slice.len()
        );
        return Ok(unchanged);
    }

    for (index, turn) in batch.turns.iter().enumerate() {
        let metadata = if index == 0 {
            turn.user.metadata.as_ref()
        } else {
            None
        };
        let tree = project_turn(turn, session_id, turn_count + index + 1, metadata, now);
        if let Err(e) = sink.submit(tree).await {
            if let Err(flush_err) = sink.flush().await {
                warn!("Flush after failed submission also failed: {:#}", flush_err);
            }
            return Err(e).with_context(|| {
                format!("Failed to submit turn {} of session {}", turn_count + index + 1, session_id)
            });
        }
    }
    sink.flush()
        .await
        .with_context(|| format!("Failed to flush traces for session {session_id}"))?;

    let new_last_line = slice.cursor_after(batch.consumed, last_line);
    let state = store.advance(session_id, new_last_line, batch.turns.len(), now);
    let outcome = SessionOutcome {
        session_id: session_id.to_string(),
        new_turns: batch.turns.len(),
        last_line: state.last_line,
        turn_count: state.turn_count,
    };
    if options.persist_state {
        store.save().with_context(|| {
            format!("Failed to save cursor state to {}", store.path().display())
        })?;
    }

    info!(
        "Session {}: exported {} turns (cursor {} → {})",
        session_id, outcome.new_turns, last_line, outcome.last_line
    );
    Ok(outcome)
}

/// Recover an orphaned predecessor if there is one, then export the session.
pub async fn export<S: TraceSink>(
    target: &HookTarget,
    store: &mut StateStore,
    sink: &mut S,
    options: ExportOptions,
    now: DateTime<Utc>,
) -> Result<ExportSummary> {
    let (session_id, transcript) = (target.session_id.as_str(), target.transcript.as_path());
    let recovered = recover_predecessor(session_id, transcript, store, sink, options, now).await;
    let current = process_session(session_id, transcript, store, sink, options, now).await?;
    Ok(ExportSummary { recovered, current })
}

/// Transcript location and session identity for one hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookTarget {
    pub session_id: String,
    pub transcript: PathBuf,
}
