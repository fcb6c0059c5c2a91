//! Continuity recovery for sessions that were resumed under a new id.
//!
//! When Claude Code continues a conversation it starts a new transcript whose
//! first line still carries the previous session's id. Turns the hook never
//! saw in that previous transcript are exported before the current session.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use tracehook_core::StateStore;
use tracehook_parsers::discover::{first_line_session_id, sibling_transcript};

use crate::pipeline::{ExportOptions, SessionOutcome, process_session};
use crate::sink::TraceSink;

/// Export the unprocessed tail of the predecessor named on `transcript`'s
/// first line. Every failure is logged and swallowed.
pub async fn recover_predecessor<S: TraceSink>(
    session_id: &str,
    transcript: &Path,
    store: &mut StateStore,
    sink: &mut S,
    options: ExportOptions,
    now: DateTime<Utc>,
) -> Option<SessionOutcome> {
    let previous = match first_line_session_id(transcript) {
        Ok(Some(previous)) if previous != session_id => previous,
        Ok(_) => return None,
        Err(e) => {
            warn!("Skipping recovery for {}: {:#}", session_id, e);
            return None;
        }
    };

    let previous_transcript = sibling_transcript(transcript, &previous);
    if same_file(&previous_transcript, transcript) {
        debug!(
            "Session {} names its own transcript {} as predecessor",
            session_id,
            transcript.display()
        );
        return None;
    }
    if !previous_transcript.is_file() {
        debug!(
            "Session {} starts with id {} but {} does not exist",
            session_id,
            previous,
            previous_transcript.display()
        );
        return None;
    }

    info!("Recovering predecessor session {} of {}", previous, session_id);
    match process_session(&previous, &previous_transcript, store, sink, options, now).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("Recovery of session {} failed: {:#}", previous, e);
            None
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
