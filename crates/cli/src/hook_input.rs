//! Working out which transcript this invocation is about.

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use tracehook_exporter::HookTarget;
use tracehook_parsers::discover::{latest_transcript, session_id_from_path};
use tracehook_runtime_config::expand_path;

/// The JSON object Claude Code writes to a hook's stdin. Other fields are ignored.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct HookPayload {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
}

impl HookPayload {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(raw) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!("Ignoring unparseable hook payload: {}", e);
                None
            }
        }
    }
}

/// Read the hook payload from stdin unless stdin is an interactive terminal.
pub fn read_stdin_payload() -> Option<HookPayload> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return None;
    }
    let mut raw = String::new();
    if let Err(e) = stdin.read_to_string(&mut raw) {
        debug!("Could not read hook payload from stdin: {}", e);
        return None;
    }
    HookPayload::parse(&raw)
}

/// Resolve the target, field by field: explicit flag, then hook payload, then
/// the most recently modified transcript under `projects_dir`.
pub fn resolve_target(
    session_id: Option<String>,
    transcript: Option<PathBuf>,
    payload: Option<HookPayload>,
    projects_dir: &Path,
) -> Option<HookTarget> {
    let payload = payload.unwrap_or_default();
    let transcript = transcript
        .or_else(|| payload.transcript_path.as_deref().map(expand_path))
        .or_else(|| latest_transcript(projects_dir))?;

    if !transcript.is_file() {
        warn!("Transcript {} does not exist", transcript.display());
        return None;
    }

    let session_id = session_id
        .or(payload.session_id)
        .filter(|id| !id.trim().is_empty())
        .or_else(|| session_id_from_path(&transcript))?;

    Some(HookTarget {
        session_id,
        transcript,
    })
}
