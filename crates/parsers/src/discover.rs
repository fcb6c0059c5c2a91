//! Locating Claude Code transcripts on disk.
//!
//! Claude Code stores one transcript per session under
//! `~/.claude/projects/<project-dir>/<session-id>.jsonl`. Subagent transcripts
//! live beside them (or under `subagents/`) and are never traced on their own.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Session id implied by a transcript's file name.
pub fn session_id_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Transcript path for `session_id` in the same project directory as `path`.
pub fn sibling_transcript(path: &Path, session_id: &str) -> PathBuf {
    path.with_file_name(format!("{session_id}.jsonl"))
}

pub fn is_subagent_path(path: &Path) -> bool {
    let path_text = path.to_string_lossy();
    if path_text.contains("/subagents/") || path_text.contains("\\subagents\\") {
        return true;
    }

    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_ascii_lowercase();
    lower.starts_with("agent-")
        || lower.starts_with("agent_")
        || lower.starts_with("subagent-")
        || lower.starts_with("subagent_")
}

/// `sessionId` recorded on the first line of a transcript.
///
/// Only the first line is read. Returns `Ok(None)` when the file is empty,
/// the line is not JSON, or it has no string `sessionId`.
pub fn first_line_session_id(path: &Path) -> Result<Option<String>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Cannot open transcript {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut first = Vec::new();
    reader
        .read_until(b'\n', &mut first)
        .with_context(|| format!("Cannot read first line of {}", path.display()))?;

    let session_id = serde_json::from_slice::<Value>(&first)
        .ok()
        .and_then(|record| {
            record
                .get("sessionId")
                .and_then(Value::as_str)
                .map(str::to_string)
        });
    Ok(session_id)
}

/// Most recently modified top-level transcript under `projects_dir`.
pub fn latest_transcript(projects_dir: &Path) -> Option<PathBuf> {
    let pattern = format!("{}/*/*.jsonl", projects_dir.display());
    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::warn!("Invalid transcript pattern {}: {}", pattern, e);
            return None;
        }
    };

    let mut best: Option<(PathBuf, SystemTime)> = None;
    for path in paths.filter_map(Result::ok) {
        if is_subagent_path(&path) {
            continue;
        }
        let Ok(modified) = path.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if best.as_ref().is_none_or(|(_, t)| modified > *t) {
            best = Some((path, modified));
        }
    }
    best.map(|(path, _)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_session_id_from_path() {
        assert_eq!(
            session_id_from_path(Path::new("/p/-repo/3f2a.jsonl")).as_deref(),
            Some("3f2a")
        );
    }

    #[test]
    fn test_sibling_transcript() {
        let path = Path::new("/home/u/.claude/projects/-repo/current.jsonl");
        assert_eq!(
            sibling_transcript(path, "previous"),
            PathBuf::from("/home/u/.claude/projects/-repo/previous.jsonl")
        );
    }

    #[test]
    fn test_subagent_paths() {
        assert!(is_subagent_path(Path::new("/p/x/subagents/agent-1.jsonl")));
        assert!(is_subagent_path(Path::new("/p/x/agent_42.jsonl")));
        assert!(!is_subagent_path(Path::new("/p/x/3f2a.jsonl")));
    }

    #[test]
    fn test_first_line_session_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        fs::write(
            &path,
            "{\"type\":\"summary\",\"sessionId\":\"prev\"}\n{\"sessionId\":\"cur\"}\n",
        )
        .unwrap();
        assert_eq!(first_line_session_id(&path).unwrap().as_deref(), Some("prev"));

        fs::write(&path, "garbage\n{\"sessionId\":\"cur\"}\n").unwrap();
        assert_eq!(first_line_session_id(&path).unwrap(), None);

        fs::write(&path, "").unwrap();
        assert_eq!(first_line_session_id(&path).unwrap(), None);
    }

    #[test]
    fn test_latest_transcript_skips_subagents() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("-repo");
        fs::create_dir_all(&project).unwrap();

        let older = project.join("older.jsonl");
        fs::write(&older, "{}\n").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        let newer = project.join("newer.jsonl");
        fs::write(&newer, "{}\n").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        fs::write(project.join("agent-1.jsonl"), "{}\n").unwrap();

        assert_eq!(latest_transcript(dir.path()), Some(newer));
    }

    #[test]
    fn test_latest_transcript_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(latest_transcript(dir.path()), None);
    }
}
