//! Incremental transcript reading.
//!
//! Transcripts are append-only JSONL. Each run only looks at the lines after
//! the session's persisted cursor. Lines that are blank or fail to parse are
//! dropped, so the surviving records keep a parallel list of their 1-based
//! source line numbers to map a consumed record count back onto the file.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parsed records found after a cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptSlice {
    pub records: Vec<Value>,
    /// `line_numbers[i]` is the 1-based line that produced `records[i]`.
    pub line_numbers: Vec<usize>,
}

impl TranscriptSlice {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// New cursor after the first `consumed` records were folded into turns.
    /// Unchanged when nothing was consumed.
    pub fn cursor_after(&self, consumed: usize, previous: usize) -> usize {
        match consumed.checked_sub(1) {
            Some(last) => self.line_numbers.get(last).copied().unwrap_or(previous),
            None => previous,
        }
    }
}

/// Read every parseable record after line `last_line`.
///
/// Returns `Ok(None)` when there are no lines past the cursor or none of them
/// parse, so callers leave the cursor untouched.
pub fn read_since(path: &Path, last_line: usize) -> Result<Option<TranscriptSlice>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Cannot open transcript {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut slice = TranscriptSlice::default();
    let mut seen_new = 0usize;

    // Split on raw bytes so an invalid UTF-8 line cannot shift numbering.
    for (index, line_result) in reader.split(b'\n').enumerate() {
        let line_number = index + 1;
        let bytes = line_result
            .with_context(|| format!("Error reading {} at line {}", path.display(), line_number))?;
        if line_number <= last_line {
            continue;
        }
        seen_new += 1;

        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes.as_slice());
        if bytes.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(record) => {
                slice.records.push(record);
                slice.line_numbers.push(line_number);
            }
            Err(e) => {
                tracing::debug!("Skipping unparseable line {} of {}: {}", line_number, path.display(), e);
            }
        }
    }

    if seen_new == 0 {
        tracing::debug!("No new lines in {} after line {}", path.display(), last_line);
        return Ok(None);
    }
    if slice.is_empty() {
        tracing::debug!("{} new lines in {}, none parseable", seen_new, path.display());
        return Ok(None);
    }
    Ok(Some(slice))
}
