use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Hooks must keep stdout clean, so output goes
/// to `log_file` (appended, no ANSI) or to stderr when it cannot be opened.
pub fn init(log_file: &Path, debug: bool) {
    let default_directive = if debug { "tracehook=debug" } else { "tracehook=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // Reported once a subscriber exists; opening the file decides the outcome.
    let dir_error = log_file
        .parent()
        .and_then(|parent| std::fs::create_dir_all(parent).err());
    match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
            if let Some(e) = dir_error {
                tracing::debug!("Creating log directory failed: {}", e);
            }
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            match dir_error {
                Some(dir_err) => tracing::warn!(
                    "Cannot open log file {}: {} (creating log directory failed: {})",
                    log_file.display(),
                    e,
                    dir_err
                ),
                None => tracing::warn!("Cannot open log file {}: {}", log_file.display(), e),
            }
        }
    }
}
