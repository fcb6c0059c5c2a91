//! Runtime configuration for the tracehook binary.
//!
//! Settings come from `~/.config/tracehook/tracehook.toml` (every field is
//! optional) and are then overridden by environment variables, which is how
//! Claude Code hooks are usually configured.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "tracehook.toml";

/// Environment variable names recognized by [`HookConfig::apply_env_overrides`].
pub mod env {
    pub const ENABLED: &str = "TRACE_TO_LANGFUSE";
    pub const DEBUG: &str = "CC_LANGFUSE_DEBUG";
    pub const HOST: &str = "LANGFUSE_HOST";
    pub const BASE_URL: &str = "LANGFUSE_BASE_URL";
    pub const PUBLIC_KEY: &str = "LANGFUSE_PUBLIC_KEY";
    pub const SECRET_KEY: &str = "LANGFUSE_SECRET_KEY";
    pub const STATE_FILE: &str = "TRACEHOOK_STATE_FILE";
    pub const LOG_FILE: &str = "TRACEHOOK_LOG_FILE";
    pub const PROJECTS_DIR: &str = "TRACEHOOK_PROJECTS_DIR";
    pub const CONFIG: &str = "TRACEHOOK_CONFIG";
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration (persisted as `tracehook.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HookConfig {
    /// Tracing is a no-op unless this is set.
    #[serde(default = "default_false")]
    pub enabled: bool,
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default)]
    pub langfuse: LangfuseSettings,
    #[serde(default)]
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LangfuseSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Ingestion events per HTTP request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for LangfuseSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            public_key: String::new(),
            secret_key: String::new(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            batch_size: default_batch_size(),
        }
    }
}

impl LangfuseSettings {
    pub fn has_credentials(&self) -> bool {
        !self.public_key.trim().is_empty() && !self.secret_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathSettings {
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_projects_dir")]
    pub projects_dir: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            log_file: default_log_file(),
            projects_dir: default_projects_dir(),
        }
    }
}

impl PathSettings {
    pub fn state_file(&self) -> PathBuf {
        expand_path(&self.state_file)
    }

    pub fn log_file(&self) -> PathBuf {
        expand_path(&self.log_file)
    }

    pub fn projects_dir(&self) -> PathBuf {
        expand_path(&self.projects_dir)
    }
}

impl HookConfig {
    /// Overlay environment variables on top of file settings.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`; empty values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env::ENABLED) {
            self.enabled = parse_bool(&v);
        }
        if let Some(v) = get(env::DEBUG) {
            self.debug = parse_bool(&v);
        }
        if let Some(v) = get(env::HOST).or_else(|| get(env::BASE_URL)) {
            self.langfuse.host = v;
        }
        if let Some(v) = get(env::PUBLIC_KEY) {
            self.langfuse.public_key = v;
        }
        if let Some(v) = get(env::SECRET_KEY) {
            self.langfuse.secret_key = v;
        }
        if let Some(v) = get(env::STATE_FILE) {
            self.paths.state_file = v;
        }
        if let Some(v) = get(env::LOG_FILE) {
            self.paths.log_file = v;
        }
        if let Some(v) = get(env::PROJECTS_DIR) {
            self.paths.projects_dir = v;
        }
    }
}

/// Load config from `path`. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<HookConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HookConfig::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Default config location: `~/.config/tracehook/tracehook.toml`.
pub fn default_config_path() -> PathBuf {
    expand_path("~/.config/tracehook").join(CONFIG_FILE_NAME)
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Accepts `true/1/yes/on` (any case) as true.
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_false() -> bool {
    false
}
fn default_host() -> String {
    "https://cloud.langfuse.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> usize {
    3
}
fn default_batch_size() -> usize {
    50
}
fn default_state_file() -> String {
    "~/.claude/state/langfuse_state.json".to_string()
}
fn default_log_file() -> String {
    "~/.claude/state/langfuse_hook.log".to_string()
}
fn default_projects_dir() -> String {
    "~/.claude/projects".to_string()
}
