mod hook_input;
mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};

use tracehook_api_client::{LangfuseClient, RetryConfig};
use tracehook_core::StateStore;
use tracehook_exporter::{
    ExportOptions, ExportSummary, HookTarget, JsonLinesSink, LangfuseSink, export,
};
use tracehook_runtime_config::{HookConfig, default_config_path, env, load_config};

#[derive(Parser)]
#[command(
    name = "tracehook",
    version,
    about = "Export Claude Code conversation turns to Langfuse (run as a Stop hook)"
)]
struct Cli {
    /// Session id (defaults to the hook payload, then the transcript file name)
    #[arg(long)]
    session_id: Option<String>,

    /// Transcript JSONL file (defaults to the hook payload, then the newest transcript)
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Config file (default: ~/.config/tracehook/tracehook.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print trace trees as JSON lines instead of sending them; keeps the cursor
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("tracehook failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os(env::CONFIG).map(PathBuf::from))
        .unwrap_or_else(default_config_path);

    // Logging depends on the config, so a broken config file is reported
    // after the subscriber is up.
    let (mut config, load_error) = match load_config(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (HookConfig::default(), Some(e)),
    };
    config.apply_env_overrides(|key| std::env::var(key).ok());
    logging::init(&config.paths.log_file(), config.debug);
    if let Some(e) = load_error {
        return Err(e.into());
    }

    if !cli.dry_run {
        if !config.enabled {
            info!("Tracing disabled; set {}=true to enable", env::ENABLED);
            return Ok(());
        }
        if !config.langfuse.has_credentials() {
            warn!(
                "Tracing enabled but {} / {} are not set; nothing exported",
                env::PUBLIC_KEY,
                env::SECRET_KEY
            );
            return Ok(());
        }
    }

    let payload = if cli.session_id.is_some() && cli.transcript.is_some() {
        None
    } else {
        hook_input::read_stdin_payload()
    };
    let Some(target) = hook_input::resolve_target(
        cli.session_id,
        cli.transcript,
        payload,
        &config.paths.projects_dir(),
    ) else {
        info!("No transcript to process");
        return Ok(());
    };
    info!(
        "Processing session {} ({})",
        target.session_id,
        target.transcript.display()
    );

    let summary = if cli.dry_run {
        run_dry(&target, &config).await?
    } else {
        run_langfuse(&target, &config).await?
    };

    if let Some(recovered) = &summary.recovered {
        info!(
            "Recovered {} turns from predecessor session {}",
            recovered.new_turns, recovered.session_id
        );
    }
    info!(
        "Done: {} new turns for session {} ({} total)",
        summary.current.new_turns, summary.current.session_id, summary.current.turn_count
    );
    Ok(())
}

async fn run_dry(target: &HookTarget, config: &HookConfig) -> Result<ExportSummary> {
    let mut store = StateStore::load(config.paths.state_file());
    let mut sink = JsonLinesSink::new(std::io::stdout());
    let options = ExportOptions {
        persist_state: false,
    };
    export(target, &mut store, &mut sink, options, Utc::now()).await
}

async fn run_langfuse(target: &HookTarget, config: &HookConfig) -> Result<ExportSummary> {
    let settings = &config.langfuse;
    let client = LangfuseClient::new(
        &settings.host,
        &settings.public_key,
        &settings.secret_key,
        Duration::from_secs(settings.timeout_secs),
    )
    .context("Failed to build Langfuse client")?
    .with_retry(RetryConfig::with_max_retries(settings.max_retries));

    let mut store = StateStore::load(config.paths.state_file());
    let mut sink = LangfuseSink::new(client, settings.batch_size);
    export(target, &mut store, &mut sink, ExportOptions::default(), Utc::now()).await
}
