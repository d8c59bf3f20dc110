use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use lenscan::capture::Transport;
use lenscan::config::{Settings, DEFAULT_SETTINGS_FILE};
use lenscan::error::PipelineError;
use lenscan::export::{report_filename, write_csv};
use lenscan::{
    validate_start, Command as PipelineCommand, FetchTap, NoopSearcher, Notification,
    PipelineBuilder, ResultsPanel, SerpClient, XhrTap,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Reverse-image-search scanner for captured feed traffic")]
struct Cli {
    /// Path to the settings file.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Replay a capture log through the pipeline and write the CSV report.
    Scan {
        /// Capture log: one JSON object per line with transport, url and body.
        #[arg(long, value_name = "FILE")]
        capture: PathBuf,

        /// API key (overrides the settings file).
        #[arg(long)]
        api_key: Option<String>,

        /// Restrict searches to exact matches.
        #[arg(long)]
        strict: bool,

        /// Output path; defaults to a name derived from the detected username.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Run the pipeline without spending API credits.
        #[arg(long)]
        dry_run: bool,

        /// Give up waiting for results after this many seconds of silence.
        #[arg(long, default_value_t = 30)]
        idle_timeout_secs: u64,
    },
    /// Inspect or update persisted settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the resolved settings.
    Show {
        /// Emit JSON instead of TOML.
        #[arg(long)]
        json: bool,
    },
    /// Update one or both settings.
    Set {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        strict: Option<bool>,
    },
}

/// One line of a capture log.
#[derive(Debug, Deserialize)]
struct CaptureRecord {
    transport: Transport,
    url: String,
    #[serde(default)]
    page_url: Option<String>,
    body: Value,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        CliCommand::Scan {
            capture,
            api_key,
            strict,
            out,
            dry_run,
            idle_timeout_secs,
        } => {
            scan(
                &cli.config,
                capture,
                api_key,
                strict,
                out,
                dry_run,
                idle_timeout_secs,
            )
            .await
        }
        CliCommand::Config { command } => handle_config(&cli.config, command),
    }
}

async fn scan(
    config_path: &PathBuf,
    capture: PathBuf,
    api_key: Option<String>,
    strict: bool,
    out: Option<PathBuf>,
    dry_run: bool,
    idle_timeout_secs: u64,
) -> Result<()> {
    let settings = Settings::load(config_path)?;
    let api_key = api_key.unwrap_or(settings.api_key);
    let strict_mode = strict || settings.strict_mode;
    if !dry_run {
        validate_start(&api_key).map_err(|_| PipelineError::MissingApiKey)?;
    }

    let records = read_capture_log(&capture)?;
    info!(records = records.len(), strict = strict_mode, "replaying capture log");

    let (fetch_handle, fetch_tap) = FetchTap::channel(records.len().max(1));
    let (xhr_handle, xhr_tap) = XhrTap::channel(records.len().max(1));

    let mut builder = PipelineBuilder::new()
        .register_tap(fetch_tap)
        .register_tap(xhr_tap);
    builder = if dry_run {
        builder.with_searcher(Arc::new(NoopSearcher))
    } else {
        builder.with_searcher(Arc::new(SerpClient::new()))
    };
    let mut pipeline = builder.build();
    let mut notifications = pipeline
        .take_notifications()
        .expect("fresh pipeline has a notification stream");
    let relay = pipeline.relay();

    let mut panel = ResultsPanel::new();
    let start = panel
        .start(
            if dry_run { "dry-run" } else { api_key.as_str() },
            strict_mode,
            false,
        )
        .map_err(anyhow::Error::from)?;
    let _ = relay.send(start);

    for record in records {
        let body = record.body.to_string();
        match record.transport {
            Transport::Fetch => fetch_handle.observe(record.url, record.page_url, body),
            Transport::Xhr => xhr_handle.observe(record.url, record.page_url, body),
        }
    }
    drop(fetch_handle);
    drop(xhr_handle);

    let idle = Duration::from_secs(idle_timeout_secs);
    loop {
        match timeout(idle, notifications.next()).await {
            Ok(Some(notification)) => {
                if let Notification::UrlQueued { queue_length } = &notification {
                    debug!(remaining = queue_length, "queue update");
                }
                let done = matches!(notification, Notification::StopComplete);
                if let Some(command) = panel.handle(notification) {
                    let _ = relay.send(command);
                }
                if done {
                    break;
                }
            }
            Ok(None) => break,
            Err(_) => {
                warn!("no pipeline activity within idle window; stopping");
                let _ = relay.send(PipelineCommand::Stop);
                break;
            }
        }
    }

    let out = out.unwrap_or_else(|| PathBuf::from(report_filename(panel.detected_username())));
    write_csv(panel.results(), &out)?;
    info!(
        results = panel.results().len(),
        report = %out.display(),
        "scan complete"
    );

    drop(relay);
    pipeline.join().await;
    Ok(())
}

fn read_capture_log(path: &PathBuf) -> Result<Vec<CaptureRecord>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read capture log {}", path.display()))?;
    let mut records = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: CaptureRecord = serde_json::from_str(line)
            .with_context(|| format!("{}:{} is not a capture record", path.display(), number + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn handle_config(path: &PathBuf, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show { json } => {
            let settings = Settings::load(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                print!("{}", toml::to_string_pretty(&settings)?);
            }
        }
        ConfigCommand::Set { api_key, strict } => {
            let mut settings = Settings::load(path)?;
            if let Some(key) = api_key {
                settings.api_key = key;
            }
            if let Some(strict) = strict {
                settings.strict_mode = strict;
            }
            settings.save(path)?;
            println!("settings written to {}", path.display());
        }
    }
    Ok(())
}
