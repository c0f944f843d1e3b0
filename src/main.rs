//! alertline - alert relay for on-call operators
//!
//! Polls the Aurora alert backend, posts new alerts to a Telegram chat with
//! Dismiss/Escalate buttons, rings the operator through Twilio, and relays
//! button presses back to the backend.
//!
//! ## Usage
//!
//! ```bash
//! # Run with ~/.alertline/config.yaml
//! alertline
//!
//! # With an explicit config file and verbose logging
//! alertline --config /etc/alertline.yaml -v
//!
//! # With custom log directory
//! alertline --log-dir /var/log/alertline/
//! ```
//!
//! Secrets are read from the environment variables named in the config
//! (`AURORA_PASSWORD`, `TELEGRAM_BOT_TOKEN`, `TWILIO_AUTH_TOKEN` by default).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use alertline_core::{AlertlineConfig, AlertlineError, LogGuard, init_logging};
use alertline_monitor::AlertMonitor;
use alertline_notify::{TelegramChannel, TwilioCaller};
use alertline_source::AuroraClient;

/// Alert relay between the Aurora backend, Telegram and Twilio
#[derive(Parser, Debug)]
#[command(name = "alertline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.alertline/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.alertline/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = e.guidance() {
                eprintln!("{}", hint);
            }
            return ExitCode::from(1);
        }
    };

    let _guard = match setup_logging(&cli, &config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    info!("Starting alertline");

    match run_monitor(config).await {
        Ok(()) => {
            info!("alertline exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("alertline error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Load the config from `--config` or the default location.
fn load_config(cli: &Cli) -> alertline_core::Result<AlertlineConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => AlertlineConfig::default_path()?,
    };
    AlertlineConfig::load(&path)
}

/// Set up logging; CLI flags take precedence over the config file.
fn setup_logging(cli: &Cli, config: &AlertlineConfig) -> alertline_core::Result<LogGuard> {
    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| config.logging.directory.clone());
    let verbose = cli.verbose > 0 || config.logging.verbose;
    init_logging(log_dir, verbose)
}

/// Build the collaborators from config and run the polling loop.
async fn run_monitor(config: AlertlineConfig) -> anyhow::Result<()> {
    let source = AuroraClient::from_config(config.aurora.clone())
        .map_err(with_guidance)
        .context("failed to create Aurora client")?;
    let channel = TelegramChannel::from_config(config.telegram.clone())
        .map_err(with_guidance)
        .context("failed to create Telegram channel")?;
    let voice = TwilioCaller::from_config(config.twilio.clone())
        .map_err(with_guidance)
        .context("failed to create Twilio caller")?;
    let voice_message = voice.default_message().to_string();

    let mut monitor = AlertMonitor::new(
        Arc::new(source),
        Arc::new(channel),
        Arc::new(voice),
        config.schedule,
    )
    .with_voice_message(voice_message);

    monitor.run().await.map_err(with_guidance)
}

/// Attach the operator hint, if any, to an error.
fn with_guidance(e: AlertlineError) -> anyhow::Error {
    match e.guidance() {
        Some(hint) => anyhow::Error::new(e).context(hint),
        None => anyhow::Error::new(e),
    }
}
