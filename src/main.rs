use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use equisync::app;
use equisync::clock::{Clock, SystemClock};
use equisync::config::{default_config_path, ResolvedConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")");

#[derive(Parser)]
#[command(name = "equisync")]
#[command(about = "Reconcile exchange account equity and publish it to a remote table")]
#[command(version = VERSION)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Client to process instead of `active_client`
    #[arg(long)]
    client: Option<String>,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate all accounts, write the backup and sync the remote table
    Run {
        /// Sync into an in-memory table instead of the remote one
        #[arg(long)]
        dry_run: bool,

        /// Only write the backup
        #[arg(long, conflicts_with = "dry_run")]
        no_sync: bool,
    },
    /// Aggregate all accounts and print the projected rows
    Rows,
    /// Show the resolved configuration
    Config,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = ResolvedConfig::load_for_client(&cli.config, cli.client.as_deref())
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&app::config_output(&config))?);
        }
        Command::Rows => {
            let aggregator = app::build_aggregator(&config, clock.clone());
            let (_, rows) = app::collect_rows(&config, &aggregator, clock.as_ref()).await;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::Run { dry_run, no_sync } => {
            let target = if no_sync {
                app::SyncTarget::Skip
            } else if dry_run {
                app::SyncTarget::DryRun
            } else {
                app::SyncTarget::Remote
            };
            let aggregator = app::build_aggregator(&config, clock.clone());
            let output = app::run(&config, &aggregator, clock, target).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
