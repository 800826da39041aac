use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refseq_loader::{
    config::Config,
    errors::LoadResult,
    loader::{LoadController, LoadSummary, TracingReportSink},
    models::LoadMode,
};

#[derive(Parser)]
#[command(name = "refseq-loader")]
#[command(version = "0.1.0")]
#[command(about = "Load GenBank/RefSeq sequence records into a sequence store")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// GenBank input file (overrides config file)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Load mode: incremental_initial, incremental or delete_reload
    #[arg(short, long, value_name = "MODE")]
    mode: Option<LoadMode>,

    /// Sequence database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Write the run summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    summary_json: Option<PathBuf>,
}

async fn run_load(config: &Config) -> LoadResult<LoadSummary> {
    let mut controller = LoadController::initialize(config, Box::new(TracingReportSink)).await?;
    controller.run().await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("refseq_loader={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RefSeq loader v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(input) = cli.input {
        config.input.path = input;
    }
    if let Some(mode) = cli.mode {
        config.load.mode = mode;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    info!("Using database: {}", config.database.url);

    match run_load(&config).await {
        Ok(summary) => {
            if let Some(path) = cli.summary_json {
                std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
                info!("Run summary written to {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            error!("Sequence loader failed: {}", e);
            eprintln!("Sequence loader failed: {}", e);
            std::process::exit(1);
        }
    }
}
