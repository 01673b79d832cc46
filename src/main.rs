//! Telegram Scraper CLI - main entry point

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use telegram_scraper::config::{SINGLE_CHANNEL_BATCH_SIZE, SINGLE_CHANNEL_LIMIT};
use telegram_scraper::{commands, metrics, Config, Error};
use tracing::warn;

#[derive(Parser)]
#[command(name = "telegram_scraper")]
#[command(about = "Scrape Telegram channel history into JSON files", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.yml (default: ./config.yml, then ../config.yml)
    #[arg(short, long, env = "SCRAPER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape channels in order, skipping the ones already done
    Scrape {
        /// Channel handles (default: channels from config)
        channels: Vec<String>,

        /// Maximum number of messages per channel
        #[arg(short, long)]
        max_messages: Option<usize>,

        /// Messages per history request
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Output directory for channel files and the checkpoint
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Scrape one channel, always overwriting its output file
    ScrapeOne {
        /// Channel handle
        channel: String,

        /// Maximum number of messages
        #[arg(short, long, default_value_t = SINGLE_CHANNEL_LIMIT)]
        limit: usize,

        /// Messages per history request
        #[arg(short, long, default_value_t = SINGLE_CHANNEL_BATCH_SIZE)]
        batch_size: usize,
    },

    /// Show which channels are done and which are pending
    Status {
        /// Channel handles (default: channels from config)
        channels: Vec<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Scrape { .. } => "scrape",
            Commands::ScrapeOne { .. } => "scrape_one",
            Commands::Status { .. } => "status",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("telegram_scraper=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let config = Config::load(cli.config.as_deref())?;

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(cli.command, config).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    match result {
        Err(Error::Cancelled) => {
            println!("\n✗ Scraping interrupted by user");
            println!("Completed channels are saved in the checkpoint");
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}

async fn execute_command(command: Commands, config: Config) -> telegram_scraper::Result<()> {
    match command {
        Commands::Scrape {
            channels,
            max_messages,
            batch_size,
            data_dir,
        } => {
            let args = commands::ScrapeArgs {
                channels,
                max_messages,
                batch_size,
                data_dir,
            };
            commands::scrape::run(config, args, commands::cancel_on_signal()).await?;
        }
        Commands::ScrapeOne {
            channel,
            limit,
            batch_size,
        } => {
            commands::scrape_one::run(
                &config,
                &channel,
                limit,
                batch_size,
                commands::cancel_on_signal(),
            )
            .await?;
        }
        Commands::Status { channels } => {
            commands::status::run(&config, &channels)?;
        }
    }

    Ok(())
}
