//! Scrape a single channel.
//!
//! Usage: scrape_channel <channel> [limit]

use clap::Parser;
use telegram_scraper::commands::{cancel_on_signal, scrape_one};
use telegram_scraper::config::{SINGLE_CHANNEL_BATCH_SIZE, SINGLE_CHANNEL_LIMIT};
use telegram_scraper::{Config, Error};

#[derive(Parser)]
#[command(name = "scrape_channel")]
#[command(about = "Scrape one Telegram channel into <data_dir>/<channel>.json")]
struct Args {
    /// Channel handle
    channel: String,

    /// Message limit
    #[arg(default_value_t = SINGLE_CHANNEL_LIMIT)]
    limit: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::load(None)?;

    let result = scrape_one::run(
        &config,
        &args.channel,
        args.limit,
        SINGLE_CHANNEL_BATCH_SIZE,
        cancel_on_signal(),
    )
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(Error::Cancelled) => {
            println!("\n✗ Scraping interrupted by user");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
