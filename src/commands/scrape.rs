//! Multi-channel scrape with checkpointing.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{normalize_channels, Config, CHECKPOINT_FILE_NAME};
use crate::error::Result;
use crate::history::GrammersBackend;
use crate::scrape::{ChannelWriter, CheckpointStore, Orchestrator, RunSummary};
use crate::session::{get_client, SessionLock};

/// Command line overrides for a scrape run.
#[derive(Debug, Clone, Default)]
pub struct ScrapeArgs {
    /// Replaces the configured channel list when not empty.
    pub channels: Vec<String>,
    pub max_messages: Option<usize>,
    pub batch_size: Option<usize>,
    pub data_dir: Option<PathBuf>,
}

impl ScrapeArgs {
    /// Merge the overrides into `config`.
    pub fn apply(&self, mut config: Config) -> Result<Config> {
        if !self.channels.is_empty() {
            config.channels = normalize_channels(&self.channels);
        }
        if let Some(max_messages) = self.max_messages {
            config.max_messages = max_messages;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(data_dir) = &self.data_dir {
            // A checkpoint living in the old data dir follows it.
            if config.checkpoint_file == config.data_dir.join(CHECKPOINT_FILE_NAME) {
                config.checkpoint_file = data_dir.join(CHECKPOINT_FILE_NAME);
            }
            config.data_dir = data_dir.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

pub async fn run(config: Config, args: ScrapeArgs, cancel: CancellationToken) -> Result<RunSummary> {
    let config = args.apply(config)?;

    info!("Channels to scrape: {}", config.channels.join(", "));

    let _lock = SessionLock::acquire(config.lock_file())?;
    let client = get_client(&config).await?;

    let orchestrator = Orchestrator::new(
        GrammersBackend::new(client),
        ChannelWriter::new(&config.data_dir),
        CheckpointStore::new(&config.checkpoint_file),
        config.fetch_settings(),
    );

    let summary = orchestrator.run(&config.channels, &cancel).await?;
    print_summary(&summary, &config);

    Ok(summary)
}

fn print_summary(summary: &RunSummary, config: &Config) {
    println!("\n{}", "=".repeat(60));
    if summary.scraped.is_empty() {
        println!("All channels have been scraped!");
    } else {
        println!("SCRAPING COMPLETE");
    }
    for scraped in &summary.scraped {
        println!(
            "  ✓ {}: {} messages -> {}",
            scraped.channel,
            scraped.messages,
            scraped.path.display()
        );
    }
    for (channel, reason) in &summary.skipped {
        println!("  ⊘ {} skipped ({})", channel, reason);
    }
    println!(
        "Total messages scraped this session: {}",
        summary.total_messages()
    );
    println!("Files saved to: {}", config.data_dir.display());
    println!("{}", "=".repeat(60));
}
