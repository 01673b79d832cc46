//! Scrape a single channel without touching the checkpoint.
//!
//! The output file is always rewritten, even if it already exists.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::chat::normalize_handle;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::history::{GrammersBackend, HistoryBackend};
use crate::scrape::{fetch_channel, validate_handle, ChannelWriter, FetchSettings};
use crate::session::{get_client, SessionLock};

pub async fn run(
    config: &Config,
    channel: &str,
    limit: usize,
    batch_size: usize,
    cancel: CancellationToken,
) -> Result<PathBuf> {
    if limit == 0 || batch_size == 0 {
        return Err(Error::InvalidArgument(
            "limit and batch size must be greater than zero".to_string(),
        ));
    }
    validate_handle(channel)?;
    let channel = normalize_handle(channel);

    let _lock = SessionLock::acquire(config.lock_file())?;
    let client = get_client(config).await?;
    let backend = GrammersBackend::new(client);

    let settings = config.single_channel_settings(limit, batch_size);
    let writer = ChannelWriter::new(&config.data_dir);

    let (path, count) = scrape_single(&backend, &writer, channel, &settings, &cancel).await?;
    println!("Saved {} messages to {}", count, path.display());
    Ok(path)
}

/// Fetch one channel and write its output file.
pub async fn scrape_single<B: HistoryBackend>(
    backend: &B,
    writer: &ChannelWriter,
    channel: &str,
    settings: &FetchSettings,
    cancel: &CancellationToken,
) -> Result<(PathBuf, usize)> {
    info!(channel, "Connecting to channel");
    let outcome = fetch_channel(backend, channel, settings, cancel).await?;
    let path = writer.write(channel, &outcome.records)?;
    Ok((path, outcome.records.len()))
}
