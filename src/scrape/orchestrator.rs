//! Sequential multi-channel scrape with checkpointing.

use std::fmt;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::history::HistoryBackend;
use crate::metrics;
use crate::scrape::checkpoint::{CheckpointState, CheckpointStore};
use crate::scrape::fetcher::{fetch_channel, FetchSettings};
use crate::scrape::writer::{validate_handle, ChannelWriter};

/// Why a channel counts as already scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    Checkpoint,
    OutputExists,
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoneReason::Checkpoint => write!(f, "in checkpoint"),
            DoneReason::OutputExists => write!(f, "output file exists"),
        }
    }
}

/// A channel is done if it is checkpointed or its output file exists.
pub fn done_reason(
    state: &CheckpointState,
    writer: &ChannelWriter,
    channel: &str,
) -> Option<DoneReason> {
    if state.is_completed(channel) {
        Some(DoneReason::Checkpoint)
    } else if writer.exists(channel) {
        Some(DoneReason::OutputExists)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedChannel {
    pub channel: String,
    pub messages: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scraped: Vec<ScrapedChannel>,
    pub skipped: Vec<(String, DoneReason)>,
}

impl RunSummary {
    pub fn total_messages(&self) -> usize {
        self.scraped.iter().map(|c| c.messages).sum()
    }
}

/// Owns the backend session for the whole run and drives channels one by one.
pub struct Orchestrator<B: HistoryBackend> {
    backend: B,
    writer: ChannelWriter,
    checkpoints: CheckpointStore,
    settings: FetchSettings,
}

impl<B: HistoryBackend> Orchestrator<B> {
    pub fn new(
        backend: B,
        writer: ChannelWriter,
        checkpoints: CheckpointStore,
        settings: FetchSettings,
    ) -> Self {
        Self {
            backend,
            writer,
            checkpoints,
            settings,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Scrape every channel that is not done yet, strictly in order.
    ///
    /// The first fatal error aborts the remaining channels; the checkpoint
    /// keeps every channel finished before it.
    pub async fn run(&self, channels: &[String], cancel: &CancellationToken) -> Result<RunSummary> {
        for channel in channels {
            validate_handle(channel)?;
        }

        let mut state = self.checkpoints.load();
        info!(
            "Previously completed channels: {:?}",
            state.completed_channels()
        );

        let mut summary = RunSummary::default();

        for channel in channels {
            if let Some(reason) = done_reason(&state, &self.writer, channel) {
                info!(channel = %channel, "Skipping (already scraped: {})", reason);
                metrics::record_channel(channel, "skipped");
                summary.skipped.push((channel.clone(), reason));
                continue;
            }

            info!(channel = %channel, "Starting scrape");
            match self.scrape_channel(channel, &mut state, cancel).await {
                Ok(scraped) => {
                    metrics::record_channel(channel, "completed");
                    summary.scraped.push(scraped);
                }
                Err(err) => {
                    let status = if matches!(err, Error::Cancelled) {
                        "cancelled"
                    } else {
                        "failed"
                    };
                    metrics::record_channel(channel, status);
                    error!(channel = %channel, "Aborting run: {}", err);
                    return Err(err);
                }
            }
        }

        info!(
            scraped = summary.scraped.len(),
            skipped = summary.skipped.len(),
            "Total messages scraped this session: {}",
            summary.total_messages()
        );
        Ok(summary)
    }

    async fn scrape_channel(
        &self,
        channel: &str,
        state: &mut CheckpointState,
        cancel: &CancellationToken,
    ) -> Result<ScrapedChannel> {
        let outcome = fetch_channel(&self.backend, channel, &self.settings, cancel).await?;
        let path = self.writer.write(channel, &outcome.records)?;

        state.mark_completed(channel);
        self.checkpoints.save(state)?;
        info!(channel, "Checkpoint saved: marked as complete");

        Ok(ScrapedChannel {
            channel: channel.to_string(),
            messages: outcome.records.len(),
            path,
        })
    }
}
