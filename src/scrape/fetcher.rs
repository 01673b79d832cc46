//! Paginated history retrieval for a single channel.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::history::HistoryBackend;
use crate::metrics;
use crate::scrape::record::MessageRecord;

/// How failed page requests are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for the doubled delay.
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): doubles, then caps.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether the `attempt`-th consecutive failure may still be retried.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_retries.map_or(true, |max| attempt <= max)
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub max_messages: usize,
    pub batch_size: usize,
    /// Pause between successful page requests.
    pub request_delay: Duration,
    pub retry: RetryPolicy,
}

/// Everything collected for one channel.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub title: String,
    /// Newest first, at most `max_messages` long.
    pub records: Vec<MessageRecord>,
    pub pages: usize,
    pub retries: u32,
}

/// Page backwards through a channel's history until it is exhausted or
/// `max_messages` text records have been collected.
///
/// Page errors are retried on the same cursor according to the retry
/// policy. Cancellation is honored between pages and during every pause;
/// partial results are dropped.
pub async fn fetch_channel<B: HistoryBackend>(
    backend: &B,
    handle: &str,
    settings: &FetchSettings,
    cancel: &CancellationToken,
) -> Result<FetchOutcome> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let channel = backend.resolve(handle).await?;
    info!(channel = handle, title = %channel.title, "Found channel");
    info!(
        channel = handle,
        max_messages = settings.max_messages,
        batch_size = settings.batch_size,
        "Starting message collection"
    );

    let mut records: Vec<MessageRecord> = Vec::new();
    let mut offset_id = 0;
    let mut pages = 0;
    let mut retries = 0;
    let mut failures = 0;

    while records.len() < settings.max_messages {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let request = backend.fetch_page(&channel.peer, offset_id, settings.batch_size);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = request => response,
        };

        let page = match response {
            Ok(page) => {
                failures = 0;
                page
            }
            Err(err) => {
                failures += 1;
                metrics::record_fetch_error(handle);

                if !settings.retry.allows(failures) {
                    return Err(Error::RetriesExhausted {
                        channel: handle.to_string(),
                        attempts: failures,
                    });
                }

                retries += 1;
                let delay = settings.retry.delay_for(failures);
                warn!(
                    channel = handle,
                    offset_id,
                    attempt = failures,
                    delay_secs = delay.as_secs_f64(),
                    "Error fetching batch: {}",
                    err
                );
                pause(delay, cancel).await?;
                continue;
            }
        };

        // The cursor follows the raw page so media-only pages still advance it.
        let Some(oldest_id) = page.last().map(|m| m.id) else {
            info!(channel = handle, "No more messages to fetch (reached end of channel)");
            break;
        };

        // A page that is not older than the cursor would repeat records.
        if offset_id != 0 && oldest_id >= offset_id {
            warn!(
                channel = handle,
                offset_id, oldest_id, "History cursor did not move backwards; stopping"
            );
            break;
        }

        let before = records.len();
        records.extend(page.iter().filter_map(MessageRecord::from_raw));
        pages += 1;

        let added = records.len() - before;
        metrics::record_page(handle, added);
        info!(
            channel = handle,
            "Batch {}: +{} messages (Total: {}/{})",
            pages,
            added,
            records.len().min(settings.max_messages),
            settings.max_messages
        );

        if records.len() >= settings.max_messages {
            records.truncate(settings.max_messages);
            info!(
                channel = handle,
                "Reached max messages limit ({}). Stopping.", settings.max_messages
            );
            break;
        }

        offset_id = oldest_id;

        pause(settings.request_delay, cancel).await?;
    }

    Ok(FetchOutcome {
        title: channel.title,
        records,
        pages,
        retries,
    })
}

/// Sleep for `delay` unless cancellation arrives first.
async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
