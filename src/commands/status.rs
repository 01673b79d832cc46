//! Report which channels are done without connecting to Telegram.

use crate::config::{normalize_channels, Config};
use crate::error::Result;
use crate::scrape::{done_reason, ChannelWriter, CheckpointStore, DoneReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: String,
    pub done: Option<DoneReason>,
    /// Record count of the output file, if one can be read.
    pub messages: Option<usize>,
}

/// Inspect the checkpoint and output files for `channels`
/// (the configured list when empty).
pub fn collect(config: &Config, channels: &[String]) -> Vec<ChannelReport> {
    let channels = if channels.is_empty() {
        config.channels.clone()
    } else {
        normalize_channels(channels)
    };

    let state = CheckpointStore::new(&config.checkpoint_file).load();
    let writer = ChannelWriter::new(&config.data_dir);

    channels
        .into_iter()
        .map(|channel| {
            let messages = if writer.exists(&channel) {
                writer.read(&channel).ok().map(|records| records.len())
            } else {
                None
            };
            ChannelReport {
                done: done_reason(&state, &writer, &channel),
                messages,
                channel,
            }
        })
        .collect()
}

pub fn run(config: &Config, channels: &[String]) -> Result<Vec<ChannelReport>> {
    let reports = collect(config, channels);

    println!("Checkpoint: {}", config.checkpoint_file.display());
    for report in &reports {
        let status = match report.done {
            Some(reason) => format!("done ({})", reason),
            None => "pending".to_string(),
        };
        match report.messages {
            Some(count) => println!("  {:<30} {:<28} {} messages", report.channel, status, count),
            None => println!("  {:<30} {}", report.channel, status),
        }
    }

    let pending = reports.iter().filter(|r| r.done.is_none()).count();
    println!("{} of {} channels pending", pending, reports.len());

    Ok(reports)
}
