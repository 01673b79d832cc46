//! Channel history scraping: fetch, write, checkpoint.
//!
//! Flow per channel: skip if done, page through history, write the output
//! file, then record the channel in the checkpoint.

pub mod checkpoint;
pub mod fetcher;
pub mod orchestrator;
pub mod record;
pub mod writer;

pub use checkpoint::{CheckpointState, CheckpointStore};
pub use fetcher::{fetch_channel, FetchOutcome, FetchSettings, RetryPolicy};
pub use orchestrator::{done_reason, DoneReason, Orchestrator, RunSummary, ScrapedChannel};
pub use record::MessageRecord;
pub use writer::{file_stem, validate_handle, ChannelWriter};
