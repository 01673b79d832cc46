//! Telegram Channel Scraper Library
//!
//! This library provides tools to:
//! - Page through the history of Telegram channels into JSON files
//! - Keep a checkpoint of finished channels so re-runs skip them
//! - Back off and retry failed history requests
//! - Stop cooperatively on Ctrl+C / SIGTERM
//! - Expose scrape progress as Prometheus metrics

pub mod chat;
pub mod config;
pub mod error;
pub mod history;
pub mod metrics;
pub mod scrape;
pub mod session;

// Re-export common types
pub use config::Config;
pub use error::{Error, Result};
pub use history::{GrammersBackend, HistoryBackend, RawMessage, ResolvedChannel};
pub use scrape::{MessageRecord, Orchestrator, RunSummary};
pub use session::{check_session_exists, get_client, SessionLock};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
