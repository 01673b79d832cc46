// Each test file uses a different subset of these helpers
#![allow(dead_code)]

//! Scripted in-memory history backend for scrape tests.
//!
//! Every channel holds a full newest-first history. Pages are cut from it
//! the way Telegram does: messages strictly older than `offset_id`, at most
//! `limit` of them. Failures can be queued per (channel, offset).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use telegram_scraper::error::{Error, Result};
use telegram_scraper::history::{HistoryBackend, RawMessage, ResolvedChannel};
use telegram_scraper::scrape::{FetchSettings, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCall {
    pub channel: String,
    pub offset_id: i32,
    pub limit: usize,
}

#[derive(Default)]
pub struct ScriptedBackend {
    histories: HashMap<String, Vec<RawMessage>>,
    failures: Mutex<HashMap<(String, i32), u32>>,
    resolved: Mutex<Vec<String>>,
    calls: Mutex<Vec<PageCall>>,
    ignore_offset: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel whose history is `messages`, newest first.
    pub fn with_channel(mut self, channel: &str, messages: Vec<RawMessage>) -> Self {
        self.histories.insert(channel.to_string(), messages);
        self
    }

    /// Make the page request at `offset_id` fail `times` times.
    pub fn failing(self, channel: &str, offset_id: i32, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert((channel.to_string(), offset_id), times);
        self
    }

    /// Serve every page from the newest message, as a server that drops
    /// the cursor would.
    pub fn ignoring_offset(mut self) -> Self {
        self.ignore_offset = true;
        self
    }

    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn offsets(&self, channel: &str) -> Vec<i32> {
        self.calls()
            .into_iter()
            .filter(|c| c.channel == channel)
            .map(|c| c.offset_id)
            .collect()
    }
}

#[async_trait]
impl HistoryBackend for ScriptedBackend {
    type Peer = String;

    async fn resolve(&self, handle: &str) -> Result<ResolvedChannel<String>> {
        self.resolved.lock().unwrap().push(handle.to_string());
        if !self.histories.contains_key(handle) {
            return Err(Error::resolution(handle, "USERNAME_NOT_OCCUPIED"));
        }
        Ok(ResolvedChannel {
            title: format!("Channel {}", handle),
            peer: handle.to_string(),
        })
    }

    async fn fetch_page(&self, peer: &String, offset_id: i32, limit: usize) -> Result<Vec<RawMessage>> {
        self.calls.lock().unwrap().push(PageCall {
            channel: peer.clone(),
            offset_id,
            limit,
        });

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&(peer.clone(), offset_id)) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::Fetch("RPC_CALL_FAIL".to_string()));
                }
            }
        }

        let history = self.histories.get(peer).cloned().unwrap_or_default();
        Ok(history
            .into_iter()
            .filter(|m| self.ignore_offset || offset_id == 0 || m.id < offset_id)
            .take(limit)
            .collect())
    }
}

pub fn date(id: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(i64::from(id))
}

pub fn text_message(id: i32) -> RawMessage {
    RawMessage::new(id, date(id), Some(&format!("message {}", id)))
}

pub fn media_message(id: i32) -> RawMessage {
    RawMessage::new(id, date(id), None)
}

/// `count` text messages with ids `count..=1`, newest first.
pub fn text_history(count: i32) -> Vec<RawMessage> {
    (1..=count).rev().map(text_message).collect()
}

/// Settings with no pacing and a 10s..60s backoff.
pub fn settings(max_messages: usize, batch_size: usize) -> FetchSettings {
    FetchSettings {
        max_messages,
        batch_size,
        request_delay: Duration::ZERO,
        retry: RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            max_retries: None,
        },
    }
}
