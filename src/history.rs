//! Message history backend
//!
//! The scraper only needs two capabilities from Telegram: resolving a
//! channel handle and fetching one page of history older than a cursor.
//! [`HistoryBackend`] captures exactly that, so the scrape loop can run
//! against the real MTProto client or against a scripted backend in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grammers_tl_types as tl;
use tracing::debug;

use crate::chat::{normalize_handle, peer_name, peer_to_input};
use crate::error::{Error, Result};
use crate::session::TelegramClient;

/// One history entry as returned by the backend, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: i32,
    pub date: DateTime<Utc>,
    /// `None` for service messages and media without a caption.
    pub text: Option<String>,
}

impl RawMessage {
    pub fn new(id: i32, date: DateTime<Utc>, text: Option<&str>) -> Self {
        Self {
            id,
            date,
            text: text.map(str::to_string),
        }
    }
}

/// A channel handle resolved into something the backend can page through.
#[derive(Debug, Clone)]
pub struct ResolvedChannel<P> {
    pub title: String,
    pub peer: P,
}

#[async_trait]
pub trait HistoryBackend: Send + Sync {
    type Peer: Send + Sync;

    /// Resolve a handle, failing with [`Error::Resolution`].
    async fn resolve(&self, handle: &str) -> Result<ResolvedChannel<Self::Peer>>;

    /// Fetch up to `limit` messages strictly older than `offset_id`,
    /// newest first. `offset_id == 0` starts from the newest message.
    /// Failures are reported as [`Error::Fetch`].
    async fn fetch_page(
        &self,
        peer: &Self::Peer,
        offset_id: i32,
        limit: usize,
    ) -> Result<Vec<RawMessage>>;
}

/// History backend over a connected grammers client.
pub struct GrammersBackend {
    client: TelegramClient,
}

impl GrammersBackend {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HistoryBackend for GrammersBackend {
    type Peer = tl::enums::InputPeer;

    async fn resolve(&self, handle: &str) -> Result<ResolvedChannel<Self::Peer>> {
        let username = normalize_handle(handle);
        let peer = self
            .client
            .resolve_username(username)
            .await
            .map_err(|e| Error::resolution(handle, e))?
            .ok_or_else(|| Error::resolution(handle, "username not found"))?;

        let input = peer_to_input(&peer);
        if matches!(input, tl::enums::InputPeer::Empty) {
            return Err(Error::resolution(handle, "peer is not accessible"));
        }

        Ok(ResolvedChannel {
            title: peer_name(&peer, handle),
            peer: input,
        })
    }

    async fn fetch_page(
        &self,
        peer: &Self::Peer,
        offset_id: i32,
        limit: usize,
    ) -> Result<Vec<RawMessage>> {
        let request = tl::functions::messages::GetHistory {
            peer: peer.clone(),
            offset_id,
            offset_date: 0,
            add_offset: 0,
            limit: i32::try_from(limit).unwrap_or(i32::MAX),
            max_id: 0,
            min_id: 0,
            hash: 0,
        };

        let response = self
            .client
            .invoke(&request)
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        let messages = match response {
            tl::enums::messages::Messages::Messages(m) => m.messages,
            tl::enums::messages::Messages::Slice(m) => m.messages,
            tl::enums::messages::Messages::ChannelMessages(m) => m.messages,
            tl::enums::messages::Messages::NotModified(_) => Vec::new(),
        };
        debug!(offset_id, count = messages.len(), "Fetched history page");

        Ok(messages.into_iter().map(convert_message).collect())
    }
}

fn convert_message(message: tl::enums::Message) -> RawMessage {
    match message {
        tl::enums::Message::Message(m) => RawMessage {
            id: m.id,
            date: unix_date(m.date),
            text: Some(m.message).filter(|t| !t.is_empty()),
        },
        tl::enums::Message::Service(m) => RawMessage {
            id: m.id,
            date: unix_date(m.date),
            text: None,
        },
        tl::enums::Message::Empty(m) => RawMessage {
            id: m.id,
            date: DateTime::UNIX_EPOCH,
            text: None,
        },
    }
}

fn unix_date(timestamp: i32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(timestamp), 0).unwrap_or(DateTime::UNIX_EPOCH)
}
