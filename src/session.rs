//! Session management for the Telegram client
//!
//! Provides:
//! - File-based session locking so two scrapers never share one session
//! - Session file validation
//! - Client creation from an already authorized session

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use grammers_client::client::updates::UpdatesLike;
use grammers_client::Client;
use grammers_mtsender::SenderPool;
use grammers_session::storages::SqliteSession;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Error, Result};

/// Session lock guard that ensures exclusive access to the Telegram session.
pub struct SessionLock {
    path: PathBuf,
    lock_file: Option<File>,
}

impl SessionLock {
    /// Acquire an exclusive lock, failing fast if another process holds it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                lock_file: Some(lock_file),
            }),
            Err(_) => {
                error!(
                    lock = %path.display(),
                    "Telegram session is already used by another scraper; wait for it to finish"
                );
                Err(Error::SessionLocked)
            }
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            let _ = file.unlock();
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Check that the session file exists.
///
/// Login is not handled here; the session must be authorized beforehand.
pub fn check_session_exists(session_file: &str) -> Result<()> {
    if !Path::new(session_file).exists() {
        error!(
            session = session_file,
            "Session file not found; create and authorize it before scraping"
        );
        return Err(Error::SessionNotFound(session_file.to_string()));
    }

    Ok(())
}

/// Load an existing session from file.
pub fn load_session(session_file: &str) -> Result<Arc<SqliteSession>> {
    let session = SqliteSession::open(session_file)
        .map_err(|e| Error::SessionNotFound(format!("Failed to load session: {}", e)))?;
    Ok(Arc::new(session))
}

/// Holder for the sender pool runner and the Client built on it
pub struct TelegramClient {
    pub client: Client,
    // Updates are not consumed, but the runner expects a live receiver.
    _updates: mpsc::UnboundedReceiver<UpdatesLike>,
    _runner_handle: tokio::task::JoinHandle<()>,
}

impl TelegramClient {
    /// Create a new TelegramClient from session
    pub async fn connect(session: Arc<SqliteSession>, api_id: i32) -> Result<Self> {
        if api_id == 0 {
            return Err(Error::Config(
                "api_id is not set (config.yml telegram.api_id or TELEGRAM_API_ID)".to_string(),
            ));
        }

        let pool = SenderPool::new(session, api_id);
        let client = Client::new(&pool);

        // The client keeps its own pool handle.
        let SenderPool {
            runner, updates, ..
        } = pool;

        let runner_handle = tokio::spawn(async move {
            runner.run().await;
        });

        info!("Connected to Telegram");

        Ok(Self {
            client,
            _updates: updates,
            _runner_handle: runner_handle,
        })
    }
}

impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Create and connect a Telegram client with the configured session.
pub async fn get_client(config: &Config) -> Result<TelegramClient> {
    let session_file = config.session_file();
    check_session_exists(&session_file)?;
    let session = load_session(&session_file)?;
    TelegramClient::connect(session, config.api_id).await
}
