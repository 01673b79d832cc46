//! Per-channel JSON output files.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::chat::normalize_handle;
use crate::error::{Error, Result};
use crate::scrape::record::MessageRecord;

static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-]").expect("valid file name pattern"));

/// Deterministic file stem for a channel handle.
pub fn file_stem(handle: &str) -> String {
    let stem = UNSAFE_FILE_CHARS
        .replace_all(normalize_handle(handle), "_")
        .into_owned();
    if stem.is_empty() {
        "unknown_channel".to_string()
    } else {
        stem
    }
}

/// Reject handles that are not plain usernames once normalized.
///
/// Telegram usernames only use `[A-Za-z0-9_]`, so a handle that
/// [`file_stem`] would rewrite could share its output file with another
/// channel.
pub fn validate_handle(handle: &str) -> Result<()> {
    let username = normalize_handle(handle);
    if username.is_empty() || file_stem(handle) != username {
        return Err(Error::InvalidArgument(format!(
            "'{}' is not a valid channel username",
            handle
        )));
    }
    Ok(())
}

/// Writes one `<stem>.json` file per channel under a data directory.
#[derive(Debug, Clone)]
pub struct ChannelWriter {
    data_dir: PathBuf,
}

impl ChannelWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn output_path(&self, handle: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", file_stem(handle)))
    }

    /// Whether the channel's output file is already on disk.
    pub fn exists(&self, handle: &str) -> bool {
        self.output_path(handle).is_file()
    }

    /// Write the records as a pretty JSON array, replacing any previous file.
    pub fn write(&self, handle: &str, records: &[MessageRecord]) -> Result<PathBuf> {
        let path = self.output_path(handle);
        let json = serde_json::to_string_pretty(records)?;
        write_atomic(&path, json.as_bytes())?;
        info!(
            channel = handle,
            path = %path.display(),
            "Saved {} messages",
            records.len()
        );
        Ok(path)
    }

    /// Parse a previously written output file.
    pub fn read(&self, handle: &str) -> Result<Vec<MessageRecord>> {
        let path = self.output_path(handle);
        let content = fs::read_to_string(&path).map_err(|e| Error::persistence(&path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Write through a sibling temp file and rename, so readers never observe
/// a half-written file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(Error::persistence(&tmp, err));
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::persistence(path, e)
    })
}
