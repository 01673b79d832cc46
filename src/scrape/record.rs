//! The persisted message record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::RawMessage;

/// A text message as written to a channel's output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i32,
    #[serde(with = "iso_utc")]
    pub date: DateTime<Utc>,
    pub text: String,
}

impl MessageRecord {
    /// Build a record from a raw entry; entries without text are dropped.
    pub fn from_raw(raw: &RawMessage) -> Option<Self> {
        let text = raw.text.as_deref().filter(|t| !t.is_empty())?;
        Some(Self {
            id: raw.id,
            date: raw.date,
            text: text.to_string(),
        })
    }
}

/// `2024-03-01T10:15:00+00:00`, the offset always spelled out.
mod iso_utc {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::AutoSi, false))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
