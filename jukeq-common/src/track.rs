//! Queue entry model and its one-line persistence format
//!
//! A queue entry is identified by the resolver-assigned media id and is
//! immutable once created. The on-disk format is one space-separated line per
//! entry, with the title consuming the remainder of the line:
//!
//! ```text
//! <id> <duration HH:MM:SS> <thumbnail> <start-offset-seconds> <title...>
//! ```

use crate::error::{Error, Result};
use crate::human_time::{format_duration, parse_duration};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A resolved media request, queued or playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Resolver-assigned media id (e.g. a video id)
    pub id: String,
    pub title: String,
    /// Total media duration
    #[serde(with = "serde_duration")]
    pub duration: Duration,
    /// Thumbnail file reference recorded at resolve time
    pub thumbnail: String,
    /// Seconds into the media where playback begins
    pub start: u64,
    /// True when the entry was supplied by the filler playlist rather than a
    /// request. Filler entries never enter the queue file.
    #[serde(default)]
    pub is_filler: bool,
}

impl QueueEntry {
    /// Canonical watch URL for this entry's media id.
    pub fn url(&self) -> String {
        format!("https://youtube.com/watch?v={}", self.id)
    }

    /// Serialize to the queue file line format (no trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.id,
            format_duration(self.duration),
            self.thumbnail,
            self.start,
            self.title
        )
    }

    /// Parse a queue file line.
    ///
    /// The first four fields are fixed; everything after the fourth space is
    /// the title and may itself contain spaces. Filler entries are never
    /// persisted, so `is_filler` is always false for parsed lines.
    pub fn from_line(line: &str) -> Result<Self> {
        let mut fields = line.splitn(5, ' ');
        let id = fields
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::MalformedLine(line.to_string()))?;
        let duration_s = fields
            .next()
            .ok_or_else(|| Error::MalformedLine(line.to_string()))?;
        let thumbnail = fields
            .next()
            .ok_or_else(|| Error::MalformedLine(line.to_string()))?;
        let start_s = fields
            .next()
            .ok_or_else(|| Error::MalformedLine(line.to_string()))?;
        let title = fields
            .next()
            .ok_or_else(|| Error::MalformedLine(line.to_string()))?;

        let duration = parse_duration(duration_s)
            .ok_or_else(|| Error::MalformedLine(format!("bad duration in: {}", line)))?;
        let start = start_s
            .parse()
            .map_err(|_| Error::MalformedLine(format!("bad start offset in: {}", line)))?;

        Ok(QueueEntry {
            id: id.to_string(),
            title: title.trim_end().to_string(),
            duration,
            thumbnail: thumbnail.to_string(),
            start,
            is_filler: false,
        })
    }
}

/// Durations serialize as `HH:MM:SS` strings in API payloads.
mod serde_duration {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> std::result::Result<S::Ok, S::Error> {
        ser.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> std::result::Result<Duration, D::Error> {
        let s = String::deserialize(de)?;
        parse_duration(&s).ok_or_else(|| serde::de::Error::custom("expected HH:MM:SS"))
    }
}
