//! Event model for the JukeQ fan-out bus
//!
//! Events are immutable `{name, data}` pairs broadcast by value to every
//! subscriber. The wire format (one JSON object per event) is exactly the
//! serialized form of [`Event`].

mod bus;

pub use bus::{EventBucket, EventBus};

use crate::human_time::format_duration;
use crate::track::QueueEntry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A broadcast event: a name plus a free-form data mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub data: Map<String, Value>,
}

impl Event {
    pub fn new(name: impl Into<String>, data: Map<String, Value>) -> Self {
        Event {
            name: name.into(),
            data,
        }
    }

    /// Entry payload shared by the queue/play events.
    fn entry_data(entry: &QueueEntry) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("id".into(), json!(entry.id));
        data.insert("title".into(), json!(entry.title));
        data.insert("duration".into(), json!(format_duration(entry.duration)));
        data.insert("thumbnail".into(), json!(entry.thumbnail));
        data.insert("start".into(), json!(entry.start));
        data.insert("is_filler".into(), json!(entry.is_filler));
        data
    }

    /// A request was accepted into the queue at the given effective position.
    pub fn queue_song(pos: i64, entry: &QueueEntry) -> Self {
        let mut data = Self::entry_data(entry);
        data.insert("pos".into(), json!(pos));
        data.insert("success".into(), json!(true));
        Event::new("queue_song", data)
    }

    /// A request could not be resolved. The raw input is preserved in the
    /// `id` field so observers can show what was rejected.
    pub fn queue_rejected(raw_input: &str, is_filler: bool) -> Self {
        let mut data = Map::new();
        data.insert("id".into(), json!(raw_input));
        data.insert("title".into(), json!(""));
        data.insert("duration".into(), json!("00:00:00"));
        data.insert("thumbnail".into(), json!(""));
        data.insert("start".into(), json!(0));
        data.insert("is_filler".into(), json!(is_filler));
        data.insert("pos".into(), json!(-1));
        data.insert("success".into(), json!(false));
        Event::new("queue_song", data)
    }

    /// Playback of an entry has started.
    pub fn play_song(entry: &QueueEntry) -> Self {
        Event::new("play_song", Self::entry_data(entry))
    }

    /// The player state changed (play/pause toggles, seeks).
    pub fn change_playerstate(state: &str, position_ms: Option<u64>) -> Self {
        let mut data = Map::new();
        data.insert("state".into(), json!(state));
        data.insert("position_ms".into(), json!(position_ms));
        Event::new("change_playerstate", data)
    }

    /// Overlay persistence toggle requested by an operator.
    pub fn overlay_persistence(value: bool) -> Self {
        let mut data = Map::new();
        data.insert("value".into(), json!(value));
        Event::new("overlay_persistence_change", data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn queue_song_wire_format() {
        let entry = QueueEntry {
            id: "abc".into(),
            title: "A Song".into(),
            duration: Duration::from_secs(61),
            thumbnail: "abc.webp".into(),
            start: 5,
            is_filler: false,
        };
        let event = Event::queue_song(3, &entry);
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["name"], "queue_song");
        assert_eq!(v["data"]["pos"], 3);
        assert_eq!(v["data"]["success"], true);
        assert_eq!(v["data"]["duration"], "00:01:01");
        assert_eq!(v["data"]["start"], 5);
    }

    #[test]
    fn rejected_preserves_raw_input() {
        let event = Event::queue_rejected("not a url at all", false);
        assert_eq!(event.data["id"], "not a url at all");
        assert_eq!(event.data["success"], false);
        assert_eq!(event.data["pos"], -1);
    }
}
