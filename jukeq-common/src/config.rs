//! Configuration file loading and write-back
//!
//! The config file is a single JSON object shared with external tooling, so
//! unknown keys are preserved across writes. Reads go through an
//! mtime-keyed cache; any write invalidates it. The filler cursor is
//! persisted here (not in the queue file) so it survives restarts.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

/// Filler ("B-Track") playlist settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillerConfig {
    /// Playlist source reference (URL)
    pub url: String,
    /// 0-based position into the source to resume from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Shuffle the play order when the source is (re)configured
    #[serde(default)]
    pub shuffle: bool,
}

/// Daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filler: Option<FillerConfig>,

    /// External archiver command; the finished entry id is appended as the
    /// final argument. Archival is disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_command: Option<Vec<String>>,

    /// Preferred audio output device name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,

    /// Keys owned by other tools sharing the file; preserved on write-back
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Handle to the config file with cached reads and preserved writes.
pub struct ConfigStore {
    path: PathBuf,
    cache: Mutex<Option<(SystemTime, Config)>>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfigStore {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, serving from cache while the file is unmodified.
    /// A missing file is an empty config, not an error.
    pub fn load(&self) -> Result<Config> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e.into()),
        };
        let mtime = meta.modified()?;

        {
            let cache = self.cache.lock().unwrap();
            if let Some((cached_at, config)) = cache.as_ref() {
                if *cached_at == mtime {
                    return Ok(config.clone());
                }
            }
        }

        let contents = fs::read_to_string(&self.path)?;
        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", self.path.display(), e)))?;
        *self.cache.lock().unwrap() = Some((mtime, config.clone()));
        Ok(config)
    }

    /// Read-modify-write. The full object is serialized before the file is
    /// touched so a serialization failure never leaves partial content.
    pub fn update(&self, apply: impl FnOnce(&mut Config)) -> Result<Config> {
        let mut config = self.load()?;
        apply(&mut config);
        let serialized = serde_json::to_string_pretty(&config)?;
        fs::write(&self.path, serialized)?;
        *self.cache.lock().unwrap() = None;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        let config = store.load().unwrap();
        assert!(config.filler.is_none());
        assert!(config.archive_command.is_none());
    }

    #[test]
    fn update_persists_filler_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        store
            .update(|c| {
                c.filler = Some(FillerConfig {
                    url: "https://example.com/playlist".into(),
                    index: Some(4),
                    shuffle: true,
                });
            })
            .unwrap();

        let config = store.load().unwrap();
        let filler = config.filler.unwrap();
        assert_eq!(filler.index, Some(4));
        assert!(filler.shuffle);
    }

    #[test]
    fn unknown_keys_survive_write_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"Client-Id": "abc", "Scopes": ["chat:read"]}"#).unwrap();

        let store = ConfigStore::new(&path);
        store
            .update(|c| {
                c.filler = Some(FillerConfig {
                    url: "u".into(),
                    index: None,
                    shuffle: false,
                });
            })
            .unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Client-Id"], "abc");
        assert_eq!(raw["filler"]["url"], "u");
    }

    #[test]
    fn cache_is_refreshed_after_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        store.update(|_| {}).unwrap();
        assert!(store.load().unwrap().filler.is_none());

        store
            .update(|c| {
                c.output_device = Some("Speakers".into());
            })
            .unwrap();
        assert_eq!(store.load().unwrap().output_device.as_deref(), Some("Speakers"));
    }
}
