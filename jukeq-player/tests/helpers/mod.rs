//! Shared test fixtures: scripted resolver, playback device, and archiver
//! standing in for the external collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use jukeq_common::config::ConfigStore;
use jukeq_common::events::EventBus;
use jukeq_common::QueueEntry;
use jukeq_player::api::AppContext;
use jukeq_player::device::PlaybackDevice;
use jukeq_player::error::{Error, Result};
use jukeq_player::filler::FillerSupplier;
use jukeq_player::media::{Archiver, MediaResolver};
use jukeq_player::scheduler::Scheduler;
use jukeq_player::store::QueueStore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub fn watch_url(id: &str) -> String {
    format!("https://youtube.com/watch?v={}", id)
}

pub fn test_entry(id: &str) -> QueueEntry {
    QueueEntry {
        id: id.to_string(),
        title: format!("Title of {}", id),
        duration: Duration::from_secs(100),
        thumbnail: format!("{}.webp", id),
        start: 0,
        is_filler: false,
    }
}

/// Resolver that fabricates metadata from the URL instead of shelling out.
///
/// URLs containing "unresolvable" fail resolution; ids inserted into
/// `failing_downloads` fail their downloads. Downloads write the media id as
/// the file content so tests can check which media landed in which slot.
#[derive(Default)]
pub struct ScriptedResolver {
    pub playlist: Mutex<Vec<String>>,
    pub failing_downloads: Mutex<HashSet<String>>,
}

fn id_of(url: &str) -> Result<String> {
    url.rsplit_once("v=")
        .map(|(_, id)| id.to_string())
        .ok_or_else(|| Error::Resolution(url.to_string()))
}

#[async_trait]
impl MediaResolver for ScriptedResolver {
    async fn resolve(&self, url: &str) -> Result<QueueEntry> {
        if url.contains("unresolvable") {
            return Err(Error::Resolution(url.to_string()));
        }
        Ok(test_entry(&id_of(url)?))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let id = id_of(url)?;
        if self.failing_downloads.lock().unwrap().contains(&id) {
            return Err(Error::Download(id));
        }
        std::fs::write(dest, &id)?;
        Ok(())
    }

    async fn playlist_len(&self, source: &str) -> Result<usize> {
        let len = self.playlist.lock().unwrap().len();
        if len == 0 {
            return Err(Error::FillerConfig(format!("cannot resolve {}", source)));
        }
        Ok(len)
    }

    async fn playlist_item(&self, _source: &str, index: usize) -> Result<String> {
        self.playlist
            .lock()
            .unwrap()
            .get(index)
            .map(|id| watch_url(id))
            .ok_or_else(|| Error::Resolution(format!("no playlist item {}", index)))
    }
}

/// Playback device that records commands. `finish()` simulates the media
/// reaching its natural end.
#[derive(Default)]
pub struct ScriptedDevice {
    pub loaded: Mutex<Option<PathBuf>>,
    pub playing: AtomicBool,
    pub position: Mutex<Duration>,
    ended: AtomicBool,
}

impl ScriptedDevice {
    pub fn finish(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.ended.store(true, Ordering::SeqCst);
    }

    pub fn loaded_path(&self) -> Option<PathBuf> {
        self.loaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaybackDevice for ScriptedDevice {
    fn load(&self, path: &Path, start: Option<Duration>) -> Result<()> {
        *self.loaded.lock().unwrap() = Some(path.to_path_buf());
        *self.position.lock().unwrap() = start.unwrap_or_default();
        self.ended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn play(&self) {
        self.playing.store(true, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst) && self.loaded.lock().unwrap().is_some()
    }

    fn position(&self) -> Option<Duration> {
        if self.loaded.lock().unwrap().is_some() {
            Some(*self.position.lock().unwrap())
        } else {
            None
        }
    }

    fn seek(&self, position: Duration) -> Result<()> {
        *self.position.lock().unwrap() = position;
        Ok(())
    }

    fn clear(&self) {
        *self.loaded.lock().unwrap() = None;
        self.playing.store(false, Ordering::SeqCst);
    }

    async fn wait_end(&self) {
        loop {
            if self.ended.swap(false, Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Archiver that records every submitted id.
#[derive(Default)]
pub struct RecordingArchiver {
    pub archived: Mutex<Vec<String>>,
}

#[async_trait]
impl Archiver for RecordingArchiver {
    async fn archive(&self, id: &str) -> Result<()> {
        self.archived.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub config: Arc<ConfigStore>,
    pub store: Arc<QueueStore>,
    pub resolver: Arc<ScriptedResolver>,
    pub device: Arc<ScriptedDevice>,
    pub archiver: Arc<RecordingArchiver>,
    pub bus: Arc<EventBus>,
    pub filler: Arc<FillerSupplier>,
    pub scheduler: Arc<Scheduler>,
}

pub fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(ConfigStore::new(dir.path().join("config.json")));
    let store = Arc::new(QueueStore::open(dir.path()).unwrap());
    let resolver = Arc::new(ScriptedResolver::default());
    let device = Arc::new(ScriptedDevice::default());
    let archiver = Arc::new(RecordingArchiver::default());
    let bus = Arc::new(EventBus::new());
    let filler = Arc::new(FillerSupplier::new(
        Arc::clone(&resolver) as Arc<dyn MediaResolver>,
        Arc::clone(&config),
    ));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        Arc::clone(&filler),
        Arc::clone(&resolver) as Arc<dyn MediaResolver>,
        Some(Arc::clone(&archiver) as Arc<dyn Archiver>),
        Arc::clone(&device) as Arc<dyn PlaybackDevice>,
        Arc::clone(&bus),
    ));

    Fixture {
        dir,
        config,
        store,
        resolver,
        device,
        archiver,
        bus,
        filler,
        scheduler,
    }
}

impl Fixture {
    pub fn app_context(&self) -> AppContext {
        AppContext {
            scheduler: Arc::clone(&self.scheduler),
            filler: Arc::clone(&self.filler),
            bus: Arc::clone(&self.bus),
            config: Arc::clone(&self.config),
        }
    }

    /// Run ready cycles until `pred` holds on the queue snapshot.
    pub async fn cycle_until(
        &self,
        pred: impl Fn(&jukeq_player::scheduler::QueueSnapshot) -> bool,
        what: &str,
    ) {
        for _ in 0..200 {
            self.scheduler.ready_cycle().await;
            let snap = self.scheduler.queue_snapshot().await.unwrap();
            if pred(&snap) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for: {}", what);
    }

    /// Poll without driving cycles, for waits against the running loop.
    pub async fn wait_until(&self, pred: impl Fn() -> bool, what: &str) {
        for _ in 0..500 {
            if pred() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for: {}", what);
    }
}
