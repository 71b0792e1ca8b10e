//! Scheduler loop and slot management
//!
//! One loop task drives playback: ensure an active entry (promoting the
//! staged slot when its download finished), keep the staged slot filling in
//! the background, hand the active media to the playback device, then wait
//! for completion or a skip. The queue store always wins over the filler;
//! a staged filler entry is discarded the moment real requests arrive.

use crate::device::PlaybackDevice;
use crate::error::Result;
use crate::filler::FillerSupplier;
use crate::media::{Archiver, MediaResolver};
use crate::store::QueueStore;
use jukeq_common::events::{Event, EventBus};
use jukeq_common::human_time::format_duration;
use jukeq_common::QueueEntry;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, error, info, warn};

/// Bounded idle wait; the loop re-checks the stop signal at least this often.
const IDLE_WAIT: Duration = Duration::from_secs(3);

/// An entry whose media is being (or has been) downloaded into the staged
/// slot. `ready` flips once the file is fully on disk; promotion requires it.
pub(super) struct Staged {
    pub(super) entry: QueueEntry,
    pub(super) ready: bool,
}

/// The two named slots. Only ever touched with the slot lock held.
#[derive(Default)]
pub(super) struct Slots {
    pub(super) active: Option<QueueEntry>,
    pub(super) staged: Option<Staged>,
}

pub struct Scheduler {
    pub(super) store: Arc<QueueStore>,
    pub(super) filler: Arc<FillerSupplier>,
    pub(super) resolver: Arc<dyn MediaResolver>,
    pub(super) archiver: Option<Arc<dyn Archiver>>,
    pub(super) device: Arc<dyn PlaybackDevice>,
    pub(super) bus: Arc<EventBus>,
    pub(super) slots: Mutex<Slots>,
    /// Wakes the play-phase wait when a skip clears the active slot
    pub(super) song_done: Notify,
    /// Guards against overlapping background staging tasks
    staging: AtomicBool,
    stop_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(
        store: Arc<QueueStore>,
        filler: Arc<FillerSupplier>,
        resolver: Arc<dyn MediaResolver>,
        archiver: Option<Arc<dyn Archiver>>,
        device: Arc<dyn PlaybackDevice>,
        bus: Arc<EventBus>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Scheduler {
            store,
            filler,
            resolver,
            archiver,
            device,
            bus,
            slots: Mutex::new(Slots::default()),
            song_done: Notify::new(),
            staging: AtomicBool::new(false),
            stop_tx,
        }
    }

    /// Request loop termination. The loop exits at its next wait wakeup and
    /// in-flight downloads are abandoned.
    pub fn shutdown(&self) {
        info!("Scheduler shutdown requested");
        self.stop_tx.send_replace(true);
        self.song_done.notify_waiters();
    }

    pub fn is_stopping(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Main scheduler loop. Runs until [`shutdown`](Self::shutdown).
    pub async fn run(self: Arc<Self>) {
        // Stale slot media from a previous run is unplayable state.
        let _ = fs::remove_file(self.store.current_path());
        let _ = fs::remove_file(self.store.next_path());

        let mut populated = self.store.watch_populated();
        let mut stop = self.stop_tx.subscribe();
        info!("Handling song queue");

        loop {
            if *stop.borrow_and_update() {
                break;
            }
            if !*populated.borrow_and_update() {
                tokio::select! {
                    _ = stop.changed() => {}
                    _ = populated.changed() => {
                        debug!("Woken by queue push");
                    }
                    _ = tokio::time::sleep(IDLE_WAIT) => {}
                }
            }
            if *stop.borrow_and_update() {
                break;
            }

            self.ready_cycle().await;

            if *stop.borrow_and_update() {
                break;
            }

            self.play_active(&mut stop).await;
        }
        info!("Scheduler stopped");
    }

    /// One readiness pass: invalidate stale filler staging, fill the active
    /// slot, and keep the staged slot warming in the background.
    pub async fn ready_cycle(self: &Arc<Self>) {
        // Requests always preempt filler: a staged filler entry is dropped as
        // soon as the queue has content again.
        if self.store.is_populated() {
            let mut slots = self.slots.lock().await;
            if slots.staged.as_ref().is_some_and(|s| s.entry.is_filler) {
                debug!("Discarding staged filler entry, queue has requests");
                slots.staged = None;
                let _ = fs::remove_file(self.store.next_path());
            }
        }

        let needs_active = self.slots.lock().await.active.is_none();
        if needs_active {
            let promoted = self.try_promote().await;
            match promoted {
                Some(entry) => {
                    if entry.is_filler {
                        self.filler.advance(1);
                    }
                }
                // No play-ready staged entry: fall back to the synchronous
                // pop-and-download path.
                None => self.acquire_active().await,
            }
        }

        self.maybe_spawn_stage();
    }

    /// Promote a fully-downloaded staged entry into the active slot.
    async fn try_promote(&self) -> Option<QueueEntry> {
        let mut slots = self.slots.lock().await;
        if !slots.staged.as_ref().is_some_and(|s| s.ready) {
            return None;
        }
        let staged = slots.staged.take().expect("checked above");

        let _ = fs::remove_file(self.store.current_path());
        match fs::rename(self.store.next_path(), self.store.current_path()) {
            Ok(()) => {
                debug!("Promoted staged entry {} to active", staged.entry.id);
                slots.active = Some(staged.entry.clone());
                Some(staged.entry)
            }
            Err(e) => {
                warn!("Failed to move staged media into active slot: {}", e);
                None
            }
        }
    }

    /// Synchronous path: pop the next entry (queue first, filler fallback)
    /// and download straight into the active slot. A download failure leaves
    /// the slot empty; the cycle is a no-op and retries next time around.
    async fn acquire_active(&self) {
        let Some(entry) = self.acquire_next().await else {
            return;
        };
        let from_filler = entry.is_filler;
        match self.download(&entry.url(), true).await {
            Some(Ok(())) => {
                self.slots.lock().await.active = Some(entry);
                if from_filler {
                    self.filler.advance(1);
                }
            }
            Some(Err(e)) => {
                warn!("Active slot download failed, retrying next cycle: {}", e);
                let _ = fs::remove_file(self.store.current_path());
            }
            None => {} // shutting down
        }
    }

    /// Next entry in effective play order: the queue store head, or a filler
    /// peek when the store is empty. Filler consults are announced on the bus
    /// the same way requests are.
    pub(super) async fn acquire_next(&self) -> Option<QueueEntry> {
        match self.store.pop() {
            Ok(Some(entry)) => return Some(entry),
            Ok(None) => {}
            Err(e) => {
                error!("Queue pop failed: {}", e);
                return None;
            }
        }

        if !self.filler.is_configured() {
            return None;
        }
        match self.filler.next().await {
            Ok(Some(entry)) => {
                self.bus.emit(Event::queue_song(1, &entry));
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Filler entry resolution failed: {}", e);
                let raw = self
                    .filler
                    .current()
                    .map(|(source, index)| format!("{}&index={}", source, index))
                    .unwrap_or_default();
                self.bus.emit(Event::queue_rejected(&raw, true));
                None
            }
        }
    }

    /// Kick off a background staging task unless one is already running.
    fn maybe_spawn_stage(self: &Arc<Self>) {
        if self.staging.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.stage_next().await;
            this.staging.store(false, Ordering::SeqCst);
        });
    }

    /// Resolve and download the next entry into the staged slot. Runs
    /// concurrently with playback and never blocks it.
    async fn stage_next(&self) {
        if self.slots.lock().await.staged.is_some() {
            return;
        }
        let Some(entry) = self.acquire_next().await else {
            return;
        };
        {
            let mut slots = self.slots.lock().await;
            slots.staged = Some(Staged {
                entry: entry.clone(),
                ready: false,
            });
        }

        match self.download(&entry.url(), false).await {
            Some(Ok(())) => {
                let mut slots = self.slots.lock().await;
                match slots.staged {
                    Some(ref mut staged) if staged.entry.id == entry.id => {
                        debug!("Staged entry {} is play-ready", entry.id);
                        staged.ready = true;
                    }
                    // Invalidated while downloading (skip, or requests
                    // displacing filler); the media is stale.
                    _ => {
                        let _ = fs::remove_file(self.store.next_path());
                    }
                }
            }
            Some(Err(e)) => {
                warn!("Staging download failed: {}", e);
                let mut slots = self.slots.lock().await;
                if slots.staged.as_ref().is_some_and(|s| s.entry.id == entry.id) {
                    slots.staged = None;
                }
                let _ = fs::remove_file(self.store.next_path());
            }
            None => {} // shutting down
        }
    }

    /// Download into the active or staged slot, abandoning on shutdown.
    /// Returns `None` when the stop signal cut the download short.
    async fn download(&self, url: &str, active_slot: bool) -> Option<Result<()>> {
        let dest = if active_slot {
            self.store.current_path()
        } else {
            self.store.next_path()
        };
        let mut stop = self.stop_tx.subscribe();
        tokio::select! {
            res = self.resolver.download(url, dest) => Some(res),
            _ = stop.changed() => None,
        }
    }

    /// Hand the active media to the device and wait out playback.
    async fn play_active(&self, stop: &mut watch::Receiver<bool>) {
        let entry = { self.slots.lock().await.active.clone() };
        let Some(entry) = entry else {
            return;
        };
        if !self.store.current_path().exists() {
            warn!("Active entry {} has no media on disk, dropping", entry.id);
            self.slots.lock().await.active = None;
            return;
        }

        let start = (entry.start > 0 && entry.start < entry.duration.as_secs())
            .then(|| Duration::from_secs(entry.start));
        if let Err(e) = self.device.load(self.store.current_path(), start) {
            warn!("Device rejected {}: {}", entry.id, e);
            self.slots.lock().await.active = None;
            let _ = fs::remove_file(self.store.current_path());
            return;
        }

        self.device.play();
        info!(
            "Playing: [{}] ({}) {}",
            entry.id,
            format_duration(entry.duration),
            entry.title
        );
        self.bus.emit(Event::play_song(&entry));

        loop {
            tokio::select! {
                _ = self.device.wait_end() => break,
                _ = self.song_done.notified() => {
                    // Only a skip that actually cleared our entry ends the
                    // wait; stale wakeups keep playing.
                    let cleared = {
                        let slots = self.slots.lock().await;
                        !slots.active.as_ref().is_some_and(|a| a.id == entry.id)
                    };
                    if cleared {
                        debug!("Playback of {} cut short by skip", entry.id);
                        break;
                    }
                }
                _ = stop.changed() => break,
            }
        }

        if self.device.is_playing() {
            self.device.pause();
        }
        self.device.clear();
        let _ = fs::remove_file(self.store.current_path());

        // Natural end leaves the entry in the active slot; a skip already
        // took it and made its own archival decision.
        let natural = {
            let mut slots = self.slots.lock().await;
            if slots.active.as_ref().is_some_and(|a| a.id == entry.id) {
                slots.active = None;
                true
            } else {
                false
            }
        };
        info!("Stopped {}", entry.id);

        if natural && !*stop.borrow() {
            self.archive_by_id(&entry.id).await;
        }
    }

    /// Submit a finished entry to the watched-playlist archiver, if one is
    /// configured. Failures are logged and dropped.
    pub(super) async fn archive_by_id(&self, id: &str) {
        let Some(archiver) = &self.archiver else {
            return;
        };
        if let Err(e) = archiver.archive(id).await {
            warn!("Archiver failed for {}: {}", id, e);
        }
    }
}
