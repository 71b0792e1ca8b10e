//! Request, skip, seek, and player-state operations
//!
//! These run on API-handler tasks. Everything that touches the active/staged
//! slots goes through the scheduler's slot lock; the queue store has its own
//! writer lock.

use super::core::Scheduler;
use crate::error::Result;
use jukeq_common::events::Event;
use jukeq_common::QueueEntry;
use serde::Serialize;
use std::fs;
use std::time::Duration;
use tracing::info;

/// Play/pause command for the player-state endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
}

impl PlayerCommand {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "play" => Some(PlayerCommand::Play),
            "pause" => Some(PlayerCommand::Pause),
            _ => None,
        }
    }
}

/// Player state as reported to clients.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStateInfo {
    pub state: &'static str,
    pub position_ms: Option<u64>,
}

/// Queue listing: the active entry, the staged entry, and everything still
/// waiting in the store.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub current: Option<QueueEntry>,
    pub next: Option<QueueEntry>,
    pub queue: Vec<QueueEntry>,
}

impl Scheduler {
    /// Resolve a request URL and append it to the queue.
    ///
    /// Returns the effective play-order position. A resolution failure never
    /// touches the store; it is reported to the caller and announced on the
    /// bus with the raw input preserved.
    pub async fn push_request(&self, url: &str) -> Result<i64> {
        let entry = match self.resolver.resolve(url).await {
            Ok(entry) => entry,
            Err(e) => {
                info!("Rejecting unresolvable request: {}", url);
                self.bus.emit(Event::queue_rejected(url, false));
                return Err(e);
            }
        };
        let pos = self.store.push(std::slice::from_ref(&entry))?;
        info!("Queued [{}] at position {}: {}", entry.id, pos, entry.title);
        self.bus.emit(Event::queue_song(pos, &entry));
        Ok(pos)
    }

    /// Skip up to `count` entries in effective play order: the active entry
    /// first, then the staged entry, then head entries straight out of the
    /// store. Returns how many were actually skipped. Each skipped entry is
    /// archived unless `purge` suppresses it.
    pub async fn skip(&self, count: usize, purge: bool) -> Result<usize> {
        if count == 0 {
            return Ok(0);
        }

        let mut skipped = 0;
        let mut archive_ids: Vec<String> = Vec::new();
        {
            let mut slots = self.slots.lock().await;
            if let Some(active) = slots.active.take() {
                info!("Skipping active entry {}", active.id);
                skipped += 1;
                if !purge {
                    archive_ids.push(active.id);
                }
                // The active media file is released by the play loop once the
                // device lets go of it.
            }
            if count >= 2 {
                if let Some(staged) = slots.staged.take() {
                    info!("Skipping staged entry {}", staged.entry.id);
                    skipped += 1;
                    if !purge {
                        archive_ids.push(staged.entry.id);
                    }
                    let _ = fs::remove_file(self.store.next_path());
                }
            }
        }

        let outcome = if count > skipped {
            self.store.discard(count - skipped).map(|removed| {
                skipped += removed.len();
                if !purge {
                    archive_ids.extend(removed.into_iter().map(|e| e.id));
                }
            })
        } else {
            Ok(())
        };

        // Wake the play-phase wait regardless; the scheduler must not sit out
        // the rest of a skipped entry.
        self.song_done.notify_one();

        outcome?;
        for id in archive_ids {
            self.archive_by_id(&id).await;
        }
        Ok(skipped)
    }

    /// Seek within the active entry. A seek with nothing active is a defined
    /// no-op returning `None`.
    pub async fn seek(&self, seconds: u64) -> Result<Option<PlayerStateInfo>> {
        if self.slots.lock().await.active.is_none() {
            return Ok(None);
        }
        self.device.seek(Duration::from_secs(seconds))?;
        let state = self.player_state(None).await;
        if let Some(info) = &state {
            self.bus
                .emit(Event::change_playerstate(info.state, info.position_ms));
        }
        Ok(state)
    }

    /// Report (and optionally set) the player state. Returns `None` when
    /// nothing is active.
    pub async fn player_state(&self, set: Option<PlayerCommand>) -> Option<PlayerStateInfo> {
        match set {
            Some(PlayerCommand::Play) => self.device.play(),
            Some(PlayerCommand::Pause) => self.device.pause(),
            None => {}
        }
        let has_active = self.slots.lock().await.active.is_some();
        if !has_active {
            return None;
        }
        Some(PlayerStateInfo {
            state: if self.device.is_playing() {
                "play"
            } else {
                "pause"
            },
            position_ms: self.device.position().map(|d| d.as_millis() as u64),
        })
    }

    /// Current/next/queued listing for the queue endpoint. The store read is
    /// lock-free by design; a racing push or pop may show a transient stale
    /// view.
    pub async fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        let (current, next) = {
            let slots = self.slots.lock().await;
            (
                slots.active.clone(),
                slots.staged.as_ref().map(|s| s.entry.clone()),
            )
        };
        let queue = self.store.snapshot()?;
        Ok(QueueSnapshot {
            current,
            next,
            queue,
        })
    }
}
