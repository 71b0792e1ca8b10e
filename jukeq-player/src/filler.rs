//! Filler ("B-Track") playlist supplier
//!
//! An endless secondary source consulted only while the request queue is
//! empty. `next` peeks at the item under the cursor without consuming it;
//! the cursor only advances when the scheduler actually promotes a filler
//! entry, so a filler peek that never plays costs nothing. The cursor is
//! persisted through the config file so it survives restarts.

use crate::error::{Error, Result};
use crate::media::MediaResolver;
use jukeq_common::config::{ConfigStore, FillerConfig};
use jukeq_common::QueueEntry;
use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

struct FillerState {
    source: String,
    /// Play order: 0-based positions into the source
    order: Vec<usize>,
    /// Index into `order`
    cursor: usize,
    shuffle: bool,
}

pub struct FillerSupplier {
    resolver: Arc<dyn MediaResolver>,
    config: Arc<ConfigStore>,
    state: Mutex<Option<FillerState>>,
}

impl FillerSupplier {
    pub fn new(resolver: Arc<dyn MediaResolver>, config: Arc<ConfigStore>) -> Self {
        FillerSupplier {
            resolver,
            config,
            state: Mutex::new(None),
        }
    }

    /// Configure from the persisted config, if any. Called once at startup.
    pub async fn configure_from_saved(&self) -> Result<()> {
        let saved = self.config.load().map_err(Error::Config)?.filler;
        match saved {
            Some(filler) => {
                self.configure(&filler.url, filler.index, filler.shuffle)
                    .await
            }
            None => Ok(()),
        }
    }

    /// (Re)configure the filler source.
    ///
    /// Resolves the source length, builds the play order (shuffled on
    /// request), and positions the cursor at `start_index` within that order
    /// (0 when absent or not found). A length resolution failure disables the
    /// filler entirely; scheduling then falls back to the queue alone.
    pub async fn configure(
        &self,
        source: &str,
        start_index: Option<usize>,
        shuffle: bool,
    ) -> Result<()> {
        let length = match self.resolver.playlist_len(source).await {
            Ok(0) => {
                *self.state.lock().unwrap() = None;
                return Err(Error::FillerConfig(format!("{} is empty", source)));
            }
            Ok(length) => length,
            Err(e) => {
                warn!("Disabling filler, could not resolve {}: {}", source, e);
                *self.state.lock().unwrap() = None;
                return Err(Error::FillerConfig(e.to_string()));
            }
        };

        let mut order: Vec<usize> = (0..length).collect();
        if shuffle {
            order.shuffle(&mut rand::thread_rng());
        }
        let cursor = start_index
            .and_then(|wanted| order.iter().position(|&i| i == wanted))
            .unwrap_or(0);

        info!(
            "Filler configured: {} ({} items, shuffle={}, cursor={})",
            source, length, shuffle, cursor
        );
        *self.state.lock().unwrap() = Some(FillerState {
            source: source.to_string(),
            order,
            cursor,
            shuffle,
        });
        self.persist();
        Ok(())
    }

    /// Drop the filler source, if any.
    pub fn clear(&self) {
        *self.state.lock().unwrap() = None;
    }

    pub fn is_configured(&self) -> bool {
        self.state.lock().unwrap().is_some()
    }

    /// Current source and the 0-based source position under the cursor.
    pub fn current(&self) -> Option<(String, usize)> {
        let state = self.state.lock().unwrap();
        state
            .as_ref()
            .map(|s| (s.source.clone(), s.order[s.cursor]))
    }

    /// Resolve the entry under the cursor without advancing it.
    ///
    /// Returns `Ok(None)` when no source is configured.
    pub async fn next(&self) -> Result<Option<QueueEntry>> {
        let target = {
            let state = self.state.lock().unwrap();
            match state.as_ref() {
                Some(s) => (s.source.clone(), s.order[s.cursor]),
                None => return Ok(None),
            }
        };
        let (source, position) = target;

        let url = self.resolver.playlist_item(&source, position).await?;
        let mut entry = self.resolver.resolve(&url).await?;
        entry.is_filler = true;
        Ok(Some(entry))
    }

    /// Advance the cursor, wrapping at the end of the order. Called when a
    /// filler entry is actually consumed (promoted or played), never on peek.
    pub fn advance(&self, delta: usize) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(s) = state.as_mut() {
                s.cursor = (s.cursor + delta) % s.order.len();
            } else {
                return;
            }
        }
        self.persist();
    }

    /// Write the source position under the cursor back to the config file so
    /// a restart resumes where we left off.
    fn persist(&self) {
        let snapshot = {
            let state = self.state.lock().unwrap();
            state
                .as_ref()
                .map(|s| (s.source.clone(), s.order[s.cursor], s.shuffle))
        };
        let Some((url, index, shuffle)) = snapshot else {
            return;
        };
        if let Err(e) = self.config.update(|c| {
            c.filler = Some(FillerConfig {
                url,
                index: Some(index),
                shuffle,
            });
        }) {
            warn!("Failed to persist filler cursor: {}", e);
        }
    }
}
