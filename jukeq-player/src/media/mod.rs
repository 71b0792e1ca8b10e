//! External media collaborators
//!
//! The resolver, downloader, and watched-playlist archiver are external
//! services as far as the scheduler is concerned. These traits pin down the
//! contracts; `ytdlp` provides the production implementations and tests
//! substitute scripted fakes.

mod archive;
mod ytdlp;

pub use archive::CommandArchiver;
pub use ytdlp::YtDlpResolver;

use crate::error::Result;
use async_trait::async_trait;
use jukeq_common::QueueEntry;
use std::path::Path;

/// Resolves request URLs to metadata and fetches media into named slots.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolve a request URL into a queue entry (id, title, duration,
    /// thumbnail, start offset). Fails with `Error::Resolution` when the URL
    /// is malformed or the media cannot be found.
    async fn resolve(&self, url: &str) -> Result<QueueEntry>;

    /// Stream-download the media behind `url` into `dest`, replacing any
    /// existing file.
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Number of items in a playlist source.
    async fn playlist_len(&self, source: &str) -> Result<usize>;

    /// Watch URL of the item at `index` (0-based) within `source`.
    async fn playlist_item(&self, source: &str, index: usize) -> Result<String>;
}

/// Submits finished entries to the external watched-playlist archiver.
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn archive(&self, id: &str) -> Result<()>;
}
