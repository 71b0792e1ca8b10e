//! Durable file-backed request queue
//!
//! One line per entry, append-only on push, head-truncating on pop. The file
//! is the only authoritative copy: no in-memory replica survives a mutation,
//! and the store is re-read before every scheduling decision. Push and pop
//! serialize through a single writer lock; listings read the file without it
//! (a racing read may see a transient stale view, which callers accept).

use crate::error::{Error, Result};
use jukeq_common::QueueEntry;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Queue file name inside the data directory
pub const QUEUE_FILE: &str = "QUEUE";
/// Active slot media file
pub const CURRENT_FILE: &str = "CURRENT";
/// Staged slot media file
pub const NEXT_FILE: &str = "NEXT";

pub struct QueueStore {
    path: PathBuf,
    current_path: PathBuf,
    next_path: PathBuf,
    write_lock: Mutex<()>,
    populated_tx: watch::Sender<bool>,
}

impl QueueStore {
    /// Open (creating if necessary) the queue file inside `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(QUEUE_FILE);
        if !path.exists() {
            fs::write(&path, "")?;
        }
        let contents = fs::read_to_string(&path)?;
        let (populated_tx, _) = watch::channel(has_content(&contents));
        Ok(QueueStore {
            path,
            current_path: data_dir.join(CURRENT_FILE),
            next_path: data_dir.join(NEXT_FILE),
            write_lock: Mutex::new(()),
            populated_tx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Media file path for the active slot.
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Media file path for the staged slot.
    pub fn next_path(&self) -> &Path {
        &self.next_path
    }

    /// Append entries and return the effective play-order position of the
    /// first one: the persisted line count after the append, plus one if the
    /// staged slot is occupied, minus one if the active slot is empty (the
    /// new head will move straight up).
    pub fn push(&self, entries: &[QueueEntry]) -> Result<i64> {
        let _guard = self.write_lock.lock().unwrap();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut appended = String::new();
        for entry in entries {
            appended.push_str(&entry.to_line());
            appended.push('\n');
        }
        file.write_all(appended.as_bytes())?;
        file.flush()?;

        let contents = fs::read_to_string(&self.path)?;
        let count = contents.lines().filter(|l| !l.trim().is_empty()).count() as i64;
        if has_content(&contents) {
            self.populated_tx.send_replace(true);
        }

        let staged_occupied = self.next_path.exists() as i64;
        let active_empty = !self.current_path.exists() as i64;
        debug!(
            "pushed {} entries, {} persisted, staged={} active_empty={}",
            entries.len(),
            count,
            staged_occupied,
            active_empty
        );
        Ok(count + staged_occupied - active_empty)
    }

    /// Remove and return the head entry.
    ///
    /// A malformed head line aborts the pop with the file untouched. An I/O
    /// failure during the rewrite rolls back to the original bytes before the
    /// error propagates.
    pub fn pop(&self) -> Result<Option<QueueEntry>> {
        let _guard = self.write_lock.lock().unwrap();

        let contents = fs::read_to_string(&self.path)?;
        let body = contents.trim_start();
        if body.trim().is_empty() {
            self.populated_tx.send_replace(false);
            return Ok(None);
        }

        let (head, rest) = match body.split_once('\n') {
            Some((head, rest)) => (head, rest),
            None => (body, ""),
        };

        // Parse before touching the file so corruption never loses data.
        let entry = QueueEntry::from_line(head.trim_end_matches('\r'))
            .map_err(|e| Error::StoreCorruption(e.to_string()))?;

        self.rewrite(rest, &contents)?;
        Ok(Some(entry))
    }

    /// Remove up to `n` head entries in one critical section, returning the
    /// parsed entries in queue order. Used by multi-skip. The same
    /// abort-and-restore rule as `pop` applies to every line removed.
    pub fn discard(&self, n: usize) -> Result<Vec<QueueEntry>> {
        let _guard = self.write_lock.lock().unwrap();

        let contents = fs::read_to_string(&self.path)?;
        let mut rest = contents.trim_start();
        let mut removed = Vec::new();

        while removed.len() < n && !rest.trim().is_empty() {
            let (head, tail) = match rest.split_once('\n') {
                Some((head, tail)) => (head, tail),
                None => (rest, ""),
            };
            let entry = QueueEntry::from_line(head.trim_end_matches('\r'))
                .map_err(|e| Error::StoreCorruption(e.to_string()))?;
            removed.push(entry);
            rest = tail.trim_start();
        }

        if !removed.is_empty() {
            self.rewrite(rest, &contents)?;
        } else if !has_content(&contents) {
            self.populated_tx.send_replace(false);
        }
        Ok(removed)
    }

    /// Best-effort unlocked listing for API snapshots. Malformed lines are
    /// skipped with a warning rather than failing the whole read.
    pub fn snapshot(&self) -> Result<Vec<QueueEntry>> {
        let contents = fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match QueueEntry::from_line(line.trim_end_matches('\r')) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("skipping malformed queue line: {}", e),
            }
        }
        Ok(entries)
    }

    /// Whether the store currently holds at least one entry.
    pub fn is_populated(&self) -> bool {
        *self.populated_tx.borrow()
    }

    /// Watch receiver for the populated signal; used by the scheduler to wake
    /// on push without waiting out its poll interval.
    pub fn watch_populated(&self) -> watch::Receiver<bool> {
        self.populated_tx.subscribe()
    }

    /// Rewrite the file with `rest`, restoring `original` on failure, and
    /// update the populated signal from what remains.
    fn rewrite(&self, rest: &str, original: &str) -> Result<()> {
        let remainder = rest.trim_start();
        let new_contents = if remainder.trim().is_empty() {
            String::new()
        } else if remainder.ends_with('\n') {
            remainder.to_string()
        } else {
            // Keep the file newline-terminated so appends stay line-aligned.
            format!("{}\n", remainder)
        };

        if let Err(e) = fs::write(&self.path, &new_contents) {
            let _ = fs::write(&self.path, original);
            return Err(e.into());
        }
        self.populated_tx.send_replace(!new_contents.is_empty());
        Ok(())
    }
}

fn has_content(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn entry(id: &str) -> QueueEntry {
        QueueEntry {
            id: id.to_string(),
            title: format!("title for {}", id),
            duration: Duration::from_secs(180),
            thumbnail: format!("{}.webp", id),
            start: 0,
            is_filler: false,
        }
    }

    fn store() -> (TempDir, QueueStore) {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn pop_returns_entries_in_push_order() {
        let (_dir, store) = store();
        store.push(&[entry("a"), entry("b")]).unwrap();
        store.push(&[entry("c")]).unwrap();

        assert_eq!(store.pop().unwrap().unwrap().id, "a");
        assert_eq!(store.pop().unwrap().unwrap().id, "b");
        assert_eq!(store.pop().unwrap().unwrap().id, "c");
        assert!(store.pop().unwrap().is_none());
        assert!(!store.is_populated());
    }

    #[test]
    fn position_reflects_slot_occupancy() {
        let (dir, store) = store();

        // Nothing active, nothing staged: the new head moves straight up.
        assert_eq!(store.push(&[entry("a")]).unwrap(), 0);

        // Active slot occupied: plain line count.
        fs::write(dir.path().join(CURRENT_FILE), b"media").unwrap();
        assert_eq!(store.push(&[entry("b")]).unwrap(), 2);

        // Staged slot also occupied: one more ahead of us.
        fs::write(dir.path().join(NEXT_FILE), b"media").unwrap();
        assert_eq!(store.push(&[entry("c")]).unwrap(), 4);
    }

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = QueueStore::open(dir.path()).unwrap();
            store.push(&[entry("a"), entry("b")]).unwrap();
        }
        let store = QueueStore::open(dir.path()).unwrap();
        assert!(store.is_populated());
        assert_eq!(store.pop().unwrap().unwrap().id, "a");
    }

    #[test]
    fn malformed_head_aborts_and_restores() {
        let (_dir, store) = store();
        store.push(&[entry("a")]).unwrap();

        let original = fs::read_to_string(store.path()).unwrap();
        fs::write(store.path(), format!("garbage-line\n{}", original)).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        let err = store.pop().unwrap_err();
        assert!(matches!(err, Error::StoreCorruption(_)));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn discard_returns_parsed_heads() {
        let (_dir, store) = store();
        store.push(&[entry("a"), entry("b"), entry("c")]).unwrap();

        let removed = store.discard(2).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].id, "a");
        assert_eq!(removed[1].id, "b");
        assert_eq!(store.pop().unwrap().unwrap().id, "c");
    }

    #[test]
    fn discard_past_end_stops_at_empty() {
        let (_dir, store) = store();
        store.push(&[entry("a")]).unwrap();
        let removed = store.discard(5).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(!store.is_populated());
    }

    #[test]
    fn populated_signal_wakes_watchers() {
        let (_dir, store) = store();
        let mut rx = store.watch_populated();
        assert!(!*rx.borrow_and_update());

        store.push(&[entry("a")]).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }

    #[test]
    fn snapshot_reads_without_consuming() {
        let (_dir, store) = store();
        store.push(&[entry("a"), entry("b")]).unwrap();
        let listed = store.snapshot().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(store.snapshot().unwrap().len(), 2);
        assert_eq!(store.pop().unwrap().unwrap().id, "a");
    }
}
