//! Durable poll store.
//!
//! An id -> record map persisted as a single JSON snapshot on disk. Writes
//! are atomic (temp file + rename) and the snapshot is reloaded on open, so
//! open polls survive a process restart. Mutations mark the store dirty; a
//! periodic autosave flushes dirty state and a final save runs on shutdown.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::poll::Poll;

/// Errors surfaced by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt store file: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Poll {0} already exists")]
    DuplicateId(u64),
}

struct StoreInner {
    polls: HashMap<u64, Poll>,
    dirty: bool,
}

/// File-backed poll store.
pub struct PollStore {
    path: PathBuf,
    inner: RwLock<StoreInner>,
}

impl PollStore {
    /// Open the store, loading any existing snapshot. A missing file is an
    /// empty store; a corrupt file is an error (the operator must decide).
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let polls = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let records: Vec<Poll> = serde_json::from_slice(&bytes)?;
                records.into_iter().map(|p| (p.id, p)).collect()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), polls = polls.len(), "poll store opened");
        Ok(Self {
            path,
            inner: RwLock::new(StoreInner {
                polls,
                dirty: false,
            }),
        })
    }

    /// Insert a new poll. Duplicate ids are rejected.
    pub async fn insert(&self, poll: Poll) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.polls.contains_key(&poll.id) {
            return Err(StoreError::DuplicateId(poll.id));
        }
        inner.polls.insert(poll.id, poll);
        inner.dirty = true;
        Ok(())
    }

    /// Point lookup by id.
    pub async fn find_by_id(&self, id: u64) -> Result<Option<Poll>, StoreError> {
        Ok(self.inner.read().polls.get(&id).cloned())
    }

    /// Bulk lookup by predicate.
    pub async fn find_matching<F>(&self, predicate: F) -> Result<Vec<Poll>, StoreError>
    where
        F: Fn(&Poll) -> bool,
    {
        Ok(self
            .inner
            .read()
            .polls
            .values()
            .filter(|p| predicate(p))
            .cloned()
            .collect())
    }

    /// Remove a poll, returning the removed record.
    ///
    /// Removal is the authoritative "closed" signal: when a manual close and
    /// the expiration sweep race, whichever caller gets `Some` back owns the
    /// finish transition; the loser sees `None`.
    pub async fn remove_by_id(&self, id: u64) -> Result<Option<Poll>, StoreError> {
        let mut inner = self.inner.write();
        let removed = inner.polls.remove(&id);
        if removed.is_some() {
            inner.dirty = true;
        }
        Ok(removed)
    }

    /// Remove every record created before `cutoff` (epoch ms), regardless of
    /// state. Returns the number removed.
    pub async fn remove_older_than(&self, cutoff: i64) -> Result<usize, StoreError> {
        let mut inner = self.inner.write();
        let before = inner.polls.len();
        inner.polls.retain(|_, p| p.created_on >= cutoff);
        let removed = before - inner.polls.len();
        if removed > 0 {
            inner.dirty = true;
        }
        Ok(removed)
    }

    /// Number of stored polls.
    pub fn len(&self) -> usize {
        self.inner.read().polls.len()
    }

    /// Whether the store holds no polls.
    pub fn is_empty(&self) -> bool {
        self.inner.read().polls.is_empty()
    }

    /// Flush the snapshot to disk if anything changed since the last save.
    pub async fn save(&self) -> Result<(), StoreError> {
        let snapshot = {
            let mut inner = self.inner.write();
            if !inner.dirty {
                return Ok(());
            }
            inner.dirty = false;
            inner.polls.values().cloned().collect::<Vec<Poll>>()
        };

        if let Err(e) = self.write_snapshot(&snapshot).await {
            // The snapshot never hit disk; re-mark so the next save retries.
            self.inner.write().dirty = true;
            return Err(e);
        }
        debug!(path = %self.path.display(), polls = snapshot.len(), "poll store saved");
        Ok(())
    }

    async fn write_snapshot(&self, snapshot: &[Poll]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Periodic autosave loop. Flushes dirty state every `period` and once
    /// more on cancellation.
    pub async fn run_autosave(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.save().await {
                        error!(error = %e, "poll store autosave failed");
                    }
                }
                _ = cancel.cancelled() => {
                    if let Err(e) = self.save().await {
                        error!(error = %e, "final poll store save failed");
                    }
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::{now_millis, Poll};

    fn sample_poll(id: u64) -> Poll {
        Poll::create(id, "g1", "c1", "Q?", vec![], 0).unwrap()
    }

    #[tokio::test]
    async fn insert_find_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = PollStore::open(dir.path().join("polls.json")).await.unwrap();

        store.insert(sample_poll(1)).await.unwrap();
        assert!(store.find_by_id(1).await.unwrap().is_some());
        assert!(store.find_by_id(2).await.unwrap().is_none());

        let removed = store.remove_by_id(1).await.unwrap();
        assert_eq!(removed.unwrap().id, 1);
        assert!(store.remove_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = PollStore::open(dir.path().join("polls.json")).await.unwrap();

        store.insert(sample_poll(1)).await.unwrap();
        let err = store.insert(sample_poll(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(1)));
    }

    #[tokio::test]
    async fn find_matching_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = PollStore::open(dir.path().join("polls.json")).await.unwrap();

        store.insert(sample_poll(1)).await.unwrap();
        let mut timed = Poll::create(2, "g1", "c1", "Q?", vec![], 5_000).unwrap();
        timed.finish_time = 100;
        store.insert(timed).await.unwrap();

        let hits = store.find_matching(|p| p.is_timed).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 2);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polls.json");

        let store = PollStore::open(&path).await.unwrap();
        let mut poll = sample_poll(42);
        poll.record_vote("alice", 1).unwrap();
        store.insert(poll).await.unwrap();
        store.save().await.unwrap();

        let reopened = PollStore::open(&path).await.unwrap();
        let poll = reopened.find_by_id(42).await.unwrap().unwrap();
        assert_eq!(poll.votes.get("alice"), Some(&1));
    }

    #[tokio::test]
    async fn save_skips_clean_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polls.json");

        let store = PollStore::open(&path).await.unwrap();
        store.save().await.unwrap();
        // Nothing was dirty, so no file appears.
        assert!(!path.exists());

        store.insert(sample_poll(1)).await.unwrap();
        store.save().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn retention_removes_only_old_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = PollStore::open(dir.path().join("polls.json")).await.unwrap();
        let now = now_millis();

        let mut old = sample_poll(1);
        old.created_on = now - 10_000;
        old.has_finished = true; // age alone decides, state is irrelevant
        store.insert(old).await.unwrap();

        let mut fresh = sample_poll(2);
        fresh.created_on = now;
        store.insert(fresh).await.unwrap();

        let removed = store.remove_older_than(now - 5_000).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.find_by_id(1).await.unwrap().is_none());
        assert!(store.find_by_id(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = PollStore::open(dir.path().join("absent.json")).await.unwrap();
        assert!(store.is_empty());
    }
}
