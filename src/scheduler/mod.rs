//! Periodic background sweeps.
//!
//! Two independent passes over the poll store: a short-interval expiration
//! sweep that finishes timed polls whose deadline has passed, and a daily
//! retention sweep purging records older than one week. Both run until the
//! cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::channels::ChatPlatform;
use crate::poll::{now_millis, WEEK_MS};
use crate::store::PollStore;

/// Drives the expiration and retention sweeps.
pub struct Scheduler {
    store: Arc<PollStore>,
    platform: Arc<dyn ChatPlatform>,
}

impl Scheduler {
    pub fn new(store: Arc<PollStore>, platform: Arc<dyn ChatPlatform>) -> Self {
        Self { store, platform }
    }

    /// Run both sweeps on their intervals until cancelled.
    pub async fn run(
        &self,
        expiration_every: Duration,
        retention_every: Duration,
        cancel: CancellationToken,
    ) {
        let mut expiration = tokio::time::interval(expiration_every);
        expiration.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut retention = tokio::time::interval(retention_every);
        retention.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = expiration.tick() => self.expiration_sweep().await,
                _ = retention.tick() => self.retention_sweep().await,
                _ = cancel.cancelled() => {
                    info!("scheduler stopped");
                    return;
                }
            }
        }
    }

    /// Finish every timed, unfinished poll whose deadline has passed.
    ///
    /// Each hit is re-checked against the clock and removed before
    /// finishing; a manual close racing on the same poll wins or loses at
    /// the removal, so exactly one actor runs the finish. One failing poll
    /// does not stop the sweep from processing the rest.
    pub async fn expiration_sweep(&self) {
        let now = now_millis();
        let due = match self
            .store
            .find_matching(|p| !p.has_finished && p.is_due(now))
            .await
        {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "expiration sweep query failed");
                return;
            }
        };

        for poll in due {
            // Defensive re-check against a concurrent manual close.
            if poll.has_finished || !poll.is_due(now) {
                continue;
            }
            match self.store.remove_by_id(poll.id).await {
                Ok(Some(mut poll)) => {
                    info!(poll_id = poll.id, "timed poll expired");
                    poll.finish(&*self.platform).await;
                }
                Ok(None) => {} // a manual close got there first
                Err(e) => {
                    warn!(poll_id = poll.id, error = %e, "failed to remove expired poll");
                }
            }
        }
    }

    /// Purge records older than the retention window, finished or not.
    pub async fn retention_sweep(&self) {
        let cutoff = now_millis() - WEEK_MS;
        let cutoff_utc = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(cutoff)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        info!(cutoff = %cutoff_utc, "cleaning the poll store");
        match self.store.remove_older_than(cutoff).await {
            Ok(removed) => info!(removed, "retention sweep done"),
            Err(e) => error!(error = %e, "retention sweep failed"),
        }
    }
}
