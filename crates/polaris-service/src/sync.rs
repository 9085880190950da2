//! Periodic upload of pending records.
//!
//! Every interval the loop drains the store, submits the batch, and on
//! success deletes exactly the ids it drained. A failed upload leaves the
//! rows in place; the next tick is the retry.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use polaris_store::RecordQuery;
use polaris_types::wire::WireRecord;

use crate::state::AppState;
use crate::uplink::Uplink;

/// Where the sync loop is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SyncPhase {
    Idle = 0,
    Draining = 1,
    Sending = 2,
    Reconciling = 3,
}

impl From<u8> for SyncPhase {
    fn from(value: u8) -> Self {
        match value {
            1 => SyncPhase::Draining,
            2 => SyncPhase::Sending,
            3 => SyncPhase::Reconciling,
            _ => SyncPhase::Idle,
        }
    }
}

/// Result of a single sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Nothing pending; no request was made.
    Empty,
    /// The endpoint accepted the batch and the drained rows were deleted.
    Sent { count: usize, deleted: usize },
    /// The upload failed; all rows were kept.
    Rejected { count: usize },
    /// A store operation failed; the cycle was skipped.
    StoreFailed,
}

/// Timer-driven uploader.
pub struct SyncLoop<U: ?Sized> {
    state: Arc<AppState>,
    uplink: Arc<U>,
    interval: Duration,
    batch_limit: Option<u32>,
}

impl<U: Uplink + ?Sized> SyncLoop<U> {
    /// Create a sync loop using the state's sync configuration.
    pub fn new(state: Arc<AppState>, uplink: Arc<U>) -> Self {
        let interval = state.config.sync.interval();
        let batch_limit = state.config.sync.batch_limit;
        Self {
            state,
            uplink,
            interval,
            batch_limit,
        }
    }

    /// Override the cycle interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run cycles until cancelled. The first cycle runs immediately.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "Sync loop started (interval: {:?}, batch limit: {:?})",
            self.interval, self.batch_limit
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Sync loop cancelled, shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    // Dropping an in-flight cycle here deletes nothing: rows are
                    // only removed after the upload has returned true.
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            info!("Sync loop cancelled during a cycle, pending rows kept");
                            break;
                        }
                        _ = self.run_cycle() => {}
                    }
                }
            }
        }

        self.state.stats.set_phase(SyncPhase::Idle);
    }

    /// Run one Draining → Sending → Reconciling cycle.
    pub async fn run_cycle(&self) -> SyncOutcome {
        let outcome = self.cycle().await;
        self.state.stats.set_phase(SyncPhase::Idle);
        outcome
    }

    async fn cycle(&self) -> SyncOutcome {
        let stats = &self.state.stats;

        stats.set_phase(SyncPhase::Draining);
        let mut query = RecordQuery::new();
        if let Some(limit) = self.batch_limit {
            query = query.limit(limit);
        }
        let result = self.state.store.lock().await.query(&query);
        let drained = match result {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to read pending records: {}", e);
                stats.sync_failed.fetch_add(1, Ordering::Relaxed);
                stats.record_error(format!("store read failed: {}", e)).await;
                return SyncOutcome::StoreFailed;
            }
        };

        if drained.is_empty() {
            debug!("Nothing to sync");
            return SyncOutcome::Empty;
        }

        let count = drained.len();
        let ids: Vec<i64> = drained.iter().map(|r| r.id).collect();
        let logs: Vec<WireRecord> = drained.iter().map(|r| r.to_wire()).collect();
        drop(drained);

        stats.set_phase(SyncPhase::Sending);
        debug!("Uploading {} record(s)", count);
        let accepted = self.uplink.submit(&logs).await;

        stats.set_phase(SyncPhase::Reconciling);
        if !accepted {
            warn!("Upload of {} record(s) failed, will retry next cycle", count);
            stats.sync_failed.fetch_add(1, Ordering::Relaxed);
            stats
                .record_error(format!("upload of {} record(s) failed", count))
                .await;
            return SyncOutcome::Rejected { count };
        }

        let result = self.state.store.lock().await.delete_by_ids(&ids);
        let deleted = match result {
            Ok(deleted) => deleted,
            Err(e) => {
                // Uploaded but still stored: the next cycle resends them.
                error!("Failed to delete {} uploaded record(s): {}", count, e);
                stats.sync_failed.fetch_add(1, Ordering::Relaxed);
                stats.record_error(format!("store delete failed: {}", e)).await;
                return SyncOutcome::StoreFailed;
            }
        };

        info!("Uploaded {} record(s), deleted {}", count, deleted);
        stats.sync_succeeded.fetch_add(1, Ordering::Relaxed);
        stats
            .records_uploaded
            .fetch_add(count as u64, Ordering::Relaxed);
        *stats.last_sync_at.write().await = Some(OffsetDateTime::now_utc());

        SyncOutcome::Sent { count, deleted }
    }
}
