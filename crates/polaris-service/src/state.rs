//! Service state shared between the collector and the sync loop.
//!
//! The store is the only shared mutable resource; it sits behind a
//! `tokio::sync::Mutex` so every store call is an atomic unit. Everything
//! else here is bookkeeping for status reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use polaris_store::Store;
use polaris_types::Location;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::sync::SyncPhase;

/// Shared service state.
pub struct AppState {
    /// The pending-record store (wrapped in Mutex for thread-safe access).
    pub store: Mutex<Store>,
    /// Configuration the service was started with.
    pub config: Config,
    /// Counters and last-known values for status reporting.
    pub stats: ServiceStats,
}

impl AppState {
    /// Create new service state around an opened store.
    pub fn new(store: Store, config: Config) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(store),
            config,
            stats: ServiceStats::new(),
        })
    }

    /// Take a status snapshot, including the number of pending records.
    pub async fn status(&self) -> ServiceStatus {
        let pending = match self.store.lock().await.count() {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!("Failed to count pending records: {}", e);
                None
            }
        };

        let s = &self.stats;
        ServiceStatus {
            running: s.is_running(),
            started_at: s.started_at(),
            sync_phase: s.phase(),
            pending,
            records_stored: s.records_stored.load(Ordering::Relaxed),
            records_withheld: s.records_withheld.load(Ordering::Relaxed),
            records_failed: s.records_failed.load(Ordering::Relaxed),
            records_uploaded: s.records_uploaded.load(Ordering::Relaxed),
            sync_succeeded: s.sync_succeeded.load(Ordering::Relaxed),
            sync_failed: s.sync_failed.load(Ordering::Relaxed),
            last_sync_at: *s.last_sync_at.read().await,
            last_error: s.last_error.read().await.clone(),
            last_location: *s.last_location.read().await,
        }
    }
}

/// Counters and last-known values.
pub struct ServiceStats {
    running: AtomicBool,
    /// Unix timestamp of the last start, 0 if never started.
    started_at: AtomicU64,
    phase: AtomicU8,
    /// Records inserted into the store.
    pub records_stored: AtomicU64,
    /// Records not built because no location fix existed yet.
    pub records_withheld: AtomicU64,
    /// Records lost to store errors.
    pub records_failed: AtomicU64,
    /// Records acknowledged by the endpoint.
    pub records_uploaded: AtomicU64,
    /// Sync cycles that uploaded a batch.
    pub sync_succeeded: AtomicU64,
    /// Sync cycles that failed to upload or hit a store error.
    pub sync_failed: AtomicU64,
    pub last_sync_at: RwLock<Option<OffsetDateTime>>,
    pub last_error: RwLock<Option<String>>,
    pub last_location: RwLock<Option<Location>>,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicU64::new(0),
            phase: AtomicU8::new(SyncPhase::Idle as u8),
            records_stored: AtomicU64::new(0),
            records_withheld: AtomicU64::new(0),
            records_failed: AtomicU64::new(0),
            records_uploaded: AtomicU64::new(0),
            sync_succeeded: AtomicU64::new(0),
            sync_failed: AtomicU64::new(0),
            last_sync_at: RwLock::new(None),
            last_error: RwLock::new(None),
            last_location: RwLock::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the service as started or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    pub fn started_at(&self) -> Option<OffsetDateTime> {
        let ts = self.started_at.load(Ordering::SeqCst);
        if ts == 0 {
            None
        } else {
            OffsetDateTime::from_unix_timestamp(ts as i64).ok()
        }
    }

    pub fn phase(&self) -> SyncPhase {
        SyncPhase::from(self.phase.load(Ordering::SeqCst))
    }

    pub fn set_phase(&self, phase: SyncPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time service status.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub running: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    pub sync_phase: SyncPhase,
    /// Records waiting for upload, if the store could be read.
    pub pending: Option<u64>,
    pub records_stored: u64,
    pub records_withheld: u64,
    pub records_failed: u64,
    pub records_uploaded: u64,
    pub sync_succeeded: u64,
    pub sync_failed: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sync_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    pub last_location: Option<Location>,
}
