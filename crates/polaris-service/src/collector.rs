//! Event-driven measurement collector.
//!
//! Consumes host events, remembers the most recent location fix, and turns
//! every registered cell of a cell-info event into a stored record.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use polaris_types::{
    CellInfo, GsmCell, HostEvent, Location, LteCell, Measurement, Permission, Radio, UNAVAILABLE,
    WcdmaCell, now_millis,
};

use crate::events::EventReceiver;
use crate::state::AppState;

/// Why the collector stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorExit {
    /// The cancellation token fired.
    Cancelled,
    /// Every event sender was dropped.
    SourceClosed,
    /// A required permission was revoked; the service must stop.
    PermissionDenied(Permission),
}

/// Background collector that stores one record per registered cell.
pub struct Collector {
    state: Arc<AppState>,
    require_location_fix: bool,
    last_location: Option<Location>,
}

impl Collector {
    /// Create a new collector using the state's collector configuration.
    pub fn new(state: Arc<AppState>) -> Self {
        let require_location_fix = state.config.collector.require_location_fix;
        Self {
            state,
            require_location_fix,
            last_location: None,
        }
    }

    /// Most recent location fix, if any.
    pub fn last_location(&self) -> Option<Location> {
        self.last_location
    }

    /// Process events until cancelled, the source closes, or a permission is revoked.
    pub async fn run(mut self, mut events: EventReceiver, cancel: CancellationToken) -> CollectorExit {
        info!(
            "Collector started (require_location_fix: {})",
            self.require_location_fix
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Collector cancelled, shutting down");
                    return CollectorExit::Cancelled;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("Event source closed, collector stopping");
                        return CollectorExit::SourceClosed;
                    };
                    if let Some(exit) = self.handle(event).await {
                        return exit;
                    }
                }
            }
        }
    }

    /// Handle a single host event. Returns `Some` if the collector must stop.
    pub async fn handle(&mut self, event: HostEvent) -> Option<CollectorExit> {
        match event {
            HostEvent::Location(location) => {
                self.on_location(location).await;
                None
            }
            HostEvent::CellInfoChanged { cells } => {
                self.on_cell_info(&cells).await;
                None
            }
            HostEvent::PermissionRevoked { permission } => {
                warn!("{} permission revoked, stopping collection", permission);
                self.state
                    .stats
                    .record_error(format!("{} permission revoked", permission))
                    .await;
                Some(CollectorExit::PermissionDenied(permission))
            }
            _ => {
                debug!("Ignoring unsupported host event");
                None
            }
        }
    }

    async fn on_location(&mut self, location: Location) {
        if !location.is_valid() {
            warn!(
                "Ignoring invalid location fix ({}, {})",
                location.latitude, location.longitude
            );
            return;
        }

        debug!(
            "New location: lat {}, lon {}",
            location.latitude, location.longitude
        );
        self.last_location = Some(location);
        *self.state.stats.last_location.write().await = Some(location);
    }

    /// Build and store records for a cell-info event. Returns the number stored.
    async fn on_cell_info(&self, cells: &[CellInfo]) -> usize {
        let stats = &self.state.stats;

        if self.require_location_fix && self.last_location.is_none() {
            let withheld = cells.iter().filter(|c| c.is_registered()).count() as u64;
            debug!("No location fix yet, withholding {} record(s)", withheld);
            stats.records_withheld.fetch_add(withheld, Ordering::Relaxed);
            return 0;
        }

        let records = build_records(cells, self.last_location, now_millis());
        if records.is_empty() {
            debug!("Cell info changed with no registered cells");
            return 0;
        }

        let mut stored = 0;
        let mut last_failure = None;
        let store = self.state.store.lock().await;
        for record in &records {
            match store.insert(record) {
                Ok(id) => {
                    stored += 1;
                    debug!(
                        "Stored {} record {}",
                        record.network_type().map_or("unknown", |t| t.as_str()),
                        id
                    );
                }
                Err(e) => {
                    error!("Failed to store record: {}", e);
                    stats.records_failed.fetch_add(1, Ordering::Relaxed);
                    last_failure = Some(e);
                }
            }
        }
        drop(store);

        if let Some(e) = last_failure {
            stats.record_error(format!("store insert failed: {}", e)).await;
        }
        stats.records_stored.fetch_add(stored as u64, Ordering::Relaxed);
        stored
    }
}

/// Build one record per registered, supported cell.
///
/// All records of one event share `timestamp` and `location`.
pub fn build_records(
    cells: &[CellInfo],
    location: Option<Location>,
    timestamp: i64,
) -> Vec<Measurement> {
    cells
        .iter()
        .filter(|cell| cell.is_registered())
        .filter_map(|cell| measurement_from_cell(cell, location, timestamp))
        .collect()
}

/// Map a single cell descriptor to a record. Unsupported technologies yield `None`.
pub fn measurement_from_cell(
    cell: &CellInfo,
    location: Option<Location>,
    timestamp: i64,
) -> Option<Measurement> {
    let m = match cell {
        CellInfo::Lte(c) => from_lte(c, location, timestamp),
        CellInfo::Wcdma(c) => from_wcdma(c, location, timestamp),
        CellInfo::Gsm(c) => from_gsm(c, location, timestamp),
        CellInfo::Unsupported => return None,
    };
    Some(m)
}

fn from_lte(c: &LteCell, location: Option<Location>, timestamp: i64) -> Measurement {
    Measurement {
        timestamp,
        location,
        plmn_id: plmn_id(c.mcc.as_deref(), c.mnc.as_deref()),
        tac: available(c.tac),
        cell_id: available(c.ci),
        arfcn: available(c.earfcn),
        radio: Radio::Lte {
            rsrp: available(c.rsrp),
            rsrq: available(c.rsrq),
            band: band_label(&c.bands),
        },
    }
}

fn from_wcdma(c: &WcdmaCell, location: Option<Location>, timestamp: i64) -> Measurement {
    Measurement {
        timestamp,
        location,
        plmn_id: plmn_id(c.mcc.as_deref(), c.mnc.as_deref()),
        tac: available(c.lac),
        cell_id: available(c.cid),
        arfcn: available(c.uarfcn),
        radio: Radio::Wcdma {
            rscp: available(c.dbm),
            ecno: available(c.ec_no),
        },
    }
}

fn from_gsm(c: &GsmCell, location: Option<Location>, timestamp: i64) -> Measurement {
    Measurement {
        timestamp,
        location,
        plmn_id: plmn_id(c.mcc.as_deref(), c.mnc.as_deref()),
        tac: available(c.lac),
        cell_id: available(c.cid),
        arfcn: available(c.arfcn),
        radio: Radio::Gsm {
            rxlev: available(c.dbm),
        },
    }
}

/// Treat the platform's "unavailable" sentinel as absent.
fn available(value: Option<i32>) -> Option<i32> {
    value.filter(|&v| v != UNAVAILABLE)
}

fn plmn_id(mcc: Option<&str>, mnc: Option<&str>) -> Option<String> {
    match (mcc, mnc) {
        (Some(mcc), Some(mnc)) if !mcc.is_empty() && !mnc.is_empty() => {
            Some(format!("{}{}", mcc, mnc))
        }
        _ => None,
    }
}

fn band_label(bands: &[i32]) -> Option<String> {
    if bands.is_empty() {
        return None;
    }
    Some(
        bands
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use polaris_store::Store;
    use polaris_types::NetworkType;

    fn lte_cell(registered: bool) -> CellInfo {
        CellInfo::Lte(LteCell {
            registered,
            mcc: Some("262".to_string()),
            mnc: Some("01".to_string()),
            tac: Some(4711),
            ci: Some(123_456),
            earfcn: Some(1300),
            bands: vec![3],
            rsrp: Some(-95),
            rsrq: Some(-11),
        })
    }

    fn wcdma_cell() -> CellInfo {
        CellInfo::Wcdma(WcdmaCell {
            registered: true,
            mcc: Some("262".to_string()),
            mnc: Some("02".to_string()),
            lac: Some(21),
            cid: Some(5501),
            uarfcn: Some(10_700),
            dbm: Some(-80),
            ec_no: Some(-7),
        })
    }

    fn gsm_cell() -> CellInfo {
        CellInfo::Gsm(GsmCell {
            registered: true,
            mcc: Some("262".to_string()),
            mnc: Some("03".to_string()),
            lac: Some(12),
            cid: Some(34),
            arfcn: Some(60),
            dbm: Some(-71),
        })
    }

    fn state_with(require_location_fix: bool) -> Arc<AppState> {
        let mut config = Config::default();
        config.collector.require_location_fix = require_location_fix;
        AppState::new(Store::open_in_memory().unwrap(), config)
    }

    // --- Mapping tests ---

    #[test]
    fn test_lte_without_location() {
        let m = measurement_from_cell(&lte_cell(true), None, 1000).unwrap();
        assert_eq!(m.network_type(), Some(NetworkType::Lte));
        assert_eq!(m.latitude(), None);
        assert_eq!(m.longitude(), None);
        assert_eq!(m.rsrp(), Some(-95));
        assert_eq!(m.rsrq(), Some(-11));
        assert_eq!(m.rscp(), None);
        assert_eq!(m.ecno(), None);
        assert_eq!(m.rxlev(), None);
        assert_eq!(m.plmn_id.as_deref(), Some("26201"));
        assert_eq!(m.tac, Some(4711));
        assert_eq!(m.cell_id, Some(123_456));
        assert_eq!(m.arfcn, Some(1300));
        assert_eq!(m.band(), Some("3"));
        assert_eq!(m.timestamp, 1000);
    }

    #[test]
    fn test_wcdma_mapping() {
        let location = Location::new(52.52, 13.40);
        let m = measurement_from_cell(&wcdma_cell(), Some(location), 1000).unwrap();
        assert_eq!(m.network_type(), Some(NetworkType::Wcdma));
        assert_eq!(m.rscp(), Some(-80));
        assert_eq!(m.ecno(), Some(-7));
        assert_eq!(m.rsrp(), None);
        assert_eq!(m.rsrq(), None);
        assert_eq!(m.rxlev(), None);
        assert_eq!(m.band(), None);
        assert_eq!(m.tac, Some(21));
        assert_eq!(m.cell_id, Some(5501));
        assert_eq!(m.arfcn, Some(10_700));
        assert_eq!(m.location, Some(location));
    }

    #[test]
    fn test_gsm_mapping() {
        let m = measurement_from_cell(&gsm_cell(), None, 1000).unwrap();
        assert_eq!(m.network_type(), Some(NetworkType::Gsm));
        assert_eq!(m.rxlev(), Some(-71));
        assert_eq!(m.rsrp(), None);
        assert_eq!(m.rscp(), None);
        assert_eq!(m.tac, Some(12));
        assert_eq!(m.cell_id, Some(34));
        assert_eq!(m.arfcn, Some(60));
        assert_eq!(m.plmn_id.as_deref(), Some("26203"));
    }

    #[test]
    fn test_unregistered_and_unsupported_cells_skipped() {
        let cells = vec![lte_cell(false), CellInfo::Unsupported];
        assert!(build_records(&cells, None, 1000).is_empty());
    }

    #[test]
    fn test_build_records_one_per_registered_cell() {
        let cells = vec![lte_cell(true), lte_cell(false), gsm_cell()];
        let records = build_records(&cells, None, 1000);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].network_type(), Some(NetworkType::Lte));
        assert_eq!(records[1].network_type(), Some(NetworkType::Gsm));
        assert!(records.iter().all(|r| r.timestamp == 1000));
    }

    #[test]
    fn test_unavailable_sentinel_maps_to_absent() {
        let cell = CellInfo::Lte(LteCell {
            registered: true,
            tac: Some(UNAVAILABLE),
            rsrp: Some(UNAVAILABLE),
            rsrq: Some(-11),
            ..Default::default()
        });
        let m = measurement_from_cell(&cell, None, 1000).unwrap();
        assert_eq!(m.tac, None);
        assert_eq!(m.rsrp(), None);
        assert_eq!(m.rsrq(), Some(-11));
        assert_eq!(m.plmn_id, None);
        assert_eq!(m.band(), None);
    }

    #[test]
    fn test_plmn_requires_both_parts() {
        assert_eq!(plmn_id(Some("262"), None), None);
        assert_eq!(plmn_id(None, Some("01")), None);
        assert_eq!(plmn_id(Some(""), Some("01")), None);
        assert_eq!(plmn_id(Some("310"), Some("260")).as_deref(), Some("310260"));
    }

    #[test]
    fn test_band_label() {
        assert_eq!(band_label(&[]), None);
        assert_eq!(band_label(&[20]).as_deref(), Some("20"));
        assert_eq!(band_label(&[3, 7, 20]).as_deref(), Some("3,7,20"));
    }

    // --- Event handling tests ---

    #[tokio::test]
    async fn test_cell_event_stores_records() {
        let state = state_with(false);
        let mut collector = Collector::new(Arc::clone(&state));

        let exit = collector
            .handle(HostEvent::CellInfoChanged {
                cells: vec![lte_cell(true), gsm_cell()],
            })
            .await;
        assert_eq!(exit, None);

        let records = state.store.lock().await.get_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].id, records[1].id);
        assert_eq!(state.stats.records_stored.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_location_applied_to_later_records() {
        let state = state_with(false);
        let mut collector = Collector::new(Arc::clone(&state));

        collector
            .handle(HostEvent::Location(Location::new(1.0, 2.0)))
            .await;
        collector
            .handle(HostEvent::Location(Location::new(3.0, 4.0)))
            .await;
        collector
            .handle(HostEvent::CellInfoChanged {
                cells: vec![gsm_cell()],
            })
            .await;

        assert_eq!(collector.last_location(), Some(Location::new(3.0, 4.0)));
        let records = state.store.lock().await.get_all().unwrap();
        assert_eq!(records[0].measurement.latitude(), Some(3.0));
        assert_eq!(records[0].measurement.longitude(), Some(4.0));
    }

    #[tokio::test]
    async fn test_invalid_location_ignored() {
        let state = state_with(false);
        let mut collector = Collector::new(Arc::clone(&state));

        collector
            .handle(HostEvent::Location(Location::new(1.0, 2.0)))
            .await;
        collector
            .handle(HostEvent::Location(Location::new(f64::NAN, 2.0)))
            .await;

        assert_eq!(collector.last_location(), Some(Location::new(1.0, 2.0)));
    }

    #[tokio::test]
    async fn test_require_fix_withholds_until_location() {
        let state = state_with(true);
        let mut collector = Collector::new(Arc::clone(&state));
        let event = HostEvent::CellInfoChanged {
            cells: vec![lte_cell(true), lte_cell(false)],
        };

        collector.handle(event.clone()).await;
        assert_eq!(state.store.lock().await.count().unwrap(), 0);
        assert_eq!(state.stats.records_withheld.load(Ordering::Relaxed), 1);

        collector
            .handle(HostEvent::Location(Location::new(1.0, 2.0)))
            .await;
        collector.handle(event).await;

        let records = state.store.lock().await.get_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].measurement.latitude(), Some(1.0));
    }

    #[tokio::test]
    async fn test_permission_revoked_stops() {
        let state = state_with(false);
        let mut collector = Collector::new(Arc::clone(&state));

        let exit = collector
            .handle(HostEvent::PermissionRevoked {
                permission: Permission::Location,
            })
            .await;
        assert_eq!(
            exit,
            Some(CollectorExit::PermissionDenied(Permission::Location))
        );
        assert!(state.status().await.last_error.is_some());
    }

    #[tokio::test]
    async fn test_run_ends_when_source_closes() {
        let state = state_with(false);
        let (tx, rx) = crate::events::event_channel(8);
        tx.dispatch(HostEvent::CellInfoChanged {
            cells: vec![wcdma_cell()],
        });
        drop(tx);

        let exit = Collector::new(Arc::clone(&state))
            .run(rx, CancellationToken::new())
            .await;
        assert_eq!(exit, CollectorExit::SourceClosed);
        assert_eq!(state.store.lock().await.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let state = state_with(false);
        let (_tx, rx) = crate::events::event_channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let exit = Collector::new(state).run(rx, cancel).await;
        assert_eq!(exit, CollectorExit::Cancelled);
    }

    #[tokio::test]
    async fn test_insert_failure_counted_and_lock_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polaris.db");
        let state = AppState::new(Store::open(&path).unwrap(), Config::default());
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute("DROP TABLE network_logs", [])
            .unwrap();

        // Hold the error slot so the collector parks while reporting.
        let error_slot = state.stats.last_error.write().await;
        let handle = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let mut collector = Collector::new(state);
                collector
                    .handle(HostEvent::CellInfoChanged {
                        cells: vec![lte_cell(true), gsm_cell()],
                    })
                    .await
            })
        };

        while state.stats.records_failed.load(Ordering::Relaxed) < 2 {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;
        assert!(state.store.try_lock().is_ok());

        drop(error_slot);
        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(state.stats.records_stored.load(Ordering::Relaxed), 0);
        assert!(
            state
                .status()
                .await
                .last_error
                .unwrap()
                .starts_with("store insert failed")
        );
    }
}
