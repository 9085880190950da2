//! Background collector and uploader for Polaris network measurements.
//!
//! This crate provides a service that:
//! - Consumes host events (location fixes, cell-info changes, permission changes)
//! - Stores one record per registered serving cell in the local database
//! - Periodically uploads pending records to the collection endpoint and
//!   deletes them once accepted
//!
//! # Upload endpoint
//!
//! - `POST <endpoint>/api/v1/panel/submitLogs` with `{ "logs": [ ... ] }`
//!
//! Any 2xx response counts as accepted. Anything else, including transport
//! errors and timeouts, leaves the records in place for the next cycle.
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/polaris/service.toml`:
//!
//! ```toml
//! [uplink]
//! endpoint = "http://192.168.1.10:3000"
//! timeout_secs = 30
//!
//! [storage]
//! path = "~/.local/share/polaris/polaris.db"
//!
//! [sync]
//! interval_secs = 10
//!
//! [collector]
//! require_location_fix = false
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use polaris_service::{AppState, Config, HttpUplink, Monitor, Permissions, event_channel};
//! use polaris_store::Store;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! let store = Store::open(&config.storage.path)?;
//! let uplink = Arc::new(HttpUplink::new(&config.uplink)?);
//! let (events, receiver) = event_channel(config.collector.event_buffer);
//! let state = AppState::new(store, config);
//!
//! let monitor = Monitor::start(state, uplink, receiver, Permissions::granted())?;
//! // Feed `events` from the host platform...
//! # drop(events);
//! let status = monitor.shutdown().await;
//! println!("uploaded {} record(s)", status.records_uploaded);
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod events;
pub mod monitor;
pub mod source;
pub mod state;
pub mod sync;
pub mod uplink;

pub use collector::{Collector, CollectorExit};
pub use config::{
    CollectorConfig, Config, ConfigError, StorageConfig, SyncConfig, UplinkConfig,
    ValidationError,
};
pub use events::{EventReceiver, EventSender, event_channel};
pub use monitor::{Monitor, MonitorError, Permissions};
pub use state::{AppState, ServiceStatus};
pub use sync::{SyncLoop, SyncOutcome, SyncPhase};
pub use uplink::{HttpUplink, Uplink, UplinkError};
