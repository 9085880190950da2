//! Platform-agnostic types for Polaris network measurement records.
//!
//! This crate provides the shared data model used by the store and the
//! background service:
//!
//! - [`Measurement`] - one observed serving-cell sample with optional location
//! - [`HostEvent`] and [`CellInfo`] - typed events delivered by the host platform
//! - [`wire`] - the JSON body posted to the collection endpoint
//!
//! # Example
//!
//! ```
//! use polaris_types::{Location, Measurement, NetworkType, Radio};
//!
//! let m = Measurement {
//!     timestamp: 1_700_000_000_000,
//!     location: Some(Location::new(52.52, 13.40)),
//!     plmn_id: Some("26201".into()),
//!     tac: Some(4711),
//!     cell_id: Some(123_456),
//!     arfcn: Some(1300),
//!     radio: Radio::Gsm { rxlev: Some(-71) },
//! };
//! assert_eq!(m.network_type(), Some(NetworkType::Gsm));
//! assert_eq!(m.rsrp(), None);
//! ```

pub mod error;
pub mod event;
pub mod types;
#[cfg(feature = "serde")]
pub mod wire;

pub use error::{ParseError, ParseResult};
pub use event::{CellInfo, GsmCell, HostEvent, LteCell, Permission, UNAVAILABLE, WcdmaCell};
pub use types::{Location, Measurement, NetworkType, Radio, now_millis};
