//! Host events consumed by the collector.
//!
//! The host platform (location provider, telephony stack, permission manager)
//! is modelled as a producer of [`HostEvent`]s. With the `serde` feature,
//! events are JSON objects tagged by `"type"`:
//!
//! ```json
//! {"type":"location","latitude":52.52,"longitude":13.40}
//! {"type":"cell_info_changed","cells":[
//!     {"technology":"LTE","registered":true,"mcc":"262","mnc":"01",
//!      "tac":4711,"ci":123456,"earfcn":1300,"bands":[3],"rsrp":-95,"rsrq":-11}]}
//! {"type":"permission_revoked","permission":"location"}
//! ```

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::{Location, NetworkType};

/// Value reported by the platform for an integer field it could not measure.
pub const UNAVAILABLE: i32 = i32::MAX;

/// Runtime permission gating one of the host subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Permission {
    /// Fine location access.
    Location,
    /// Read access to telephony cell information.
    Telephony,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Location => write!(f, "location"),
            Permission::Telephony => write!(f, "telephony"),
        }
    }
}

/// An event delivered by the host platform.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
#[non_exhaustive]
pub enum HostEvent {
    /// A new location fix.
    Location(Location),
    /// The set of visible cells changed.
    ///
    /// A descriptor that fails to parse becomes [`CellInfo::Unsupported`]
    /// instead of rejecting the whole event.
    CellInfoChanged {
        #[cfg_attr(feature = "serde", serde(deserialize_with = "lenient_cells"))]
        cells: Vec<CellInfo>,
    },
    /// A permission was withdrawn while running.
    PermissionRevoked { permission: Permission },
}

#[cfg(feature = "serde")]
fn lenient_cells<'de, D>(deserializer: D) -> Result<Vec<CellInfo>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Cell(CellInfo),
        Malformed(serde::de::IgnoredAny),
    }

    let entries = Vec::<Entry>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Entry::Cell(cell) => cell,
            Entry::Malformed(_) => {
                tracing::debug!("Skipping malformed cell descriptor at index {}", index);
                CellInfo::Unsupported
            }
        })
        .collect())
}

/// A cell descriptor from a cell-information event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "technology", rename_all = "UPPERCASE")
)]
pub enum CellInfo {
    Lte(LteCell),
    Wcdma(WcdmaCell),
    Gsm(GsmCell),
    /// Any technology the collector does not record (NR, CDMA, TD-SCDMA).
    #[cfg_attr(feature = "serde", serde(other))]
    Unsupported,
}

impl CellInfo {
    /// Whether the device is camped on this cell.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        match self {
            CellInfo::Lte(c) => c.registered,
            CellInfo::Wcdma(c) => c.registered,
            CellInfo::Gsm(c) => c.registered,
            CellInfo::Unsupported => false,
        }
    }

    #[must_use]
    pub fn network_type(&self) -> Option<NetworkType> {
        match self {
            CellInfo::Lte(_) => Some(NetworkType::Lte),
            CellInfo::Wcdma(_) => Some(NetworkType::Wcdma),
            CellInfo::Gsm(_) => Some(NetworkType::Gsm),
            CellInfo::Unsupported => None,
        }
    }
}

/// LTE cell identity and signal strength.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct LteCell {
    pub registered: bool,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub tac: Option<i32>,
    pub ci: Option<i32>,
    pub earfcn: Option<i32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bands: Vec<i32>,
    pub rsrp: Option<i32>,
    pub rsrq: Option<i32>,
}

/// WCDMA cell identity and signal strength.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct WcdmaCell {
    pub registered: bool,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub lac: Option<i32>,
    pub cid: Option<i32>,
    pub uarfcn: Option<i32>,
    /// Received signal code power in dBm.
    pub dbm: Option<i32>,
    /// Energy per chip to noise ratio in dB.
    pub ec_no: Option<i32>,
}

/// GSM cell identity and signal strength.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct GsmCell {
    pub registered: bool,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub lac: Option<i32>,
    pub cid: Option<i32>,
    pub arfcn: Option<i32>,
    /// Received signal level in dBm.
    pub dbm: Option<i32>,
}
