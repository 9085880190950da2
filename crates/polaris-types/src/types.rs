//! Core types for network measurement records.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ParseError;

/// Radio access technology of a serving cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum NetworkType {
    /// 4G LTE.
    Lte,
    /// 3G UMTS / WCDMA.
    Wcdma,
    /// 2G GSM.
    Gsm,
}

impl NetworkType {
    /// The label used in the database and on the wire.
    ///
    /// ```
    /// use polaris_types::NetworkType;
    ///
    /// assert_eq!(NetworkType::Wcdma.as_str(), "WCDMA");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Lte => "LTE",
            NetworkType::Wcdma => "WCDMA",
            NetworkType::Gsm => "GSM",
        }
    }
}

impl FromStr for NetworkType {
    type Err = ParseError;

    /// Parse a network type label (case-insensitive).
    ///
    /// ```
    /// use polaris_types::NetworkType;
    ///
    /// assert_eq!("lte".parse::<NetworkType>(), Ok(NetworkType::Lte));
    /// assert!("NR".parse::<NetworkType>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LTE" => Ok(NetworkType::Lte),
            "WCDMA" => Ok(NetworkType::Wcdma),
            "GSM" => Ok(NetworkType::Gsm),
            _ => Err(ParseError::UnknownNetworkType(s.to_string())),
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A GPS location fix in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
}

impl Location {
    /// Create a new location.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns true if both coordinates are finite and within range.
    ///
    /// ```
    /// use polaris_types::Location;
    ///
    /// assert!(Location::new(52.52, 13.40).is_valid());
    /// assert!(!Location::new(f64::NAN, 13.40).is_valid());
    /// assert!(!Location::new(91.0, 0.0).is_valid());
    /// ```
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Technology-specific signal fields of a measurement.
///
/// Exactly one group of signal fields exists per record, and the network type
/// of the record is derived from the variant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "networkType", rename_all = "UPPERCASE")
)]
pub enum Radio {
    /// LTE reference signal power and quality, plus the band list.
    Lte {
        rsrp: Option<i32>,
        rsrq: Option<i32>,
        band: Option<String>,
    },
    /// WCDMA received signal code power and Ec/No.
    Wcdma { rscp: Option<i32>, ecno: Option<i32> },
    /// GSM received signal level in dBm.
    Gsm { rxlev: Option<i32> },
    /// No technology recorded.
    #[default]
    Unknown,
}

impl Radio {
    /// Network type this signal group belongs to.
    #[must_use]
    pub fn network_type(&self) -> Option<NetworkType> {
        match self {
            Radio::Lte { .. } => Some(NetworkType::Lte),
            Radio::Wcdma { .. } => Some(NetworkType::Wcdma),
            Radio::Gsm { .. } => Some(NetworkType::Gsm),
            Radio::Unknown => None,
        }
    }
}

/// One observed network/location sample, before it has been stored.
///
/// Records are immutable once built: the collector creates them, the store
/// assigns an id, and the sync loop reads and deletes them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Measurement {
    /// Observation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Last known location, absent if no fix had been acquired yet.
    pub location: Option<Location>,
    /// Operator identifier (MCC followed by MNC).
    pub plmn_id: Option<String>,
    /// Tracking area code (LTE) or location area code (WCDMA/GSM).
    pub tac: Option<i32>,
    /// Cell identity.
    pub cell_id: Option<i32>,
    /// Channel number (EARFCN, UARFCN or ARFCN).
    pub arfcn: Option<i32>,
    /// Technology-specific signal fields.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub radio: Radio,
}

impl Measurement {
    /// Network type of this record, derived from its signal fields.
    #[must_use]
    pub fn network_type(&self) -> Option<NetworkType> {
        self.radio.network_type()
    }

    pub fn latitude(&self) -> Option<f64> {
        self.location.map(|l| l.latitude)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.location.map(|l| l.longitude)
    }

    pub fn rsrp(&self) -> Option<i32> {
        match self.radio {
            Radio::Lte { rsrp, .. } => rsrp,
            _ => None,
        }
    }

    pub fn rsrq(&self) -> Option<i32> {
        match self.radio {
            Radio::Lte { rsrq, .. } => rsrq,
            _ => None,
        }
    }

    pub fn band(&self) -> Option<&str> {
        match &self.radio {
            Radio::Lte { band, .. } => band.as_deref(),
            _ => None,
        }
    }

    pub fn rscp(&self) -> Option<i32> {
        match self.radio {
            Radio::Wcdma { rscp, .. } => rscp,
            _ => None,
        }
    }

    pub fn ecno(&self) -> Option<i32> {
        match self.radio {
            Radio::Wcdma { ecno, .. } => ecno,
            _ => None,
        }
    }

    pub fn rxlev(&self) -> Option<i32> {
        match self.radio {
            Radio::Gsm { rxlev } => rxlev,
            _ => None,
        }
    }
}

/// Current time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
