//! JSON upload schema.
//!
//! The collection endpoint accepts `{ "logs": [ ... ] }` where every record
//! carries all fields, using `null` for absent values.

use serde::{Deserialize, Serialize};

use crate::types::Measurement;

/// Path of the upload endpoint, relative to the configured base URL.
pub const SUBMIT_LOGS_PATH: &str = "/api/v1/panel/submitLogs";

/// A single record in the upload body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRecord {
    pub timestamp: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub network_type: Option<String>,
    pub plmn_id: Option<String>,
    pub tac: Option<i32>,
    pub cell_id: Option<i32>,
    pub rsrp: Option<i32>,
    pub rsrq: Option<i32>,
    pub rscp: Option<i32>,
    pub ecno: Option<i32>,
    pub rxlev: Option<i32>,
    pub arfcn: Option<i32>,
    pub band: Option<String>,
}

impl From<&Measurement> for WireRecord {
    fn from(m: &Measurement) -> Self {
        Self {
            timestamp: m.timestamp,
            latitude: m.latitude(),
            longitude: m.longitude(),
            network_type: m.network_type().map(|t| t.as_str().to_string()),
            plmn_id: m.plmn_id.clone(),
            tac: m.tac,
            cell_id: m.cell_id,
            rsrp: m.rsrp(),
            rsrq: m.rsrq(),
            rscp: m.rscp(),
            ecno: m.ecno(),
            rxlev: m.rxlev(),
            arfcn: m.arfcn,
            band: m.band().map(str::to_string),
        }
    }
}

/// Top-level upload body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPayload {
    pub logs: Vec<WireRecord>,
}

impl LogPayload {
    pub fn new(logs: Vec<WireRecord>) -> Self {
        Self { logs }
    }
}

impl<'a> FromIterator<&'a Measurement> for LogPayload {
    fn from_iter<I: IntoIterator<Item = &'a Measurement>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(WireRecord::from).collect())
    }
}
