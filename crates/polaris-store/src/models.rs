//! Data models for stored data.

use serde::{Serialize, Serializer};

use polaris_types::Measurement;
use polaris_types::wire::WireRecord;

/// A measurement stored in the database, waiting to be uploaded.
///
/// Serializes as the upload record plus its `id`, so a listing of pending
/// records reads exactly like what will be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Database row ID, assigned on insert and never reused.
    pub id: i64,
    /// The recorded measurement.
    pub measurement: Measurement,
}

impl StoredRecord {
    /// Convert to the upload representation (the id is not sent).
    pub fn to_wire(&self) -> WireRecord {
        WireRecord::from(&self.measurement)
    }
}

impl Serialize for StoredRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Listed {
            id: i64,
            #[serde(flatten)]
            record: WireRecord,
        }

        Listed {
            id: self.id,
            record: self.to_wire(),
        }
        .serialize(serializer)
    }
}
