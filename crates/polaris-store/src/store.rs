//! Main store implementation.

use std::path::Path;

use rusqlite::{Connection, Row, params_from_iter};
use tracing::{debug, info, warn};

use polaris_types::{Location, Measurement, NetworkType, Radio};

use crate::error::{Error, Result};
use crate::models::StoredRecord;
use crate::queries::RecordQuery;
use crate::schema;

/// SQLite limits the number of bound parameters per statement; deletes are chunked below it.
const DELETE_CHUNK_SIZE: usize = 500;

/// SQLite-based store for pending measurement records.
///
/// Every method is a single atomic unit. Callers that share a store between
/// tasks wrap it in a mutex; nothing here spans more than one call.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Close the database, flushing any pending writes.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Database(e))
    }

    /// Insert a measurement and return its newly assigned id.
    pub fn insert(&self, m: &Measurement) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO network_logs (timestamp, latitude, longitude, network_type, plmn_id,
             tac, cell_id, rsrp, rsrq, rscp, ecno, rxlev, arfcn, band)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            rusqlite::params![
                m.timestamp,
                m.latitude(),
                m.longitude(),
                m.network_type().map(|t| t.as_str()),
                m.plmn_id,
                m.tac,
                m.cell_id,
                m.rsrp(),
                m.rsrq(),
                m.rscp(),
                m.ecno(),
                m.rxlev(),
                m.arfcn,
                m.band(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// All pending records, most recent first.
    pub fn get_all(&self) -> Result<Vec<StoredRecord>> {
        self.query(&RecordQuery::new())
    }

    /// Query pending records with filters.
    ///
    /// Rows that cannot be decoded are logged and left out of the result so
    /// that one bad row does not block every other record.
    pub fn query(&self, query: &RecordQuery) -> Result<Vec<StoredRecord>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), RawRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let records = rows
            .into_iter()
            .filter_map(|row| match row.into_record() {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable record: {}", e);
                    None
                }
            })
            .collect();
        Ok(records)
    }

    /// Delete the given ids. Ids that do not exist are ignored.
    ///
    /// Returns the number of rows actually removed.
    pub fn delete_by_ids(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut deleted = 0;
        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("DELETE FROM network_logs WHERE id IN ({})", placeholders);
            deleted += tx.execute(&sql, params_from_iter(chunk.iter()))?;
        }
        tx.commit()?;

        debug!("Deleted {} of {} requested records", deleted, ids.len());
        Ok(deleted)
    }

    /// Number of pending records.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM network_logs", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// A row as read from SQLite, before the radio fields are validated.
struct RawRow {
    id: i64,
    timestamp: i64,
    latitude: Option<f64>,
    longitude: Option<f64>,
    network_type: Option<String>,
    plmn_id: Option<String>,
    tac: Option<i32>,
    cell_id: Option<i32>,
    rsrp: Option<i32>,
    rsrq: Option<i32>,
    rscp: Option<i32>,
    ecno: Option<i32>,
    rxlev: Option<i32>,
    arfcn: Option<i32>,
    band: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            network_type: row.get(4)?,
            plmn_id: row.get(5)?,
            tac: row.get(6)?,
            cell_id: row.get(7)?,
            rsrp: row.get(8)?,
            rsrq: row.get(9)?,
            rscp: row.get(10)?,
            ecno: row.get(11)?,
            rxlev: row.get(12)?,
            arfcn: row.get(13)?,
            band: row.get(14)?,
        })
    }

    fn into_record(self) -> Result<StoredRecord> {
        let network_type = self
            .network_type
            .as_deref()
            .map(str::parse::<NetworkType>)
            .transpose()
            .map_err(|e| Error::InvalidRecord {
                id: self.id,
                reason: e.to_string(),
            })?;

        let radio = match network_type {
            Some(NetworkType::Lte) => Radio::Lte {
                rsrp: self.rsrp,
                rsrq: self.rsrq,
                band: self.band,
            },
            Some(NetworkType::Wcdma) => Radio::Wcdma {
                rscp: self.rscp,
                ecno: self.ecno,
            },
            Some(NetworkType::Gsm) => Radio::Gsm { rxlev: self.rxlev },
            None => Radio::Unknown,
        };

        // Latitude and longitude are written together
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Location::new(latitude, longitude)),
            _ => None,
        };

        Ok(StoredRecord {
            id: self.id,
            measurement: Measurement {
                timestamp: self.timestamp,
                location,
                plmn_id: self.plmn_id,
                tac: self.tac,
                cell_id: self.cell_id,
                arfcn: self.arfcn,
                radio,
            },
        })
    }
}
