//! Query builder for pending records.
//!
//! # Example
//!
//! ```
//! use polaris_store::{RecordQuery, Store};
//! use polaris_types::NetworkType;
//!
//! let store = Store::open_in_memory()?;
//!
//! // The 100 most recent LTE records
//! let query = RecordQuery::new()
//!     .network_type(NetworkType::Lte)
//!     .limit(100);
//! let records = store.query(&query)?;
//! assert!(records.is_empty());
//! # Ok::<(), polaris_store::Error>(())
//! ```

use polaris_types::NetworkType;

/// Fluent query builder for [`Store::query`](crate::Store::query).
///
/// By default, queries return every pending record ordered by `timestamp`
/// descending (newest first), ties broken by id.
#[derive(Debug, Default, Clone)]
pub struct RecordQuery {
    /// Filter by network type.
    pub network_type: Option<NetworkType>,
    /// Only records observed at or after this time (epoch milliseconds).
    pub since: Option<i64>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Order by timestamp descending (newest first).
    pub newest_first: bool,
}

impl RecordQuery {
    /// Create a query matching all records, newest first.
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    pub fn network_type(mut self, network_type: NetworkType) -> Self {
        self.network_type = Some(network_type);
        self
    }

    /// Filter to records observed at or after `timestamp` (epoch milliseconds).
    pub fn since(mut self, timestamp: i64) -> Self {
        self.since = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Order results chronologically instead of newest first.
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(network_type) = self.network_type {
            conditions.push("network_type = ?");
            params.push(Box::new(network_type.as_str()));
        }

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(since));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT id, timestamp, latitude, longitude, network_type, plmn_id, tac, cell_id, \
             rsrp, rsrq, rscp, ecno, rxlev, arfcn, band \
             FROM network_logs {} ORDER BY timestamp {}, id {}",
            where_clause, order, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }
}
