//! Local persistence for pending Polaris measurement records.
//!
//! This crate provides the SQLite-backed table that sits between the
//! collector and the uploader. Records are appended as they are observed,
//! read back in bulk, and deleted by id once the collection endpoint has
//! accepted them.
//!
//! # Features
//!
//! - Append records with store-assigned, never-reused ids
//! - List pending records newest first, or filter with [`RecordQuery`]
//! - Bulk delete by id (absent ids are ignored)
//! - Schema versioning with in-place migrations
//!
//! # Example
//!
//! ```
//! use polaris_store::Store;
//! use polaris_types::{Measurement, Radio};
//!
//! let store = Store::open_in_memory()?;
//! let id = store.insert(&Measurement {
//!     timestamp: 1_700_000_000_000,
//!     location: None,
//!     plmn_id: None,
//!     tac: Some(12),
//!     cell_id: Some(34),
//!     arfcn: None,
//!     radio: Radio::Gsm { rxlev: Some(-71) },
//! })?;
//!
//! let pending = store.get_all()?;
//! assert_eq!(pending[0].id, id);
//!
//! store.delete_by_ids(&[id])?;
//! assert_eq!(store.count()?, 0);
//! # Ok::<(), polaris_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::StoredRecord;
pub use queries::RecordQuery;
pub use schema::SCHEMA_VERSION;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/polaris/polaris.db`
/// - macOS: `~/Library/Application Support/polaris/polaris.db`
/// - Windows: `C:\Users\<user>\AppData\Local\polaris\polaris.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("polaris")
        .join("polaris.db")
}
