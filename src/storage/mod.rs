//!
//! daiara storage module
//! ----------------------
//! Record and object persistence used by the screen, session and artwork services.
//!
//! - `RecordStore`: named tables of JSON rows keyed by entity id, held in memory
//!   behind a `parking_lot::RwLock` and optionally snapshotted to disk with bincode.
//! - `ObjectStore`: `(key, bytes) -> stored_key` blob sink for uploaded artwork.
//!
//! Each table gives per-key read-your-writes; a conditional update holds the table
//! write lock for its read-modify-write. Nothing here spans keys or retries.

use std::path::PathBuf;

mod paths;
pub mod records;
pub mod objects;

pub use objects::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use paths::{objects_dir, records_dir};
pub use records::RecordStore;

pub const SCREENS_TABLE: &str = "screens";
pub const SESSIONS_TABLE: &str = "sessions";
pub const ARTWORKS_TABLE: &str = "artworks";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {table}/{key} could not be encoded: {source}")]
    Codec { table: String, key: String, source: serde_json::Error },
    #[error("io error at {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),
    #[error("{0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }
}
