//! Record store for the image catalog and its file-presence status.
//!
//! Status is kept in one of two layouts:
//! - embedded: `is_loaded_big` / `is_loaded_small` columns on `images`
//! - detached: an `images_status` table holding only records with a missing file
//!
//! Both live in the same SQLite database; which one is maintained is chosen
//! by the status strategy in use.

pub mod db;
pub mod error;
pub mod schema;
pub mod types;

pub use db::{RecordStore, SqliteRecordStore};
pub use error::StoreError;
pub use types::{
    Dimension, ImageRecord, MissingEntry, MissingImage, ScanCandidate, ScanKind, ScanRun,
    ScanRunStats, StatusDelta, StatusEntry, StatusLayout,
};
