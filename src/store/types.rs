//! Types for the record store.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One of the two asset variants tracked per catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Large,
    Small,
}

impl Dimension {
    pub const ALL: [Dimension; 2] = [Dimension::Large, Dimension::Small];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Large => "large",
            Self::Small => "small",
        }
    }

    /// Column on `images` holding the relative path of this variant.
    pub(crate) fn path_column(&self) -> &'static str {
        match self {
            Self::Large => "image_big",
            Self::Small => "image_small",
        }
    }

    /// Status flag column, identical in `images` and `images_status`.
    pub(crate) fn flag_column(&self) -> &'static str {
        match self {
            Self::Large => "is_loaded_big",
            Self::Small => "is_loaded_small",
        }
    }
}

/// Where status lives in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLayout {
    /// Two flag columns on the catalog table itself.
    Embedded,
    /// Separate `images_status` table holding only records with a missing asset.
    Detached,
}

impl StatusLayout {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Detached => "detached",
        }
    }

    /// Parse from the string stored in the database.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "embedded" => Some(Self::Embedded),
            "detached" => Some(Self::Detached),
            _ => None,
        }
    }
}

/// Which kind of pass a scan run was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    All,
    Large,
    Small,
    MissingOnly,
}

impl ScanKind {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Large => "large",
            Self::Small => "small",
            Self::MissingOnly => "missing_only",
        }
    }

    /// Parse from the string stored in the database.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "large" => Some(Self::Large),
            "small" => Some(Self::Small),
            "missing_only" => Some(Self::MissingOnly),
            _ => None,
        }
    }
}

/// A catalog entry. Owned by the surrounding application; only read here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: i64,
    /// Path of the large variant, relative to the image root.
    pub large_path: String,
    /// Path of the small variant, relative to the image root.
    pub small_path: String,
}

impl ImageRecord {
    pub fn new(id: i64, large_path: impl Into<String>, small_path: impl Into<String>) -> Self {
        Self {
            id,
            large_path: large_path.into(),
            small_path: small_path.into(),
        }
    }

    pub fn path(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Large => &self.large_path,
            Dimension::Small => &self.small_path,
        }
    }
}

/// Last known existence result for both variants of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusEntry {
    pub id: i64,
    pub large_loaded: bool,
    pub small_loaded: bool,
}

impl StatusEntry {
    pub fn loaded(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::Large => self.large_loaded,
            Dimension::Small => self.small_loaded,
        }
    }

    pub fn is_fully_loaded(&self) -> bool {
        self.large_loaded && self.small_loaded
    }
}

/// Result of probing some subset of a record's dimensions.
///
/// `None` means the dimension was not part of the scan and its stored
/// value must be left as it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDelta {
    pub id: i64,
    pub large_loaded: Option<bool>,
    pub small_loaded: Option<bool>,
}

impl StatusDelta {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            large_loaded: None,
            small_loaded: None,
        }
    }

    pub fn set(&mut self, dimension: Dimension, loaded: bool) {
        match dimension {
            Dimension::Large => self.large_loaded = Some(loaded),
            Dimension::Small => self.small_loaded = Some(loaded),
        }
    }

    pub fn get(&self, dimension: Dimension) -> Option<bool> {
        match dimension {
            Dimension::Large => self.large_loaded,
            Dimension::Small => self.small_loaded,
        }
    }

    /// Fill unscanned dimensions from `prior`. A record without a prior
    /// entry counts as fully loaded.
    pub fn resolve(&self, prior: Option<&StatusEntry>) -> StatusEntry {
        StatusEntry {
            id: self.id,
            large_loaded: self
                .large_loaded
                .unwrap_or_else(|| prior.is_none_or(|p| p.large_loaded)),
            small_loaded: self
                .small_loaded
                .unwrap_or_else(|| prior.is_none_or(|p| p.small_loaded)),
        }
    }
}

/// A record selected for a missed-only rescan together with its stored status.
///
/// A dimension whose status was never recorded is reported as not loaded,
/// so it gets probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCandidate {
    pub record: ImageRecord,
    pub status: StatusEntry,
}

/// One missing asset of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingImage {
    pub id: i64,
    pub path: String,
}

/// A record with at least one missing asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingEntry {
    pub id: i64,
    pub large_path: String,
    pub small_path: String,
    pub large_loaded: bool,
    pub small_loaded: bool,
}

/// Statistics recorded when a scan run completes.
#[derive(Debug, Clone, Default)]
pub struct ScanRunStats {
    pub records_scanned: u64,
    pub missing_large: u64,
    pub missing_small: u64,
    /// Whether the run was cancelled or failed before persisting.
    pub interrupted: bool,
}

/// A row of the scan run log.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRun {
    pub id: i64,
    pub kind: ScanKind,
    pub layout: StatusLayout,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_scanned: u64,
    pub missing_large: u64,
    pub missing_small: u64,
    pub interrupted: bool,
}
