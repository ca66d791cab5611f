//! Record store trait and SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension};

use super::error::StoreError;
use super::schema;
use super::types::{
    Dimension, ImageRecord, MissingEntry, MissingImage, ScanCandidate, ScanKind, ScanRun,
    ScanRunStats, StatusDelta, StatusEntry, StatusLayout,
};

/// Trait for record store operations.
///
/// Read operations that depend on where status is kept take a
/// [`StatusLayout`]. Every write is all-or-nothing: on error the previously
/// committed status stays visible.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Number of records in the catalog.
    async fn count_images(&self) -> Result<u64, StoreError>;

    /// Every catalog record.
    async fn list_images(&self) -> Result<Vec<ImageRecord>, StoreError>;

    /// Records currently flagged missing in at least one dimension, joined
    /// with their stored status. Status rows without a catalog record are
    /// skipped.
    async fn list_flagged(&self, layout: StatusLayout) -> Result<Vec<ScanCandidate>, StoreError>;

    /// Stored status of every record missing at least one dimension. Used
    /// to carry unscanned dimensions forward.
    async fn list_status(&self, layout: StatusLayout) -> Result<Vec<StatusEntry>, StoreError>;

    /// Count records whose `dimension` flag is recorded as missing.
    async fn count_missing(
        &self,
        layout: StatusLayout,
        dimension: Dimension,
    ) -> Result<u64, StoreError>;

    /// `{id, path}` of every record whose `dimension` is recorded as missing.
    async fn list_missing(
        &self,
        layout: StatusLayout,
        dimension: Dimension,
    ) -> Result<Vec<MissingImage>, StoreError>;

    /// Every record missing at least one dimension, each once.
    async fn list_missing_entries(
        &self,
        layout: StatusLayout,
    ) -> Result<Vec<MissingEntry>, StoreError>;

    /// Update the embedded flags of the given records in one transaction.
    ///
    /// A `None` field leaves that column untouched. Returns the number of
    /// catalog rows updated.
    async fn update_status_batch(&self, deltas: &[StatusDelta]) -> Result<u64, StoreError>;

    /// Replace the whole detached status table with `entries` in one transaction.
    async fn replace_status_table(&self, entries: &[StatusEntry]) -> Result<u64, StoreError>;

    /// Start a new scan run and return its ID.
    async fn start_scan_run(&self, kind: ScanKind, layout: StatusLayout)
        -> Result<i64, StoreError>;

    /// Complete a scan run with statistics.
    async fn complete_scan_run(&self, run_id: i64, stats: &ScanRunStats)
        -> Result<(), StoreError>;

    /// Most recent scan run, if any.
    async fn last_scan_run(&self) -> Result<Option<ScanRun>, StoreError>;
}

/// SQLite implementation of the record store.
pub struct SqliteRecordStore {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    /// Path to the database file (for error messages).
    path: PathBuf,
}

impl std::fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRecordStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteRecordStore {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            if let Some(parent) = path_clone.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| StoreError::CreateDir {
                        path: parent.to_path_buf(),
                        source: e,
                    })?;
                }
            }

            let conn = Connection::open(&path_clone).map_err(|e| StoreError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            // WAL keeps the last committed status readable while a
            // replace transaction is in progress.
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(StoreError::Migration)?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(StoreError::Migration)?;

            schema::migrate(&conn)?;

            Ok::<_, StoreError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Get the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Insert catalog records. The catalog is normally populated by the
    /// owning application; this exists for fixtures.
    #[cfg(test)]
    pub fn insert_images(&self, records: &[ImageRecord]) -> Result<(), StoreError> {
        let conn = self.lock()?;
        in_transaction(&conn, |conn| {
            let mut stmt = conn
                .prepare_cached("INSERT INTO images (id, image_big, image_small) VALUES (?1, ?2, ?3)")
                .map_err(StoreError::query)?;
            for record in records {
                stmt.execute(rusqlite::params![record.id, record.large_path, record.small_path])
                    .map_err(StoreError::query)?;
            }
            Ok(())
        })
    }

    /// Run raw SQL against the connection.
    #[cfg(test)]
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.lock()?.execute_batch(sql).map_err(StoreError::query)
    }

    /// Raw row count of the detached table, orphans included.
    #[cfg(test)]
    pub fn status_row_count(&self) -> Result<u64, StoreError> {
        let count = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM images_status", [], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(StoreError::query)?;
        Ok(count as u64)
    }
}

/// FROM clause and the alias whose flag columns hold status for `layout`.
///
/// The detached variant is an inner join, so status rows whose catalog
/// record has been deleted never show up.
fn status_source(layout: StatusLayout) -> (&'static str, &'static str) {
    match layout {
        StatusLayout::Embedded => ("images i", "i"),
        StatusLayout::Detached => ("images_status s JOIN images i ON i.id = s.id", "s"),
    }
}

/// Run `f` inside `BEGIN IMMEDIATE … COMMIT`, rolling back on error.
fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(StoreError::query)?;

    match f(conn) {
        Ok(value) => match conn.execute_batch("COMMIT") {
            Ok(()) => Ok(value),
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(StoreError::query(e))
            }
        },
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

fn timestamp(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|ts| Utc.timestamp_opt(ts, 0).single())
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn count_images(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count = conn
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get::<_, i64>(0))
            .map_err(StoreError::query)?;
        Ok(count as u64)
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached("SELECT id, image_big, image_small FROM images")
            .map_err(StoreError::query)?;

        let records = stmt
            .query_map([], |row| {
                Ok(ImageRecord {
                    id: row.get(0)?,
                    large_path: row.get(1)?,
                    small_path: row.get(2)?,
                })
            })
            .map_err(StoreError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::query)?;

        Ok(records)
    }

    async fn list_flagged(&self, layout: StatusLayout) -> Result<Vec<ScanCandidate>, StoreError> {
        let (from, alias) = status_source(layout);
        // `IS 1` maps an unknown (NULL) flag to not-loaded so it gets probed.
        let sql = format!(
            "SELECT i.id, i.image_big, i.image_small, {alias}.is_loaded_big IS 1, {alias}.is_loaded_small IS 1 \
             FROM {from} WHERE {alias}.is_loaded_big = 0 OR {alias}.is_loaded_small = 0"
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(StoreError::query)?;
        let candidates = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                Ok(ScanCandidate {
                    record: ImageRecord {
                        id,
                        large_path: row.get(1)?,
                        small_path: row.get(2)?,
                    },
                    status: StatusEntry {
                        id,
                        large_loaded: row.get(3)?,
                        small_loaded: row.get(4)?,
                    },
                })
            })
            .map_err(StoreError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::query)?;

        Ok(candidates)
    }

    async fn list_status(&self, layout: StatusLayout) -> Result<Vec<StatusEntry>, StoreError> {
        let (from, alias) = status_source(layout);
        let sql = format!(
            "SELECT i.id, {alias}.is_loaded_big IS NOT 0, {alias}.is_loaded_small IS NOT 0 \
             FROM {from} WHERE {alias}.is_loaded_big = 0 OR {alias}.is_loaded_small = 0"
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(StoreError::query)?;
        let entries = stmt
            .query_map([], |row| {
                Ok(StatusEntry {
                    id: row.get(0)?,
                    large_loaded: row.get(1)?,
                    small_loaded: row.get(2)?,
                })
            })
            .map_err(StoreError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::query)?;

        Ok(entries)
    }

    async fn count_missing(
        &self,
        layout: StatusLayout,
        dimension: Dimension,
    ) -> Result<u64, StoreError> {
        let (from, alias) = status_source(layout);
        let sql = format!(
            "SELECT COUNT(*) FROM {from} WHERE {alias}.{flag} = 0",
            flag = dimension.flag_column()
        );

        let conn = self.lock()?;
        let count = conn
            .query_row(&sql, [], |row| row.get::<_, i64>(0))
            .map_err(StoreError::query)?;
        Ok(count as u64)
    }

    async fn list_missing(
        &self,
        layout: StatusLayout,
        dimension: Dimension,
    ) -> Result<Vec<MissingImage>, StoreError> {
        let (from, alias) = status_source(layout);
        let sql = format!(
            "SELECT i.id, i.{path} FROM {from} WHERE {alias}.{flag} = 0",
            path = dimension.path_column(),
            flag = dimension.flag_column()
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(StoreError::query)?;
        let images = stmt
            .query_map([], |row| {
                Ok(MissingImage {
                    id: row.get(0)?,
                    path: row.get(1)?,
                })
            })
            .map_err(StoreError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::query)?;

        Ok(images)
    }

    async fn list_missing_entries(
        &self,
        layout: StatusLayout,
    ) -> Result<Vec<MissingEntry>, StoreError> {
        let (from, alias) = status_source(layout);
        let sql = format!(
            "SELECT i.id, i.image_big, i.image_small, {alias}.is_loaded_big IS NOT 0, {alias}.is_loaded_small IS NOT 0 \
             FROM {from} WHERE {alias}.is_loaded_big = 0 OR {alias}.is_loaded_small = 0"
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(StoreError::query)?;
        let entries = stmt
            .query_map([], |row| {
                Ok(MissingEntry {
                    id: row.get(0)?,
                    large_path: row.get(1)?,
                    small_path: row.get(2)?,
                    large_loaded: row.get(3)?,
                    small_loaded: row.get(4)?,
                })
            })
            .map_err(StoreError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::query)?;

        Ok(entries)
    }

    async fn update_status_batch(&self, deltas: &[StatusDelta]) -> Result<u64, StoreError> {
        if deltas.is_empty() {
            return Ok(0);
        }

        let conn = self.lock()?;
        in_transaction(&conn, |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "UPDATE images SET \
                        is_loaded_big = COALESCE(?1, is_loaded_big), \
                        is_loaded_small = COALESCE(?2, is_loaded_small) \
                     WHERE id = ?3",
                )
                .map_err(StoreError::query)?;

            let mut updated = 0u64;
            for delta in deltas {
                updated += stmt
                    .execute(rusqlite::params![
                        delta.large_loaded,
                        delta.small_loaded,
                        delta.id
                    ])
                    .map_err(StoreError::query)? as u64;
            }
            Ok(updated)
        })
    }

    async fn replace_status_table(&self, entries: &[StatusEntry]) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        in_transaction(&conn, |conn| {
            conn.execute("DELETE FROM images_status", [])
                .map_err(StoreError::query)?;

            let mut stmt = conn
                .prepare_cached(
                    "INSERT INTO images_status (id, is_loaded_big, is_loaded_small) VALUES (?1, ?2, ?3)",
                )
                .map_err(StoreError::query)?;

            for entry in entries {
                stmt.execute(rusqlite::params![
                    entry.id,
                    entry.large_loaded,
                    entry.small_loaded
                ])
                .map_err(StoreError::query)?;
            }
            Ok(entries.len() as u64)
        })
    }

    async fn start_scan_run(
        &self,
        kind: ScanKind,
        layout: StatusLayout,
    ) -> Result<i64, StoreError> {
        let started_at = Utc::now().timestamp();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO scan_runs (kind, layout, started_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![kind.as_str(), layout.as_str(), started_at],
        )
        .map_err(StoreError::query)?;

        Ok(conn.last_insert_rowid())
    }

    async fn complete_scan_run(
        &self,
        run_id: i64,
        stats: &ScanRunStats,
    ) -> Result<(), StoreError> {
        let completed_at = Utc::now().timestamp();

        let conn = self.lock()?;
        conn.execute(
            "UPDATE scan_runs SET completed_at = ?1, records_scanned = ?2, missing_large = ?3, missing_small = ?4, interrupted = ?5 WHERE id = ?6",
            rusqlite::params![
                completed_at,
                stats.records_scanned as i64,
                stats.missing_large as i64,
                stats.missing_small as i64,
                stats.interrupted,
                run_id
            ],
        )
        .map_err(StoreError::query)?;

        Ok(())
    }

    async fn last_scan_run(&self) -> Result<Option<ScanRun>, StoreError> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                "SELECT id, kind, layout, started_at, completed_at, records_scanned, missing_large, missing_small, interrupted \
                 FROM scan_runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    let kind: String = row.get(1)?;
                    let layout: String = row.get(2)?;
                    Ok(ScanRun {
                        id: row.get(0)?,
                        kind: ScanKind::from_str(&kind).unwrap_or(ScanKind::All),
                        layout: StatusLayout::from_str(&layout)
                            .unwrap_or(StatusLayout::Embedded),
                        started_at: timestamp(row.get(3)?).unwrap_or(DateTime::UNIX_EPOCH),
                        completed_at: timestamp(row.get(4)?),
                        records_scanned: row.get::<_, i64>(5)? as u64,
                        missing_large: row.get::<_, i64>(6)? as u64,
                        missing_small: row.get::<_, i64>(7)? as u64,
                        interrupted: row.get(8)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::query)?;

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SqliteRecordStore {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store
            .insert_images(&[
                ImageRecord::new(1, "big/1.jpg", "small/1.jpg"),
                ImageRecord::new(2, "big/2.jpg", "small/2.jpg"),
                ImageRecord::new(3, "big/3.jpg", "small/3.jpg"),
            ])
            .unwrap();
        store
    }

    fn entry(id: i64, large_loaded: bool, small_loaded: bool) -> StatusEntry {
        StatusEntry {
            id,
            large_loaded,
            small_loaded,
        }
    }

    #[tokio::test]
    async fn test_open_creates_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.db");
        let store = SqliteRecordStore::open(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path);
        assert_eq!(store.count_images().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_external_catalog_with_user_version() {
        let dir = tempfile::tempdir().unwrap();
        for user_version in [1, 7] {
            let path = dir.path().join(format!("catalog-{user_version}.db"));
            {
                let conn = Connection::open(&path).unwrap();
                conn.execute_batch(
                    "CREATE TABLE images (id INTEGER PRIMARY KEY, image_big TEXT NOT NULL, image_small TEXT NOT NULL);
                     INSERT INTO images VALUES (1, 'big/1.jpg', 'small/1.jpg');",
                )
                .unwrap();
                conn.pragma_update(None, "user_version", user_version)
                    .unwrap();
            }

            let store = SqliteRecordStore::open(&path).await.unwrap();
            assert_eq!(
                store
                    .count_missing(StatusLayout::Embedded, Dimension::Large)
                    .await
                    .unwrap(),
                0
            );
            assert_eq!(
                store
                    .replace_status_table(&[entry(1, false, true)])
                    .await
                    .unwrap(),
                1
            );
            assert_eq!(
                store
                    .count_missing(StatusLayout::Detached, Dimension::Large)
                    .await
                    .unwrap(),
                1
            );
        }
    }

    #[tokio::test]
    async fn test_list_images() {
        let store = catalog();
        let mut images = store.list_images().await.unwrap();
        images.sort_by_key(|r| r.id);
        assert_eq!(images.len(), 3);
        assert_eq!(images[1], ImageRecord::new(2, "big/2.jpg", "small/2.jpg"));
    }

    #[tokio::test]
    async fn test_unscanned_catalog_reports_nothing_missing() {
        let store = catalog();
        for dimension in Dimension::ALL {
            assert_eq!(
                store
                    .count_missing(StatusLayout::Embedded, dimension)
                    .await
                    .unwrap(),
                0
            );
        }
        assert!(store
            .list_flagged(StatusLayout::Embedded)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_partial_update_leaves_other_column() {
        let store = catalog();
        store
            .update_status_batch(&[StatusDelta {
                id: 1,
                large_loaded: Some(true),
                small_loaded: Some(false),
            }])
            .await
            .unwrap();
        store
            .update_status_batch(&[StatusDelta {
                id: 1,
                large_loaded: Some(false),
                small_loaded: None,
            }])
            .await
            .unwrap();

        let flagged = store.list_flagged(StatusLayout::Embedded).await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].status, entry(1, false, false));
    }

    #[tokio::test]
    async fn test_update_batch_counts_rows() {
        let store = catalog();
        let updated = store
            .update_status_batch(&[
                StatusDelta {
                    id: 1,
                    large_loaded: Some(true),
                    small_loaded: Some(true),
                },
                StatusDelta {
                    id: 99,
                    large_loaded: Some(false),
                    small_loaded: Some(false),
                },
            ])
            .await
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(store.update_status_batch(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedded_unknown_dimension_is_probed_on_rescan() {
        let store = catalog();
        store
            .update_status_batch(&[StatusDelta {
                id: 2,
                large_loaded: Some(false),
                small_loaded: None,
            }])
            .await
            .unwrap();

        let flagged = store.list_flagged(StatusLayout::Embedded).await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert!(!flagged[0].status.large_loaded);
        assert!(!flagged[0].status.small_loaded);

        // Unknown is not reported as missing.
        assert_eq!(
            store
                .count_missing(StatusLayout::Embedded, Dimension::Small)
                .await
                .unwrap(),
            0
        );
        let entries = store
            .list_missing_entries(StatusLayout::Embedded)
            .await
            .unwrap();
        assert!(entries[0].small_loaded);
    }

    #[tokio::test]
    async fn test_replace_status_table_replaces_everything() {
        let store = catalog();
        store
            .replace_status_table(&[entry(1, false, true), entry(2, false, false)])
            .await
            .unwrap();
        store
            .replace_status_table(&[entry(3, true, false)])
            .await
            .unwrap();

        let status = store.list_status(StatusLayout::Detached).await.unwrap();
        assert_eq!(status, vec![entry(3, true, false)]);
    }

    #[tokio::test]
    async fn test_replace_status_table_rolls_back_on_failure() {
        let store = catalog();
        store
            .replace_status_table(&[entry(1, false, true)])
            .await
            .unwrap();

        // Duplicate primary key fails on the second insert.
        let result = store
            .replace_status_table(&[entry(2, false, false), entry(2, true, false)])
            .await;
        assert!(matches!(result, Err(StoreError::Query(_))));

        let status = store.list_status(StatusLayout::Detached).await.unwrap();
        assert_eq!(status, vec![entry(1, false, true)]);
    }

    #[tokio::test]
    async fn test_update_batch_rolls_back_on_failure() {
        let store = catalog();
        store
            .execute_batch(
                "CREATE TRIGGER fail_on_three BEFORE UPDATE ON images WHEN NEW.id = 3
                 BEGIN SELECT RAISE(ABORT, 'store unavailable'); END;",
            )
            .unwrap();

        let deltas: Vec<StatusDelta> = (1..=3)
            .map(|id| StatusDelta {
                id,
                large_loaded: Some(false),
                small_loaded: Some(false),
            })
            .collect();
        assert!(store.update_status_batch(&deltas).await.is_err());
        assert_eq!(
            store
                .count_missing(StatusLayout::Embedded, Dimension::Large)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_detached_queries_skip_orphans() {
        let store = catalog();
        store
            .replace_status_table(&[entry(1, false, true), entry(42, false, false)])
            .await
            .unwrap();

        assert_eq!(
            store
                .count_missing(StatusLayout::Detached, Dimension::Large)
                .await
                .unwrap(),
            1
        );
        let missing = store
            .list_missing(StatusLayout::Detached, Dimension::Large)
            .await
            .unwrap();
        assert_eq!(
            missing,
            vec![MissingImage {
                id: 1,
                path: "big/1.jpg".to_string()
            }]
        );
        let flagged = store.list_flagged(StatusLayout::Detached).await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].record.id, 1);
    }

    #[tokio::test]
    async fn test_list_missing_entries_detached() {
        let store = catalog();
        store
            .replace_status_table(&[entry(2, true, false), entry(3, false, false)])
            .await
            .unwrap();

        let mut entries = store
            .list_missing_entries(StatusLayout::Detached)
            .await
            .unwrap();
        entries.sort_by_key(|e| e.id);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].small_path, "small/2.jpg");
        assert!(entries[0].large_loaded);
        assert!(!entries[1].large_loaded && !entries[1].small_loaded);
    }

    #[tokio::test]
    async fn test_scan_run_lifecycle() {
        let store = catalog();
        assert!(store.last_scan_run().await.unwrap().is_none());

        let run_id = store
            .start_scan_run(ScanKind::MissingOnly, StatusLayout::Detached)
            .await
            .unwrap();
        assert!(run_id > 0);

        let stats = ScanRunStats {
            records_scanned: 3,
            missing_large: 1,
            missing_small: 2,
            interrupted: false,
        };
        store.complete_scan_run(run_id, &stats).await.unwrap();

        let run = store.last_scan_run().await.unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.kind, ScanKind::MissingOnly);
        assert_eq!(run.layout, StatusLayout::Detached);
        assert!(run.completed_at.is_some());
        assert_eq!(run.records_scanned, 3);
        assert_eq!(run.missing_small, 2);
        assert!(!run.interrupted);
    }
}
