//! Database schema definitions and migrations.
//!
//! The `images` catalog table normally belongs to the surrounding
//! application. It is only created here when absent, and the two embedded
//! status columns are added to an existing catalog that lacks them.

use rusqlite::{Connection, OptionalExtension};

use super::error::StoreError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Schema DDL for version 1.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY,
    image_big TEXT NOT NULL,
    image_small TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS images_status (
    id INTEGER PRIMARY KEY,
    is_loaded_big INTEGER NOT NULL,
    is_loaded_small INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS scan_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    layout TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    records_scanned INTEGER DEFAULT 0,
    missing_large INTEGER DEFAULT 0,
    missing_small INTEGER DEFAULT 0,
    interrupted INTEGER DEFAULT 0
);
"#;

/// Indexes on the embedded flags; needs the columns to exist first.
const STATUS_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_images_is_loaded_big ON images(is_loaded_big);
CREATE INDEX IF NOT EXISTS idx_images_is_loaded_small ON images(is_loaded_small);
"#;

/// Embedded status columns. NULL means the dimension was never scanned.
const STATUS_COLUMNS: [&str; 2] = ["is_loaded_big", "is_loaded_small"];

/// Private version marker. The catalog's `PRAGMA user_version` belongs to the
/// owning application and is never read or written here.
const META_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS imgscan_meta (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
"#;

/// Get this crate's schema version, 0 if it has never migrated this database.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    conn.execute_batch(META_TABLE)?;
    let version = conn
        .query_row(
            "SELECT value FROM imgscan_meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, i32>(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO imgscan_meta (key, value) VALUES ('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [version],
    )?;
    Ok(())
}

/// Add any embedded status column the catalog table is missing.
fn ensure_status_columns(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('images')")?;
    let existing = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    for column in STATUS_COLUMNS {
        if !existing.iter().any(|c| c == column) {
            conn.execute_batch(&format!("ALTER TABLE images ADD COLUMN {column} INTEGER"))?;
            tracing::info!(column, "Added status column to images table");
        }
    }
    Ok(())
}

fn apply_v1(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA_V1)?;
    ensure_status_columns(conn)?;
    conn.execute_batch(STATUS_INDEXES)?;
    Ok(())
}

/// Initialize or migrate the database schema.
///
/// The DDL is idempotent and runs on every open, whatever version is
/// recorded, since the catalog table can change outside this crate.
pub(crate) fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    apply_v1(conn)?;

    if current_version < SCHEMA_VERSION {
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::debug!("Initialized database schema at version {}", SCHEMA_VERSION);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_names(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("SELECT name FROM pragma_table_info('{table}')"))
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_db_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_idempotent_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_unsupported_version() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(META_TABLE).unwrap();
        set_schema_version(&conn, SCHEMA_VERSION + 1).unwrap();
        let result = migrate(&conn);
        assert!(matches!(
            result,
            Err(StoreError::UnsupportedSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        for table in ["images", "images_status", "scan_runs"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert_eq!(count, 0, "{table} should start empty");
        }
    }

    #[test]
    fn test_existing_catalog_gets_status_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE images (
                id INTEGER PRIMARY KEY,
                product_id INTEGER,
                image_big TEXT NOT NULL,
                image_small TEXT NOT NULL
            );
            INSERT INTO images (id, product_id, image_big, image_small)
            VALUES (1, 10, 'b/1.jpg', 's/1.jpg');",
        )
        .unwrap();

        migrate(&conn).unwrap();

        let columns = column_names(&conn, "images");
        assert!(columns.contains(&"product_id".to_string()));
        assert!(columns.contains(&"is_loaded_big".to_string()));
        assert!(columns.contains(&"is_loaded_small".to_string()));

        // Existing rows start out unknown rather than missing.
        let flag: Option<i64> = conn
            .query_row("SELECT is_loaded_big FROM images WHERE id = 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(flag, None);
    }

    #[test]
    fn test_indexes_created() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name LIKE 'idx_images_is_loaded_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    fn external_catalog(conn: &Connection, user_version: i32) {
        conn.execute_batch(
            "CREATE TABLE images (
                id INTEGER PRIMARY KEY,
                image_big TEXT NOT NULL,
                image_small TEXT NOT NULL
            );
            INSERT INTO images (id, image_big, image_small) VALUES (1, 'b/1.jpg', 's/1.jpg');",
        )
        .unwrap();
        conn.pragma_update(None, "user_version", user_version)
            .unwrap();
    }

    fn user_version(conn: &Connection) -> i32 {
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_owner_user_version_matching_ours_still_migrates() {
        let conn = Connection::open_in_memory().unwrap();
        external_catalog(&conn, SCHEMA_VERSION);

        migrate(&conn).unwrap();

        let columns = column_names(&conn, "images");
        assert!(columns.contains(&"is_loaded_big".to_string()));
        assert!(columns.contains(&"is_loaded_small".to_string()));
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM images_status", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(user_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn test_owner_user_version_above_ours_is_ignored() {
        let conn = Connection::open_in_memory().unwrap();
        external_catalog(&conn, 7);

        migrate(&conn).unwrap();

        assert!(column_names(&conn, "images").contains(&"is_loaded_big".to_string()));
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(user_version(&conn), 7);
    }

    #[test]
    fn test_dropped_status_table_recreated_on_reopen() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute_batch("DROP TABLE images_status").unwrap();

        migrate(&conn).unwrap();
        assert!(!column_names(&conn, "images_status").is_empty());
    }
}
