//! Unit tests for the Marksync database layer (connection + migrations).

use marksync::database::migrations::{get_schema_version, run_all, CURRENT_SCHEMA_VERSION};
use marksync::database::Database;
use tempfile::TempDir;

/// An in-memory database opens and migrates.
#[test]
fn test_open_in_memory_succeeds() {
    let db = Database::open_in_memory();
    assert!(db.is_ok(), "open_in_memory should succeed");
}

/// Migrations create the bookmarks table with the expected columns.
#[test]
fn test_migrations_create_bookmarks_table() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='bookmarks'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);
    assert!(exists, "Table 'bookmarks' should exist after migrations");

    let columns: Vec<String> = conn
        .prepare("SELECT name FROM pragma_table_info('bookmarks')")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(columns, vec!["id", "user_id", "url", "title", "created_at"]);
}

/// Migrations create the owner and creation time index.
#[test]
fn test_migrations_create_owner_index() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='index' AND name='idx_bookmarks_owner_created'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);
    assert!(exists);
}

/// A freshly migrated database reports the current schema version.
#[test]
fn test_schema_version_is_current() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();
    assert_eq!(get_schema_version(&conn), CURRENT_SCHEMA_VERSION);
}

/// Running migrations again records no new versions.
#[test]
fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    run_all(&conn).expect("second run should be a no-op");

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, CURRENT_SCHEMA_VERSION as i64);
}

/// Rows survive closing and reopening an on-disk database.
#[test]
fn test_reopen_on_disk_keeps_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("marksync.db");

    {
        let db = Database::open(&path).expect("open failed");
        db.connection()
            .execute(
                "INSERT INTO bookmarks (id, user_id, url, title, created_at) VALUES ('b1', 'u1', 'https://x.test', 'X', 1)",
                [],
            )
            .unwrap();
    }

    let db = Database::open(&path).expect("reopen failed");
    let conn = db.connection();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM bookmarks", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(get_schema_version(&conn), CURRENT_SCHEMA_VERSION);
}

/// The title column defaults to an empty string.
#[test]
fn test_title_defaults_to_empty() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();
    conn.execute(
        "INSERT INTO bookmarks (id, user_id, url, created_at) VALUES ('b1', 'u1', 'https://x.test', 1)",
        [],
    )
    .unwrap();

    let title: String = conn
        .query_row("SELECT title FROM bookmarks WHERE id = 'b1'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(title, "");
}
