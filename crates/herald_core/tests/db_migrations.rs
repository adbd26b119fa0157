use herald_core::db::migrations::{apply_migrations, known_migrations, latest_version};
use herald_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn in_memory_database_is_fully_migrated() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(user_version(&conn), latest_version());
    for table in ["users", "groups", "group_members", "notifications"] {
        assert!(table_exists(&conn, table), "missing table {table}");
    }
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn reopening_a_file_database_keeps_rows_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("herald.db");

    let conn = open_db(&path).unwrap();
    conn.execute("INSERT INTO users (username) VALUES ('alice');", [])
        .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(user_version(&conn), latest_version());
    let users: i64 = conn
        .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(users, 1);
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 42;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 42);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn migration_steps_are_contiguous_and_named() {
    let steps: Vec<_> = known_migrations().collect();
    assert_eq!(
        steps,
        [(1, "directory"), (2, "notifications"), (3, "notification_uuid")]
    );
    assert_eq!(steps.last().map(|(version, _)| *version), Some(latest_version()));
}

#[test]
fn failing_step_is_named_and_rolled_back() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA user_version = 1; CREATE TABLE notifications (id INTEGER);")
        .unwrap();

    match apply_migrations(&mut conn).unwrap_err() {
        DbError::Migration { version, name, .. } => {
            assert_eq!(version, 2);
            assert_eq!(name, "notifications");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(user_version(&conn), 1);
}

#[test]
fn notification_flags_reject_non_boolean_values() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO users (username) VALUES ('alice');", [])
        .unwrap();

    let result = conn.execute(
        "INSERT INTO notifications (
            uuid, recipient_id, level, actor_kind, actor_id, verb, timestamp,
            public, unread, deleted, emailed
        ) VALUES ('u-1', 1, 'info', 'auth.user', '1', 'x', 0, 1, 2, 0, 0);",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn notifications_require_an_existing_recipient() {
    let conn = open_db_in_memory().unwrap();

    let result = conn.execute(
        "INSERT INTO notifications (
            uuid, recipient_id, level, actor_kind, actor_id, verb, timestamp,
            public, unread, deleted, emailed
        ) VALUES ('u-1', 99, 'info', 'auth.user', '1', 'x', 0, 1, 1, 0, 0);",
        [],
    );
    assert!(result.is_err());
}

fn user_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [name],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        == 1
}
