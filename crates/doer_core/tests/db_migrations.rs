use doer_core::db::migrations::{apply_migrations, latest_version};
use doer_core::db::{open_db, open_db_in_memory, schema_version, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "projects");
    assert_table_exists(&conn, "sections");
    assert_table_exists(&conn, "tasks");
}

#[test]
fn position_columns_are_real() {
    let conn = open_db_in_memory().unwrap();

    for table in ["projects", "sections", "tasks"] {
        let declared: String = conn
            .query_row(
                &format!("SELECT type FROM pragma_table_info('{table}') WHERE name = 'position';"),
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(declared, "REAL", "{table}.position");
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doer.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "tasks");
}

#[test]
fn opened_connections_enforce_foreign_keys() {
    let conn = open_db_in_memory().unwrap();

    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let err = conn
        .execute(
            "INSERT INTO sections (id, project_id, name, position)
             VALUES ('00000000-0000-0000-0000-000000000001',
                     '00000000-0000-0000-0000-000000000002',
                     'Orphan',
                     65536.0);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

#[test]
fn inbox_is_unique_per_user() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO projects (id, user_id, name, color, is_inbox, position)
                  VALUES (?1, 'user-1', 'Inbox', '#808080', 1, ?2);";

    conn.execute(insert, rusqlite::params!["p-1", 65536.0]).unwrap();
    let err = conn
        .execute(insert, rusqlite::params!["p-2", 131072.0])
        .unwrap_err();
    assert!(err.to_string().contains("UNIQUE"));
}

#[test]
fn rerunning_migrations_on_current_store_is_a_noop() {
    let mut conn = open_db_in_memory().unwrap();

    let report = apply_migrations(&mut conn).unwrap();
    assert!(report.is_noop());
    assert_eq!(report.from_version, latest_version());
    assert_eq!(report.to_version, latest_version());
}

#[test]
fn fresh_store_reports_every_script() {
    let mut conn = Connection::open_in_memory().unwrap();

    let report = apply_migrations(&mut conn).unwrap();
    assert_eq!(report.from_version, 0);
    assert_eq!(report.to_version, latest_version());
    assert_eq!(report.applied, vec!["init", "inbox_unique"]);
}

#[test]
fn failing_script_is_named_and_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clash.db");

    // A stray `tasks` table makes 0001_init fail half way through.
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE tasks (id TEXT PRIMARY KEY);").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match &err {
        DbError::Migration { version, name, .. } => {
            assert_eq!(*version, 1);
            assert_eq!(*name, "init");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("migration 0001_init failed"));

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), 0);
    let projects: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'projects';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(projects, 0);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
