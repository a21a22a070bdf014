use rusqlite::Connection;
use veildir_core::db::migrations::latest_version;
use veildir_core::db::{open_db, open_db_in_memory, DbError};
use veildir_core::{RepoError, RoleRepository, SqliteCompanyRepository, SqliteRoleRepository};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "roles");
    assert_table_exists(&conn, "companies");
    assert_table_exists(&conn, "company_index");
    assert_table_exists(&conn, "members");
    assert_table_exists(&conn, "member_index");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("veildir.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "companies");
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

#[test]
fn role_catalog_is_seeded_by_first_migration() {
    let conn = open_db_in_memory().unwrap();
    let roles = SqliteRoleRepository::try_new(&conn).unwrap();

    let catalog = roles.list_roles().unwrap();
    let ids: Vec<&str> = catalog.iter().map(|role| role.role_id.as_str()).collect();
    assert_eq!(ids, vec!["ROLE_OWNER", "ROLE_PENDING", "ROLE_USER"]);

    let user = roles.get_role("ROLE_USER").unwrap().unwrap();
    assert_eq!(user.role_name, "User");
    assert!(roles.role_exists("ROLE_OWNER").unwrap());
    assert!(!roles.role_exists("ROLE_GHOST").unwrap());
}

#[test]
fn repositories_reject_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteCompanyRepository::try_new(&conn).unwrap_err();
    match err {
        RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        } => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
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
