//! Role reference-data repository.
//!
//! # Responsibility
//! - Read the seeded role catalog for reference resolution.
//!
//! # Invariants
//! - Roles are plaintext reference data; nothing here touches the cipher or
//!   the blind index.
//! - This repository is read-only. The catalog is seeded by migration.

use crate::model::role::Role;
use crate::repo::{ensure_schema_current, table_exists, table_has_column, RepoError, RepoResult};
use rusqlite::{Connection, OptionalExtension, Row};

const ROLE_SELECT_SQL: &str = "SELECT
    role_id,
    role_name,
    role_description
FROM roles";

/// Repository interface for role reference lookups.
pub trait RoleRepository {
    /// Loads one role by its stable id.
    fn get_role(&self, role_id: &str) -> RepoResult<Option<Role>>;
    /// Returns whether the role id exists in the catalog.
    fn role_exists(&self, role_id: &str) -> RepoResult<bool>;
    /// Lists the whole catalog sorted by id.
    fn list_roles(&self) -> RepoResult<Vec<Role>>;
}

/// SQLite-backed role repository.
pub struct SqliteRoleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRoleRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_role_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl RoleRepository for SqliteRoleRepository<'_> {
    fn get_role(&self, role_id: &str) -> RepoResult<Option<Role>> {
        let role = self
            .conn
            .query_row(
                &format!("{ROLE_SELECT_SQL} WHERE role_id = ?1;"),
                [role_id],
                parse_role_row,
            )
            .optional()?;
        Ok(role)
    }

    fn role_exists(&self, role_id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM roles
                WHERE role_id = ?1
            );",
            [role_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_roles(&self) -> RepoResult<Vec<Role>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ROLE_SELECT_SQL} ORDER BY role_id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut roles = Vec::new();
        while let Some(row) = rows.next()? {
            roles.push(parse_role_row(row)?);
        }
        Ok(roles)
    }
}

fn parse_role_row(row: &Row<'_>) -> Result<Role, rusqlite::Error> {
    Ok(Role {
        role_id: row.get("role_id")?,
        role_name: row.get("role_name")?,
        role_description: row.get("role_description")?,
    })
}

fn ensure_role_connection_ready(conn: &Connection) -> RepoResult<()> {
    ensure_schema_current(conn)?;

    if !table_exists(conn, "roles")? {
        return Err(RepoError::MissingRequiredTable("roles"));
    }

    for column in ["role_id", "role_name", "role_description"] {
        if !table_has_column(conn, "roles", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "roles",
                column,
            });
        }
    }

    Ok(())
}
