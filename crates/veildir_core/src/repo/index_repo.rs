//! Blind-index table access shared by aggregate repositories.
//!
//! # Responsibility
//! - Maintain digest rows (`attribute`, `digest`, owner key) per aggregate.
//! - Resolve plaintext-digest lookups to owning record keys.
//!
//! # Invariants
//! - One entry per `(owner, attribute)` pair; attribute updates swap the
//!   digest in place via delete+insert.
//! - Uniqueness of unique-attribute digests is authoritative at the schema
//!   level; this module translates violations to `DuplicateDigest`.
//! - Entries are written and removed inside the owning repository's
//!   transaction scope. This store never opens its own transaction.

use crate::repo::{is_unique_violation, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Blind-index table selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTable {
    Company,
    Member,
}

impl IndexTable {
    fn table(self) -> &'static str {
        match self {
            Self::Company => "company_index",
            Self::Member => "member_index",
        }
    }

    fn owner_column(self) -> &'static str {
        match self {
            Self::Company => "company_id",
            Self::Member => "member_id",
        }
    }

    fn owner_ref(self) -> &'static str {
        match self {
            Self::Company => "company_index.company_id",
            Self::Member => "member_index.member_id",
        }
    }
}

/// Digest index access bound to one table and one connection.
///
/// Constructed on demand, usually over an open transaction; the borrow lets
/// callers compose index writes with aggregate writes atomically.
pub struct BlindIndexStore<'conn> {
    conn: &'conn Connection,
    table: IndexTable,
}

impl<'conn> BlindIndexStore<'conn> {
    pub fn new(conn: &'conn Connection, table: IndexTable) -> Self {
        Self { conn, table }
    }

    /// Inserts one index entry pointing at the given owner key.
    pub fn put(&self, owner_id: Uuid, attribute: &'static str, digest: &str) -> RepoResult<()> {
        let result = self.conn.execute(
            &format!(
                "INSERT INTO {} ({}, attribute, digest) VALUES (?1, ?2, ?3);",
                self.table.table(),
                self.table.owner_column()
            ),
            params![owner_id.to_string(), attribute, digest],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::DuplicateDigest { attribute }),
            Err(err) => Err(err.into()),
        }
    }

    /// Swaps one entry's digest, verifying the stale digest in place.
    ///
    /// Fails with `StaleDigest` when the current entry does not carry
    /// `old_digest`, which catches updates racing each other. The caller
    /// provides the enclosing transaction scope.
    pub fn replace(
        &self,
        owner_id: Uuid,
        attribute: &'static str,
        old_digest: &str,
        new_digest: &str,
    ) -> RepoResult<()> {
        let deleted = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1 AND attribute = ?2 AND digest = ?3;",
                self.table.table(),
                self.table.owner_column()
            ),
            params![owner_id.to_string(), attribute, old_digest],
        )?;

        if deleted == 0 {
            return Err(RepoError::StaleDigest { attribute });
        }

        self.put(owner_id, attribute, new_digest)
    }

    /// Resolves a digest to its owning record key.
    ///
    /// Non-unique attributes may index the same digest for several owners;
    /// the oldest entry wins.
    pub fn find_owner(&self, attribute: &str, digest: &str) -> RepoResult<Option<Uuid>> {
        let found: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE attribute = ?1 AND digest = ?2
                     ORDER BY entry_id ASC LIMIT 1;",
                    self.table.owner_column(),
                    self.table.table()
                ),
                params![attribute, digest],
                |row| row.get(0),
            )
            .optional()?;

        match found {
            Some(value) => Ok(Some(parse_uuid(&value, self.table.owner_ref())?)),
            None => Ok(None),
        }
    }

    /// Returns whether any entry indexes this digest for the attribute.
    pub fn digest_exists(&self, attribute: &str, digest: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(
                    SELECT 1
                    FROM {}
                    WHERE attribute = ?1 AND digest = ?2
                );",
                self.table.table()
            ),
            params![attribute, digest],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    /// Removes all entries for one owner. Returns the removed row count.
    pub fn delete_for_owner(&self, owner_id: Uuid) -> RepoResult<usize> {
        let deleted = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1;",
                self.table.table(),
                self.table.owner_column()
            ),
            [owner_id.to_string()],
        )?;
        Ok(deleted)
    }
}
