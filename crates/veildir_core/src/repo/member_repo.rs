//! Member repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist member aggregates (encrypted email, credential hash, plaintext
//!   metadata) together with their blind-index rows.
//! - Own the role-filtered company listing query.
//!
//! # Invariants
//! - `create_member` writes the aggregate row and the email index row in one
//!   transaction.
//! - Withdrawal only sets `withdrawn_at`; the row and its index entry stay,
//!   so withdrawn emails remain reserved and searchable.
//! - Listing is deterministic: `registered_at ASC, member_id ASC`.

use crate::crypto::SealedValue;
use crate::model::company::CompanyId;
use crate::model::member::{MemberAttribute, MemberId};
use crate::repo::index_repo::{BlindIndexStore, IndexTable};
use crate::repo::{
    ensure_schema_current, parse_uuid, table_exists, table_has_column, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const MEMBER_SELECT_SQL: &str = "SELECT
    member_id,
    company_id,
    role_id,
    email_cipher,
    password_hash,
    registered_at,
    last_login_at,
    withdrawn_at
FROM members";

const MEMBERS_DEFAULT_LIMIT: u32 = 10;
const MEMBERS_LIMIT_MAX: u32 = 50;

/// Persisted member row. The email column holds ciphertext only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRow {
    /// Stable surrogate key.
    pub member_id: MemberId,
    pub company_id: CompanyId,
    pub role_id: String,
    pub email_cipher: Vec<u8>,
    /// Opaque upstream credential hash; compared verbatim, never decrypted.
    pub password_hash: String,
    /// Epoch ms registration timestamp.
    pub registered_at: i64,
    /// Epoch ms of the last recorded login. `None` before the first login.
    pub last_login_at: Option<i64>,
    /// Epoch ms of withdrawal. `None` while the member is live.
    pub withdrawn_at: Option<i64>,
}

impl MemberRow {
    pub fn is_withdrawn(&self) -> bool {
        self.withdrawn_at.is_some()
    }
}

/// Sealed write model for a new member with resolved references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub company_id: CompanyId,
    pub role_id: String,
    pub email: SealedValue,
    pub password_hash: String,
}

/// Role predicate for company member listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoleFilter {
    /// No role predicate.
    #[default]
    Any,
    /// Only members holding this role.
    Is(String),
    /// Only members not holding this role.
    IsNot(String),
}

/// Query options for company member listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberListQuery {
    pub role_filter: RoleFilter,
    /// Maximum rows to return. Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Repository interface for member aggregate operations.
pub trait MemberRepository {
    /// Creates one member with its email index row and returns the new key.
    fn create_member(&self, member: &NewMember) -> RepoResult<MemberId>;
    /// Loads one member row by key. Withdrawn rows are returned too.
    fn get_member(&self, id: MemberId) -> RepoResult<Option<MemberRow>>;
    /// Resolves an attribute digest to a member key via the blind index.
    fn find_member_by_digest(
        &self,
        attribute: MemberAttribute,
        digest: &str,
    ) -> RepoResult<Option<MemberId>>;
    /// Cheap existence pre-check on the blind index.
    fn member_digest_exists(&self, attribute: MemberAttribute, digest: &str) -> RepoResult<bool>;
    /// Lists one company's members with role filter and pagination.
    fn list_company_members(
        &self,
        company_id: CompanyId,
        query: &MemberListQuery,
    ) -> RepoResult<Vec<MemberRow>>;
    /// Counts one company's members under the same role predicate.
    fn count_company_members(
        &self,
        company_id: CompanyId,
        role_filter: &RoleFilter,
    ) -> RepoResult<u64>;
    /// Swaps the email ciphertext and index digest atomically.
    fn swap_member_email(
        &self,
        id: MemberId,
        old_digest: &str,
        sealed: &SealedValue,
    ) -> RepoResult<()>;
    /// Replaces the credential hash.
    fn set_member_password_hash(&self, id: MemberId, password_hash: &str) -> RepoResult<()>;
    /// Replaces the role reference.
    fn set_member_role(&self, id: MemberId, role_id: &str) -> RepoResult<()>;
    /// Stamps `last_login_at` with the current time.
    fn touch_member_login(&self, id: MemberId) -> RepoResult<()>;
    /// Stamps `withdrawn_at` with the current time. Index rows are untouched.
    fn withdraw_member(&self, id: MemberId) -> RepoResult<()>;
    /// Removes the aggregate and its index row atomically.
    fn hard_delete_member(&self, id: MemberId) -> RepoResult<()>;
}

/// SQLite-backed member repository.
pub struct SqliteMemberRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemberRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_member_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl MemberRepository for SqliteMemberRepository<'_> {
    fn create_member(&self, member: &NewMember) -> RepoResult<MemberId> {
        let member_id = Uuid::new_v4();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO members (
                member_id,
                company_id,
                role_id,
                email_cipher,
                password_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                member_id.to_string(),
                member.company_id.to_string(),
                member.role_id,
                member.email.ciphertext,
                member.password_hash,
            ],
        )?;

        BlindIndexStore::new(&tx, IndexTable::Member).put(
            member_id,
            MemberAttribute::Email.as_str(),
            &member.email.digest,
        )?;

        tx.commit()?;
        Ok(member_id)
    }

    fn get_member(&self, id: MemberId) -> RepoResult<Option<MemberRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMBER_SELECT_SQL} WHERE member_id = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_member_row(row)?));
        }

        Ok(None)
    }

    fn find_member_by_digest(
        &self,
        attribute: MemberAttribute,
        digest: &str,
    ) -> RepoResult<Option<MemberId>> {
        BlindIndexStore::new(self.conn, IndexTable::Member).find_owner(attribute.as_str(), digest)
    }

    fn member_digest_exists(&self, attribute: MemberAttribute, digest: &str) -> RepoResult<bool> {
        BlindIndexStore::new(self.conn, IndexTable::Member)
            .digest_exists(attribute.as_str(), digest)
    }

    fn list_company_members(
        &self,
        company_id: CompanyId,
        query: &MemberListQuery,
    ) -> RepoResult<Vec<MemberRow>> {
        let mut sql = format!("{MEMBER_SELECT_SQL} WHERE company_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(company_id.to_string())];

        push_role_predicate(&mut sql, &mut bind_values, &query.role_filter);

        sql.push_str(" ORDER BY registered_at ASC, member_id ASC");
        let limit = normalize_member_limit(query.limit);
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_member_row(row)?);
        }

        Ok(members)
    }

    fn count_company_members(
        &self,
        company_id: CompanyId,
        role_filter: &RoleFilter,
    ) -> RepoResult<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM members WHERE company_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(company_id.to_string())];

        push_role_predicate(&mut sql, &mut bind_values, role_filter);

        let count: u64 =
            self.conn
                .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(count)
    }

    fn swap_member_email(
        &self,
        id: MemberId,
        old_digest: &str,
        sealed: &SealedValue,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE members SET email_cipher = ?2 WHERE member_id = ?1;",
            params![id.to_string(), sealed.ciphertext],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        BlindIndexStore::new(&tx, IndexTable::Member).replace(
            id,
            MemberAttribute::Email.as_str(),
            old_digest,
            &sealed.digest,
        )?;

        tx.commit()?;
        Ok(())
    }

    fn set_member_password_hash(&self, id: MemberId, password_hash: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE members SET password_hash = ?2 WHERE member_id = ?1;",
            params![id.to_string(), password_hash],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn set_member_role(&self, id: MemberId, role_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE members SET role_id = ?2 WHERE member_id = ?1;",
            params![id.to_string(), role_id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn touch_member_login(&self, id: MemberId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE members
             SET last_login_at = (strftime('%s', 'now') * 1000)
             WHERE member_id = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn withdraw_member(&self, id: MemberId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE members
             SET withdrawn_at = (strftime('%s', 'now') * 1000)
             WHERE member_id = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn hard_delete_member(&self, id: MemberId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        BlindIndexStore::new(&tx, IndexTable::Member).delete_for_owner(id)?;
        let changed = tx.execute("DELETE FROM members WHERE member_id = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        tx.commit()?;
        Ok(())
    }
}

/// Normalizes list limit according to the listing contract.
pub fn normalize_member_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) => MEMBERS_DEFAULT_LIMIT,
        Some(value) if value > MEMBERS_LIMIT_MAX => MEMBERS_LIMIT_MAX,
        Some(value) => value,
        None => MEMBERS_DEFAULT_LIMIT,
    }
}

fn push_role_predicate(sql: &mut String, bind_values: &mut Vec<Value>, role_filter: &RoleFilter) {
    match role_filter {
        RoleFilter::Any => {}
        RoleFilter::Is(role_id) => {
            sql.push_str(" AND role_id = ?");
            bind_values.push(Value::Text(role_id.clone()));
        }
        RoleFilter::IsNot(role_id) => {
            sql.push_str(" AND role_id <> ?");
            bind_values.push(Value::Text(role_id.clone()));
        }
    }
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<MemberRow> {
    let id_text: String = row.get("member_id")?;
    let member_id = parse_uuid(&id_text, "members.member_id")?;

    let company_text: String = row.get("company_id")?;
    let company_id = parse_uuid(&company_text, "members.company_id")?;

    Ok(MemberRow {
        member_id,
        company_id,
        role_id: row.get("role_id")?,
        email_cipher: row.get("email_cipher")?,
        password_hash: row.get("password_hash")?,
        registered_at: row.get("registered_at")?,
        last_login_at: row.get("last_login_at")?,
        withdrawn_at: row.get("withdrawn_at")?,
    })
}

fn ensure_member_connection_ready(conn: &Connection) -> RepoResult<()> {
    ensure_schema_current(conn)?;

    for table in ["members", "member_index"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    for column in [
        "member_id",
        "company_id",
        "role_id",
        "email_cipher",
        "password_hash",
        "registered_at",
        "last_login_at",
        "withdrawn_at",
    ] {
        if !table_has_column(conn, "members", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "members",
                column,
            });
        }
    }

    for column in ["entry_id", "member_id", "attribute", "digest"] {
        if !table_has_column(conn, "member_index", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "member_index",
                column,
            });
        }
    }

    Ok(())
}
