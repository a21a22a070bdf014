//! Company repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist company aggregates (ciphertext columns) together with their
//!   blind-index rows.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `create_company` writes the aggregate row and all five index rows in
//!   one transaction; none of them can be observed alone.
//! - Attribute swaps update ciphertext and index digest atomically.
//! - Hard delete removes the aggregate and every index row atomically.

use crate::crypto::SealedValue;
use crate::model::company::{CompanyAttribute, CompanyId};
use crate::repo::index_repo::{BlindIndexStore, IndexTable};
use crate::repo::{
    ensure_schema_current, parse_uuid, table_exists, table_has_column, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const COMPANY_SELECT_SQL: &str = "SELECT
    company_id,
    domain_cipher,
    name_cipher,
    email_cipher,
    mobile_cipher,
    address_cipher,
    is_active,
    registered_at
FROM companies";

const COMPANIES_DEFAULT_LIMIT: u32 = 10;
const COMPANIES_LIMIT_MAX: u32 = 50;

/// Persisted company row. Attribute columns hold ciphertext only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRow {
    /// Stable surrogate key.
    pub company_id: CompanyId,
    pub domain_cipher: Vec<u8>,
    pub name_cipher: Vec<u8>,
    pub email_cipher: Vec<u8>,
    pub mobile_cipher: Vec<u8>,
    pub address_cipher: Vec<u8>,
    /// Deactivation flag. Deactivated rows stay searchable.
    pub is_active: bool,
    /// Epoch ms registration timestamp.
    pub registered_at: i64,
}

/// Sealed write model for a new company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedCompany {
    pub domain: SealedValue,
    pub name: SealedValue,
    pub email: SealedValue,
    pub mobile: SealedValue,
    pub address: SealedValue,
}

impl SealedCompany {
    /// Attribute tags paired with their sealed values, in insertion order.
    pub fn attribute_entries(&self) -> [(CompanyAttribute, &SealedValue); 5] {
        [
            (CompanyAttribute::Domain, &self.domain),
            (CompanyAttribute::Name, &self.name),
            (CompanyAttribute::Email, &self.email),
            (CompanyAttribute::Mobile, &self.mobile),
            (CompanyAttribute::Address, &self.address),
        ]
    }
}

/// One ciphertext+digest swap for an attribute update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSwap {
    pub attribute: CompanyAttribute,
    /// Digest the current index entry must carry.
    pub old_digest: String,
    pub sealed: SealedValue,
}

/// Query options for company listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyListQuery {
    /// Maximum rows to return. Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Repository interface for company aggregate operations.
pub trait CompanyRepository {
    /// Creates one company with its index rows and returns the new key.
    fn create_company(&self, sealed: &SealedCompany) -> RepoResult<CompanyId>;
    /// Loads one company row by key.
    fn get_company(&self, id: CompanyId) -> RepoResult<Option<CompanyRow>>;
    /// Resolves an attribute digest to a company key via the blind index.
    fn find_company_by_digest(
        &self,
        attribute: CompanyAttribute,
        digest: &str,
    ) -> RepoResult<Option<CompanyId>>;
    /// Cheap existence pre-check on the blind index.
    fn company_digest_exists(&self, attribute: CompanyAttribute, digest: &str)
        -> RepoResult<bool>;
    /// Applies ciphertext and index swaps for one company atomically.
    fn swap_company_attributes(&self, id: CompanyId, swaps: &[AttributeSwap]) -> RepoResult<()>;
    /// Flips the activation flag. Index rows are untouched.
    fn set_company_active(&self, id: CompanyId, active: bool) -> RepoResult<()>;
    /// Removes the aggregate and all its index rows atomically.
    fn hard_delete_company(&self, id: CompanyId) -> RepoResult<()>;
    /// Lists companies, newest first, with normalized pagination.
    fn list_companies(&self, query: &CompanyListQuery) -> RepoResult<Vec<CompanyRow>>;
    /// Counts all companies for the listing envelope.
    fn count_companies(&self) -> RepoResult<u64>;
}

/// SQLite-backed company repository.
#[derive(Debug)]
pub struct SqliteCompanyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCompanyRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_company_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CompanyRepository for SqliteCompanyRepository<'_> {
    fn create_company(&self, sealed: &SealedCompany) -> RepoResult<CompanyId> {
        let company_id = Uuid::new_v4();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO companies (
                company_id,
                domain_cipher,
                name_cipher,
                email_cipher,
                mobile_cipher,
                address_cipher,
                is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1);",
            params![
                company_id.to_string(),
                sealed.domain.ciphertext,
                sealed.name.ciphertext,
                sealed.email.ciphertext,
                sealed.mobile.ciphertext,
                sealed.address.ciphertext,
            ],
        )?;

        let index = BlindIndexStore::new(&tx, IndexTable::Company);
        for (attribute, value) in sealed.attribute_entries() {
            index.put(company_id, attribute.as_str(), &value.digest)?;
        }

        tx.commit()?;
        Ok(company_id)
    }

    fn get_company(&self, id: CompanyId) -> RepoResult<Option<CompanyRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COMPANY_SELECT_SQL} WHERE company_id = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_company_row(row)?));
        }

        Ok(None)
    }

    fn find_company_by_digest(
        &self,
        attribute: CompanyAttribute,
        digest: &str,
    ) -> RepoResult<Option<CompanyId>> {
        BlindIndexStore::new(self.conn, IndexTable::Company).find_owner(attribute.as_str(), digest)
    }

    fn company_digest_exists(
        &self,
        attribute: CompanyAttribute,
        digest: &str,
    ) -> RepoResult<bool> {
        BlindIndexStore::new(self.conn, IndexTable::Company)
            .digest_exists(attribute.as_str(), digest)
    }

    fn swap_company_attributes(&self, id: CompanyId, swaps: &[AttributeSwap]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !company_exists(&tx, id)? {
            return Err(RepoError::NotFound(id));
        }

        let index = BlindIndexStore::new(&tx, IndexTable::Company);
        for swap in swaps {
            tx.execute(
                &format!(
                    "UPDATE companies SET {} = ?2 WHERE company_id = ?1;",
                    cipher_column(swap.attribute)
                ),
                params![id.to_string(), swap.sealed.ciphertext],
            )?;
            index.replace(
                id,
                swap.attribute.as_str(),
                &swap.old_digest,
                &swap.sealed.digest,
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn set_company_active(&self, id: CompanyId, active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE companies SET is_active = ?2 WHERE company_id = ?1;",
            params![id.to_string(), bool_to_int(active)],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn hard_delete_company(&self, id: CompanyId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        BlindIndexStore::new(&tx, IndexTable::Company).delete_for_owner(id)?;
        let changed = tx.execute(
            "DELETE FROM companies WHERE company_id = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        tx.commit()?;
        Ok(())
    }

    fn list_companies(&self, query: &CompanyListQuery) -> RepoResult<Vec<CompanyRow>> {
        let mut sql = format!("{COMPANY_SELECT_SQL} ORDER BY registered_at DESC, company_id ASC");
        let mut bind_values: Vec<Value> = Vec::new();

        let limit = normalize_company_limit(query.limit);
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut companies = Vec::new();
        while let Some(row) = rows.next()? {
            companies.push(parse_company_row(row)?);
        }

        Ok(companies)
    }

    fn count_companies(&self) -> RepoResult<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM companies;", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Normalizes list limit according to the listing contract.
pub fn normalize_company_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) => COMPANIES_DEFAULT_LIMIT,
        Some(value) if value > COMPANIES_LIMIT_MAX => COMPANIES_LIMIT_MAX,
        Some(value) => value,
        None => COMPANIES_DEFAULT_LIMIT,
    }
}

fn parse_company_row(row: &Row<'_>) -> RepoResult<CompanyRow> {
    let id_text: String = row.get("company_id")?;
    let company_id = parse_uuid(&id_text, "companies.company_id")?;

    let is_active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_active value `{other}` in companies.is_active"
            )));
        }
    };

    Ok(CompanyRow {
        company_id,
        domain_cipher: row.get("domain_cipher")?,
        name_cipher: row.get("name_cipher")?,
        email_cipher: row.get("email_cipher")?,
        mobile_cipher: row.get("mobile_cipher")?,
        address_cipher: row.get("address_cipher")?,
        is_active,
        registered_at: row.get("registered_at")?,
    })
}

fn cipher_column(attribute: CompanyAttribute) -> &'static str {
    match attribute {
        CompanyAttribute::Domain => "domain_cipher",
        CompanyAttribute::Name => "name_cipher",
        CompanyAttribute::Email => "email_cipher",
        CompanyAttribute::Mobile => "mobile_cipher",
        CompanyAttribute::Address => "address_cipher",
    }
}

fn company_exists(conn: &Connection, id: CompanyId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM companies
            WHERE company_id = ?1
        );",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_company_connection_ready(conn: &Connection) -> RepoResult<()> {
    ensure_schema_current(conn)?;

    for table in ["companies", "company_index"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    for column in [
        "company_id",
        "domain_cipher",
        "name_cipher",
        "email_cipher",
        "mobile_cipher",
        "address_cipher",
        "is_active",
        "registered_at",
    ] {
        if !table_has_column(conn, "companies", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "companies",
                column,
            });
        }
    }

    for column in ["entry_id", "company_id", "attribute", "digest"] {
        if !table_has_column(conn, "company_index", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "company_index",
                column,
            });
        }
    }

    Ok(())
}
