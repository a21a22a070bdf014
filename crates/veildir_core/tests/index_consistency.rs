use rusqlite::Connection;
use secrecy::SecretVec;
use uuid::Uuid;
use veildir_core::db::open_db_in_memory;
use veildir_core::repo::company_repo::{AttributeSwap, SealedCompany};
use veildir_core::repo::index_repo::{BlindIndexStore, IndexTable};
use veildir_core::repo::member_repo::NewMember;
use veildir_core::{
    digest_hex, seal, CompanyAttribute, CompanyRepository, FieldCipher, MemberRepository,
    RepoError, SqliteCompanyRepository, SqliteMemberRepository, KEY_LEN, ROLE_USER,
};

#[test]
fn failed_company_insert_rolls_back_every_row() {
    let conn = open_db_in_memory().unwrap();
    let cipher = test_cipher();
    let repo = SqliteCompanyRepository::try_new(&conn).unwrap();
    let first = repo
        .create_company(&sealed_company(&cipher, "nhn.com", "NHN", "nhn@nhn.com"))
        .unwrap();

    // Same email digest; the aggregate row and two index rows are already
    // written when the email index insert hits the unique constraint.
    let clash = sealed_company(&cipher, "nhncloud.com", "NHN Cloud", "nhn@nhn.com");
    let err = repo.create_company(&clash).unwrap_err();

    assert!(matches!(
        err,
        RepoError::DuplicateDigest { attribute: "email" }
    ));
    assert_eq!(count_rows(&conn, "companies"), 1);
    assert_eq!(count_rows(&conn, "company_index"), 5);
    assert_eq!(
        repo.find_company_by_digest(CompanyAttribute::Domain, &digest_hex("nhncloud.com"))
            .unwrap(),
        None
    );
    assert_eq!(
        repo.find_company_by_digest(CompanyAttribute::Email, &digest_hex("nhn@nhn.com"))
            .unwrap(),
        Some(first)
    );
}

#[test]
fn failed_swap_rolls_back_ciphertext_and_index() {
    let conn = open_db_in_memory().unwrap();
    let cipher = test_cipher();
    let repo = SqliteCompanyRepository::try_new(&conn).unwrap();
    repo.create_company(&sealed_company(&cipher, "nhn.com", "NHN", "nhn@nhn.com"))
        .unwrap();
    let second = repo
        .create_company(&sealed_company(&cipher, "beta.com", "Beta", "beta@beta.com"))
        .unwrap();
    let before = repo.get_company(second).unwrap().unwrap();

    let swap = AttributeSwap {
        attribute: CompanyAttribute::Email,
        old_digest: digest_hex("beta@beta.com"),
        sealed: seal(&cipher, "nhn@nhn.com").unwrap(),
    };
    let err = repo.swap_company_attributes(second, &[swap]).unwrap_err();

    assert!(matches!(
        err,
        RepoError::DuplicateDigest { attribute: "email" }
    ));
    let after = repo.get_company(second).unwrap().unwrap();
    assert_eq!(after.email_cipher, before.email_cipher);
    assert_eq!(
        repo.find_company_by_digest(CompanyAttribute::Email, &digest_hex("beta@beta.com"))
            .unwrap(),
        Some(second)
    );
}

#[test]
fn multi_attribute_swap_is_all_or_nothing() {
    let conn = open_db_in_memory().unwrap();
    let cipher = test_cipher();
    let repo = SqliteCompanyRepository::try_new(&conn).unwrap();
    repo.create_company(&sealed_company(&cipher, "nhn.com", "NHN", "nhn@nhn.com"))
        .unwrap();
    let second = repo
        .create_company(&sealed_company(&cipher, "beta.com", "Beta", "beta@beta.com"))
        .unwrap();

    let swaps = [
        AttributeSwap {
            attribute: CompanyAttribute::Name,
            old_digest: digest_hex("Beta"),
            sealed: seal(&cipher, "Gamma").unwrap(),
        },
        AttributeSwap {
            attribute: CompanyAttribute::Email,
            old_digest: digest_hex("beta@beta.com"),
            sealed: seal(&cipher, "nhn@nhn.com").unwrap(),
        },
    ];
    let err = repo.swap_company_attributes(second, &swaps).unwrap_err();

    assert!(matches!(
        err,
        RepoError::DuplicateDigest { attribute: "email" }
    ));
    // The name swap committed nothing either.
    assert_eq!(
        repo.find_company_by_digest(CompanyAttribute::Name, &digest_hex("Beta"))
            .unwrap(),
        Some(second)
    );
    assert_eq!(
        repo.find_company_by_digest(CompanyAttribute::Name, &digest_hex("Gamma"))
            .unwrap(),
        None
    );
}

#[test]
fn swap_with_a_stale_digest_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let cipher = test_cipher();
    let repo = SqliteCompanyRepository::try_new(&conn).unwrap();
    let id = repo
        .create_company(&sealed_company(&cipher, "nhn.com", "NHN", "nhn@nhn.com"))
        .unwrap();

    let swap = AttributeSwap {
        attribute: CompanyAttribute::Email,
        old_digest: digest_hex("stale@nhn.com"),
        sealed: seal(&cipher, "fresh@nhn.com").unwrap(),
    };
    let err = repo.swap_company_attributes(id, &[swap]).unwrap_err();

    assert!(matches!(err, RepoError::StaleDigest { attribute: "email" }));
    assert_eq!(
        repo.find_company_by_digest(CompanyAttribute::Email, &digest_hex("nhn@nhn.com"))
            .unwrap(),
        Some(id)
    );
    assert_eq!(
        repo.find_company_by_digest(CompanyAttribute::Email, &digest_hex("fresh@nhn.com"))
            .unwrap(),
        None
    );
}

#[test]
fn failed_member_insert_rolls_back_every_row() {
    let conn = open_db_in_memory().unwrap();
    let cipher = test_cipher();
    let companies = SqliteCompanyRepository::try_new(&conn).unwrap();
    let company_id = companies
        .create_company(&sealed_company(&cipher, "nhn.com", "NHN", "nhn@nhn.com"))
        .unwrap();
    let members = SqliteMemberRepository::try_new(&conn).unwrap();
    members
        .create_member(&new_member(&cipher, company_id, "user@nhn.com"))
        .unwrap();

    let err = members
        .create_member(&new_member(&cipher, company_id, "user@nhn.com"))
        .unwrap_err();

    assert!(matches!(
        err,
        RepoError::DuplicateDigest { attribute: "email" }
    ));
    assert_eq!(count_rows(&conn, "members"), 1);
    assert_eq!(count_rows(&conn, "member_index"), 1);
}

#[test]
fn shared_digest_resolves_the_oldest_entry() {
    let conn = open_db_in_memory().unwrap();
    let cipher = test_cipher();
    let repo = SqliteCompanyRepository::try_new(&conn).unwrap();
    let first = repo
        .create_company(&sealed_company(&cipher, "nhn.com", "NHN", "nhn@nhn.com"))
        .unwrap();
    repo.create_company(&sealed_company(&cipher, "beta.com", "NHN", "beta@beta.com"))
        .unwrap();

    let store = BlindIndexStore::new(&conn, IndexTable::Company);
    assert_eq!(
        store.find_owner("name", &digest_hex("NHN")).unwrap(),
        Some(first)
    );
    assert!(store.digest_exists("name", &digest_hex("NHN")).unwrap());
    assert!(!store.digest_exists("name", &digest_hex("Ghost")).unwrap());
}

#[test]
fn one_index_entry_per_owner_and_attribute() {
    let conn = open_db_in_memory().unwrap();
    let cipher = test_cipher();
    let repo = SqliteCompanyRepository::try_new(&conn).unwrap();
    let id = repo
        .create_company(&sealed_company(&cipher, "nhn.com", "NHN", "nhn@nhn.com"))
        .unwrap();

    let store = BlindIndexStore::new(&conn, IndexTable::Company);
    let err = store
        .put(id, "domain", &digest_hex("second.com"))
        .unwrap_err();

    assert!(matches!(
        err,
        RepoError::DuplicateDigest {
            attribute: "domain"
        }
    ));
}

#[test]
fn delete_for_owner_reports_the_removed_rows() {
    let conn = open_db_in_memory().unwrap();
    let cipher = test_cipher();
    let repo = SqliteCompanyRepository::try_new(&conn).unwrap();
    let id = repo
        .create_company(&sealed_company(&cipher, "nhn.com", "NHN", "nhn@nhn.com"))
        .unwrap();

    let store = BlindIndexStore::new(&conn, IndexTable::Company);
    assert_eq!(store.delete_for_owner(id).unwrap(), 5);
    assert_eq!(store.delete_for_owner(id).unwrap(), 0);
}

#[test]
fn operations_on_an_unknown_company_return_not_found() {
    let conn = open_db_in_memory().unwrap();
    let cipher = test_cipher();
    let repo = SqliteCompanyRepository::try_new(&conn).unwrap();
    let ghost = Uuid::new_v4();

    let err = repo.set_company_active(ghost, false).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == ghost));

    let err = repo.hard_delete_company(ghost).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == ghost));

    let swap = AttributeSwap {
        attribute: CompanyAttribute::Email,
        old_digest: digest_hex("nhn@nhn.com"),
        sealed: seal(&cipher, "fresh@nhn.com").unwrap(),
    };
    let err = repo.swap_company_attributes(ghost, &[swap]).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == ghost));
}

fn test_cipher() -> FieldCipher {
    FieldCipher::new(SecretVec::new(vec![7; KEY_LEN])).unwrap()
}

fn sealed_company(cipher: &FieldCipher, domain: &str, name: &str, email: &str) -> SealedCompany {
    SealedCompany {
        domain: seal(cipher, domain).unwrap(),
        name: seal(cipher, name).unwrap(),
        email: seal(cipher, email).unwrap(),
        mobile: seal(cipher, "031-000-0000").unwrap(),
        address: seal(cipher, "Pangyo").unwrap(),
    }
}

fn new_member(cipher: &FieldCipher, company_id: Uuid, email: &str) -> NewMember {
    NewMember {
        company_id,
        role_id: ROLE_USER.to_string(),
        email: seal(cipher, email).unwrap(),
        password_hash: "$2a$10$registered-hash".to_string(),
    }
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
