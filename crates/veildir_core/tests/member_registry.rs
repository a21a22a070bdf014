use rusqlite::Connection;
use secrecy::SecretVec;
use uuid::Uuid;
use veildir_core::db::open_db_in_memory;
use veildir_core::{
    CompanyDraft, CompanyProfile, CompanyService, FieldCipher, MemberDraft, MemberService,
    MemberServiceError, SqliteCompanyRepository, SqliteMemberRepository, SqliteRoleRepository,
    KEY_LEN, ROLE_PENDING, ROLE_USER,
};

#[test]
fn register_links_the_member_to_its_company() {
    let conn = open_db_in_memory().unwrap();
    let company = register_host_company(&conn);
    let service = member_service(&conn);

    let profile = service.register(&member_draft()).unwrap();

    assert_eq!(profile.email, "user@nhn.com");
    assert_eq!(profile.company_id, company.company_id);
    assert_eq!(profile.company_domain, "nhn.com");
    assert_eq!(profile.role_id, ROLE_USER);
    assert!(profile.registered_at > 0);
    assert_eq!(profile.last_login_at, None);
    assert!(!profile.withdrawn);

    let found = service.find_by_email("user@nhn.com").unwrap();
    assert_eq!(found, profile);
}

#[test]
fn register_stores_ciphertext_and_one_index_row() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);

    service.register(&member_draft()).unwrap();

    let stored_email: Vec<u8> = conn
        .query_row("SELECT email_cipher FROM members;", [], |row| row.get(0))
        .unwrap();
    assert_ne!(stored_email, b"user@nhn.com".to_vec());
    assert_eq!(count_rows(&conn, "member_index"), 1);
}

#[test]
fn duplicate_email_is_rejected_without_partial_writes() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);
    service.register(&member_draft()).unwrap();

    let err = service.register(&member_draft()).unwrap_err();

    assert!(matches!(
        err,
        MemberServiceError::AlreadyRegistered { attribute: "email" }
    ));
    assert_eq!(count_rows(&conn, "members"), 1);
    assert_eq!(count_rows(&conn, "member_index"), 1);
}

#[test]
fn unknown_company_domain_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);

    let mut draft = member_draft();
    draft.company_domain = "ghost.io".to_string();
    let err = service.register(&draft).unwrap_err();

    assert!(matches!(err, MemberServiceError::CompanyNotFound));
    assert_eq!(count_rows(&conn, "members"), 0);
}

#[test]
fn missing_default_role_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = MemberService::with_default_role(
        SqliteMemberRepository::try_new(&conn).unwrap(),
        SqliteCompanyRepository::try_new(&conn).unwrap(),
        SqliteRoleRepository::try_new(&conn).unwrap(),
        test_cipher(),
        "ROLE_GHOST",
    );

    let err = service.register(&member_draft()).unwrap_err();

    assert!(matches!(err, MemberServiceError::RoleNotFound(role) if role == "ROLE_GHOST"));
    assert_eq!(count_rows(&conn, "members"), 0);
}

#[test]
fn configured_default_role_is_assigned_on_registration() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = MemberService::with_default_role(
        SqliteMemberRepository::try_new(&conn).unwrap(),
        SqliteCompanyRepository::try_new(&conn).unwrap(),
        SqliteRoleRepository::try_new(&conn).unwrap(),
        test_cipher(),
        ROLE_PENDING,
    );

    let profile = service.register(&member_draft()).unwrap();
    assert_eq!(profile.role_id, ROLE_PENDING);
}

#[test]
fn login_credentials_expose_the_stored_hash() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);
    let profile = service.register(&member_draft()).unwrap();

    let credentials = service.login_credentials("user@nhn.com").unwrap();

    assert_eq!(credentials.member_id, profile.member_id);
    assert_eq!(credentials.email, "user@nhn.com");
    assert_eq!(credentials.password_hash, member_draft().password_hash);
    assert_eq!(credentials.role_id, ROLE_USER);
}

#[test]
fn record_login_stamps_the_timestamp() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);
    let profile = service.register(&member_draft()).unwrap();
    assert_eq!(profile.last_login_at, None);

    service.record_login(profile.member_id).unwrap();

    let reloaded = service.get(profile.member_id).unwrap().unwrap();
    assert!(reloaded.last_login_at.unwrap() > 0);
}

#[test]
fn withdrawn_member_keeps_the_email_reserved() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);
    let profile = service.register(&member_draft()).unwrap();

    let withdrawn = service.withdraw(profile.member_id).unwrap();
    assert!(withdrawn.withdrawn);

    let found = service.find_by_email("user@nhn.com").unwrap();
    assert!(found.withdrawn);

    let err = service.login_credentials("user@nhn.com").unwrap_err();
    assert!(matches!(err, MemberServiceError::MemberWithdrawn));
    let err = service.record_login(profile.member_id).unwrap_err();
    assert!(matches!(err, MemberServiceError::MemberWithdrawn));

    let err = service.register(&member_draft()).unwrap_err();
    assert!(matches!(
        err,
        MemberServiceError::AlreadyRegistered { attribute: "email" }
    ));
}

#[test]
fn withdrawn_member_rejects_credential_updates() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);
    let profile = service.register(&member_draft()).unwrap();
    service.withdraw(profile.member_id).unwrap();

    let err = service
        .update_email(profile.member_id, "user@nhn.com", "new@nhn.com")
        .unwrap_err();
    assert!(matches!(err, MemberServiceError::MemberWithdrawn));

    let err = service
        .change_password(profile.member_id, &member_draft().password_hash, "replacement-hash")
        .unwrap_err();
    assert!(matches!(err, MemberServiceError::MemberWithdrawn));
}

#[test]
fn change_password_verifies_the_current_hash() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);
    let profile = service.register(&member_draft()).unwrap();

    let err = service
        .change_password(profile.member_id, "wrong-hash", "replacement-hash")
        .unwrap_err();
    assert!(matches!(err, MemberServiceError::PasswordMismatch));

    service
        .change_password(
            profile.member_id,
            &member_draft().password_hash,
            "replacement-hash",
        )
        .unwrap();

    let credentials = service.login_credentials("user@nhn.com").unwrap();
    assert_eq!(credentials.password_hash, "replacement-hash");
}

#[test]
fn change_role_requires_a_catalog_role() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);
    let profile = service.register(&member_draft()).unwrap();

    let err = service
        .change_role(profile.member_id, "ROLE_GHOST")
        .unwrap_err();
    assert!(matches!(err, MemberServiceError::RoleNotFound(role) if role == "ROLE_GHOST"));

    let updated = service.change_role(profile.member_id, ROLE_PENDING).unwrap();
    assert_eq!(updated.role_id, ROLE_PENDING);
}

#[test]
fn update_email_repoints_the_index_entry() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);
    let profile = service.register(&member_draft()).unwrap();

    let updated = service
        .update_email(profile.member_id, "user@nhn.com", "renamed@nhn.com")
        .unwrap();

    assert_eq!(updated.email, "renamed@nhn.com");
    let err = service.find_by_email("user@nhn.com").unwrap_err();
    assert!(matches!(err, MemberServiceError::MemberNotFound));
    let found = service.find_by_email("renamed@nhn.com").unwrap();
    assert_eq!(found.member_id, profile.member_id);
    assert_eq!(count_rows(&conn, "member_index"), 1);
}

#[test]
fn update_email_rejects_a_wrong_current_value() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);
    let profile = service.register(&member_draft()).unwrap();

    let err = service
        .update_email(profile.member_id, "wrong@nhn.com", "renamed@nhn.com")
        .unwrap_err();

    assert!(matches!(
        err,
        MemberServiceError::CurrentValueMismatch { attribute: "email" }
    ));
    assert_eq!(
        service.find_by_email("user@nhn.com").unwrap().member_id,
        profile.member_id
    );
}

#[test]
fn hard_delete_removes_the_member_but_not_the_company() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);
    let profile = service.register(&member_draft()).unwrap();

    service.hard_delete(profile.member_id).unwrap();

    assert_eq!(count_rows(&conn, "members"), 0);
    assert_eq!(count_rows(&conn, "member_index"), 0);
    assert_eq!(count_rows(&conn, "companies"), 1);
    assert_eq!(service.get(profile.member_id).unwrap(), None);
}

#[test]
fn get_with_an_unknown_key_is_none() {
    let conn = open_db_in_memory().unwrap();
    let service = member_service(&conn);

    assert_eq!(service.get(Uuid::new_v4()).unwrap(), None);
}

#[test]
fn malformed_member_draft_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    register_host_company(&conn);
    let service = member_service(&conn);

    let mut invalid = member_draft();
    invalid.email = "user-at-nhn.com".to_string();
    let err = service.register(&invalid).unwrap_err();

    assert!(matches!(err, MemberServiceError::Validation(_)));
    assert_eq!(count_rows(&conn, "members"), 0);
}

fn member_service(
    conn: &Connection,
) -> MemberService<SqliteMemberRepository<'_>, SqliteCompanyRepository<'_>, SqliteRoleRepository<'_>>
{
    MemberService::new(
        SqliteMemberRepository::try_new(conn).unwrap(),
        SqliteCompanyRepository::try_new(conn).unwrap(),
        SqliteRoleRepository::try_new(conn).unwrap(),
        test_cipher(),
    )
}

fn register_host_company(conn: &Connection) -> CompanyProfile {
    let service = CompanyService::new(
        SqliteCompanyRepository::try_new(conn).unwrap(),
        test_cipher(),
    );
    service
        .register(&CompanyDraft {
            domain: "nhn.com".to_string(),
            name: "NHN".to_string(),
            email: "nhn@nhn.com".to_string(),
            mobile: "031-000-0000".to_string(),
            address: "Pangyo".to_string(),
        })
        .unwrap()
}

fn test_cipher() -> FieldCipher {
    FieldCipher::new(SecretVec::new(vec![7; KEY_LEN])).unwrap()
}

fn member_draft() -> MemberDraft {
    MemberDraft {
        company_domain: "nhn.com".to_string(),
        email: "user@nhn.com".to_string(),
        password_hash: "$2a$10$registered-hash".to_string(),
    }
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
