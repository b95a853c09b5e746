//! Vendor error translation seen from repository callers.

mod common;

use std::error::Error as _;

use common::{Fixture, Member, ServiceError};
use proptest::prelude::*;
use txsync::access::SqlTemplate;
use txsync::dao::{DataAccessError, ErrorCodeRegistry, ErrorCodeTable, ErrorKind, ErrorTranslator};
use txsync::driver::VendorError;
use txsync::memdb::codes;
use txsync::transaction::ScopeKey;

/// Save `member`, retrying with a suffixed id while the id is taken.
fn save_with_retry(fx: &Fixture, member: &Member) -> Result<String, ServiceError> {
    let mut candidate = member.member_id.clone();
    for attempt in 1..=5 {
        let scope = ScopeKey::new();
        let result = fx.template.run(&scope, || -> Result<(), ServiceError> {
            fx.repo.save(&scope, &Member::new(&candidate, member.money))?;
            Ok(())
        });
        match result {
            Ok(()) => return Ok(candidate),
            Err(ServiceError::Data(e)) if e.is_duplicate_key() => {
                candidate = format!("{}_{}", member.member_id, attempt);
            }
            Err(e) => return Err(e),
        }
    }
    Err(ServiceError::Validation("no free member id".into()))
}

#[test]
fn test_duplicate_key_then_retry_with_new_id() {
    let fx = Fixture::new("translate-retry").with_members(&[("myId", 10000)]);

    let saved = save_with_retry(&fx, &Member::new("myId", 5000)).unwrap();

    assert_eq!(saved, "myId_1");
    assert_eq!(fx.money("myId"), 10000);
    assert_eq!(fx.money("myId_1"), 5000);
    assert!(fx.all_released());
}

#[test]
fn test_duplicate_key_translated_once() {
    let fx = Fixture::new("translate-once").with_members(&[("memberA", 10000)]);
    let scope = ScopeKey::new();

    let err = fx.repo.save(&scope, &Member::new("memberA", 1)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert!(err.is_duplicate_key());
    let vendor = err.source().unwrap().downcast_ref::<VendorError>().unwrap();
    assert_eq!(vendor.code(), codes::DUPLICATE_KEY);
    assert!(vendor.source().is_none());
}

#[test]
fn test_bad_grammar_is_not_recoverable() {
    let fx = Fixture::new("translate-grammar");
    let sql = SqlTemplate::from_manager(&fx.manager);

    let err = sql
        .query(&ScopeKey::new(), "select * from membr", &[], |row| Ok(row.clone()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxOrSchema);
    assert!(!err.is_recoverable());
    assert_eq!(err.sql(), Some("select * from membr"));

    let err = sql.execute(&ScopeKey::new(), "selec * from member").unwrap_err();
    assert!(matches!(err, DataAccessError::BadSqlGrammar { .. }));
}

#[test]
fn test_not_null_violation_is_constraint() {
    let fx = Fixture::new("translate-not-null");
    let sql = SqlTemplate::from_manager(&fx.manager);

    let err = sql
        .update(
            &ScopeKey::new(),
            "insert into member(member_id, money) values (?, ?)",
            &[serde_json::json!("memberA"), serde_json::Value::Null],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert!(!err.is_duplicate_key());
}

#[test]
fn test_custom_registry_with_manager() {
    let mut registry = ErrorCodeRegistry::default();
    registry.register("MemDB", Default::default());
    let fx = Fixture::new("translate-custom");
    let manager = fx
        .manager
        .clone()
        .with_translator(ErrorTranslator::from_registry(&registry, "MemDB"));
    let sql = SqlTemplate::from_manager(&manager);
    let scope = ScopeKey::new();

    let insert = "insert into member values (?, ?)";
    let row = [serde_json::json!("a"), serde_json::json!(1)];
    sql.update(&scope, insert, &row).unwrap();
    // an empty table still classifies by SQLSTATE
    let err = sql.update(&scope, insert, &row).unwrap_err();
    assert!(err.is_duplicate_key());
}

fn codes_for(vendor: &str, pick: fn(&ErrorCodeTable) -> Vec<String>) -> Vec<i32> {
    let table = ErrorCodeRegistry::builtin().table(vendor).unwrap();
    pick(table).iter().filter_map(|c| c.parse().ok()).collect()
}

fn duplicate_codes(vendor: &str) -> Vec<i32> {
    codes_for(vendor, |t| t.duplicate_key_codes.iter().cloned().collect())
}

fn grammar_codes(vendor: &str) -> Vec<i32> {
    codes_for(vendor, |t| t.bad_sql_grammar_codes.iter().cloned().collect())
}

proptest! {
    #[test]
    fn test_h2_duplicate_codes_are_constraint_violations(
        code in prop::sample::select(duplicate_codes("H2")),
        message in ".{0,40}",
    ) {
        let vendor = VendorError::new(code, message);
        let err = ErrorTranslator::for_vendor("H2").translate("insert", "insert", vendor);
        prop_assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        prop_assert!(err.is_duplicate_key());
    }

    #[test]
    fn test_h2_grammar_codes_are_syntax_errors(
        code in prop::sample::select(grammar_codes("H2")),
    ) {
        let vendor = VendorError::new(code, "bad");
        let err = ErrorTranslator::for_vendor("H2").translate("select", "select", vendor);
        prop_assert_eq!(err.kind(), ErrorKind::SyntaxOrSchema);
    }

    #[test]
    fn test_unknown_codes_are_data_access_errors(code in 90_000i32..100_000) {
        let vendor = VendorError::new(code, "other");
        let err = ErrorTranslator::for_vendor("MemDB").translate("op", "sql", vendor);
        prop_assert_eq!(err.kind(), ErrorKind::DataAccess);
    }
}
