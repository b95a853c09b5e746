//! Resource release under failure.

mod common;

use std::sync::atomic::Ordering;

use common::{Fixture, ServiceError};
use serde_json::json;
use txsync::dao::ErrorKind;
use txsync::transaction::{ReleaseStep, ResourceHandle, ScopeKey};

#[test]
fn test_commit_failure_releases_exactly_once() {
    let fx = Fixture::new("release-commit").with_members(&[("memberA", 10000), ("memberB", 10000)]);
    fx.source.faults.commit.store(true, Ordering::SeqCst);
    let scope = ScopeKey::new();

    let err = fx
        .service
        .account_transfer(&scope, "memberA", "memberB", 2000)
        .unwrap_err();

    match err {
        ServiceError::Data(e) => {
            assert_eq!(e.kind(), ErrorKind::DataAccess);
            assert_eq!(e.operation(), Some("commit"));
            assert_eq!(e.vendor_error().map(|v| v.code()), Some(90067));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(fx.source.counters.acquired(), 1);
    assert_eq!(fx.source.counters.close_attempts(), 1);
    assert_eq!(fx.source.counters.rollbacks(), 1);
    assert!(!fx.manager.store().is_bound(&scope));
    assert_eq!(fx.manager.active_count(), 0);

    fx.source.faults.commit.store(false, Ordering::SeqCst);
    assert_eq!(fx.money("memberA"), 10000);
    assert_eq!(fx.money("memberB"), 10000);
    assert!(fx.all_released());
}

#[test]
fn test_release_steps_are_isolated() {
    let fx = Fixture::new("release-steps").with_members(&[("memberA", 10000)]);
    let mut handle = ResourceHandle::acquire(fx.source.as_ref()).unwrap();
    handle.begin_transaction().unwrap();
    handle
        .update("update member set money = ? where member_id = ?", &[json!(0), json!("memberA")])
        .unwrap();
    let stmt = handle.prepare("select * from member").unwrap();
    handle.execute_query(stmt, &[]).unwrap();

    let faults = &fx.source.faults;
    faults.close_statement.store(true, Ordering::SeqCst);
    faults.restore_auto_commit.store(true, Ordering::SeqCst);
    faults.close.store(true, Ordering::SeqCst);

    let err = handle.release().unwrap_err();
    assert_eq!(err.failures.len(), 3);
    assert!(err.failed(ReleaseStep::CloseStatement));
    assert!(err.failed(ReleaseStep::RestoreAutoCommit));
    assert!(err.failed(ReleaseStep::CloseConnection));
    assert!(!err.failed(ReleaseStep::CloseCursor));
    assert!(!err.failed(ReleaseStep::Rollback));

    // later steps ran despite earlier failures
    assert_eq!(fx.source.counters.rollbacks(), 1);
    assert_eq!(fx.source.counters.close_attempts(), 1);
    assert!(fx.all_released());

    // second release is a no-op
    handle.release().unwrap();
    assert_eq!(fx.source.counters.close_attempts(), 1);

    faults.close_statement.store(false, Ordering::SeqCst);
    faults.restore_auto_commit.store(false, Ordering::SeqCst);
    faults.close.store(false, Ordering::SeqCst);
    assert_eq!(fx.money("memberA"), 10000);
}

#[test]
fn test_release_failure_does_not_mask_work_failure() {
    let fx = Fixture::new("release-mask").with_members(&[("memberA", 10000), ("ex", 10000)]);
    fx.source.faults.close.store(true, Ordering::SeqCst);

    let err = fx
        .service
        .account_transfer(&ScopeKey::new(), "memberA", "ex", 2000)
        .unwrap_err();

    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(fx.source.counters.close_attempts(), 1);
}

#[test]
fn test_release_failure_after_commit_is_not_an_error() {
    let fx = Fixture::new("release-after-commit")
        .with_members(&[("memberA", 10000), ("memberB", 10000)]);
    fx.source.faults.close.store(true, Ordering::SeqCst);

    fx.service
        .account_transfer(&ScopeKey::new(), "memberA", "memberB", 2000)
        .unwrap();

    fx.source.faults.close.store(false, Ordering::SeqCst);
    assert_eq!(fx.money("memberA"), 8000);
    assert_eq!(fx.money("memberB"), 12000);
}

#[test]
fn test_rollback_failure_surfaces_original_error() {
    let fx = Fixture::new("release-rollback").with_members(&[("memberA", 10000), ("ex", 10000)]);
    fx.source.faults.rollback.store(true, Ordering::SeqCst);
    let scope = ScopeKey::new();

    let err = fx
        .service
        .account_transfer(&scope, "memberA", "ex", 2000)
        .unwrap_err();

    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(fx.source.counters.close_attempts(), 1);
    assert!(!fx.manager.store().is_bound(&scope));
    assert!(fx.all_released());

    // the debit made before the failure must not survive release
    fx.source.faults.rollback.store(false, Ordering::SeqCst);
    assert_eq!(fx.money("memberA"), 10000);
    assert_eq!(fx.money("ex"), 10000);
}

#[test]
fn test_failed_rollback_leaves_auto_commit_off() {
    let fx = Fixture::new("release-no-restore").with_members(&[("memberA", 10000)]);
    let mut handle = ResourceHandle::acquire(fx.source.as_ref()).unwrap();
    handle.begin_transaction().unwrap();
    handle
        .update("update member set money = ? where member_id = ?", &[json!(0), json!("memberA")])
        .unwrap();

    fx.source.faults.rollback.store(true, Ordering::SeqCst);
    let err = handle.release().unwrap_err();
    fx.source.faults.rollback.store(false, Ordering::SeqCst);

    assert!(err.failed(ReleaseStep::Rollback));
    assert!(err.failed(ReleaseStep::RestoreAutoCommit));
    assert!(!err.failed(ReleaseStep::CloseConnection));
    assert_eq!(fx.source.counters.close_attempts(), 1);
    assert_eq!(fx.money("memberA"), 10000);
}

#[test]
fn test_failed_commit_and_rollback_commit_nothing() {
    let fx = Fixture::new("release-commit-rollback")
        .with_members(&[("memberA", 10000), ("memberB", 10000)]);
    fx.source.faults.commit.store(true, Ordering::SeqCst);
    fx.source.faults.rollback.store(true, Ordering::SeqCst);

    let err = fx
        .service
        .account_transfer(&ScopeKey::new(), "memberA", "memberB", 2000)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Data(ref e) if e.operation() == Some("commit")));

    fx.source.faults.commit.store(false, Ordering::SeqCst);
    fx.source.faults.rollback.store(false, Ordering::SeqCst);
    assert_eq!(fx.money("memberA"), 10000);
    assert_eq!(fx.money("memberB"), 10000);
    assert!(fx.all_released());
}

#[test]
fn test_begin_failure_skips_work() {
    let fx = Fixture::new("release-begin");
    fx.source.faults.get_connection.store(true, Ordering::SeqCst);
    let scope = ScopeKey::new();
    let mut ran = false;

    let err = fx
        .template
        .run(&scope, || -> Result<(), ServiceError> {
            ran = true;
            Ok(())
        })
        .unwrap_err();

    assert!(!ran);
    match err {
        ServiceError::Data(e) => assert_eq!(e.operation(), Some("begin")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fx.manager.store().is_bound(&scope));
}
