mod common;

use common::{Call, MockDriver, Op};
use connscope::prelude::*;
use connscope::{ScopeErrorKind, has_active_scope};

#[test]
fn default_scope_update_and_release() {
    let driver = MockDriver::new();
    let scope = ConnectionScope::open(&driver.provider()).unwrap();
    assert!(!scope.is_transactional());
    assert_eq!(scope.mode(), None);
    assert_eq!(scope.state(), State::Active);
    assert!(scope.connection().auto_commit());

    let affected = scope
        .execute(|exec| exec.update("INSERT INTO heroes (name) VALUES (?)", &["Ada".into()]))
        .unwrap();
    assert_eq!(affected.first(), Some(&1));
    assert_eq!(driver.durable(), vec!["INSERT INTO heroes (name) VALUES (?)"]);

    scope.close().unwrap();
    assert_eq!(scope.state(), State::Terminated);
    assert_eq!(driver.count(&Call::Close), 1);
    assert_eq!(driver.acquired(), 1);
}

#[test]
fn default_scope_enables_auto_commit_on_open() {
    let driver = MockDriver::new();
    let scope = DefaultScope::open(&driver.provider()).unwrap();
    assert_eq!(driver.control_calls(), vec![Call::SetAutoCommit(true)]);
    scope.close().unwrap();
}

#[test]
fn default_scope_rejects_commit_and_rollback() {
    let driver = MockDriver::new();
    let scope = ConnectionScope::open(&driver.provider()).unwrap();

    let err = scope.commit().unwrap_err();
    assert_eq!(err.scope_kind(), Some(ScopeErrorKind::NotTransactional));
    assert!(err.is_misuse());
    let err = scope.rollback().unwrap_err();
    assert_eq!(err.scope_kind(), Some(ScopeErrorKind::NotTransactional));

    scope.close().unwrap();

    // Still rejected the same way once terminated.
    let err = scope.commit().unwrap_err();
    assert_eq!(err.scope_kind(), Some(ScopeErrorKind::NotTransactional));
    let err = scope.rollback().unwrap_err();
    assert_eq!(err.scope_kind(), Some(ScopeErrorKind::NotTransactional));

    assert!(!driver.calls().contains(&Call::Commit));
    assert!(!driver.calls().contains(&Call::Rollback));
}

#[test]
fn default_scope_passes_errors_through_unchanged() {
    let driver = MockDriver::new();
    let scope = ConnectionScope::open(&driver.provider()).unwrap();

    let err = scope
        .execute(|_| -> Result<()> { Err(Error::custom("validation failed")) })
        .unwrap_err();
    assert_eq!(err.to_string(), "validation failed");
    assert!(err.suppressed().is_none());
    assert!(!driver.calls().contains(&Call::Rollback));

    driver.fail(Op::Execute);
    let err = scope
        .execute(|exec| exec.update("DELETE FROM heroes", &[]))
        .unwrap_err();
    assert!(err.is_statement_error());
    assert_eq!(scope.state(), State::Active);
}

#[test]
fn default_scope_auto_commit_failure_releases_connection() {
    let driver = MockDriver::new();
    driver.fail(Op::SetAutoCommit(true));

    let err = ConnectionScope::open(&driver.provider()).unwrap_err();
    assert_eq!(err.scope_kind(), Some(ScopeErrorKind::Configure));
    assert!(
        err.to_string()
            .contains("Failed to set auto-commit for non-transactional scope")
    );
    assert_eq!(driver.count(&Call::Close), 1);
    assert!(!has_active_scope());

    driver.heal(Op::SetAutoCommit(true));
    let scope = ConnectionScope::open(&driver.provider()).unwrap();
    scope.close().unwrap();
}

#[test]
fn default_scope_close_failure_still_terminates() {
    let driver = MockDriver::new();
    let scope = ConnectionScope::open(&driver.provider()).unwrap();
    driver.fail(Op::Close);

    let err = scope.close().unwrap_err();
    assert_eq!(err.scope_kind(), Some(ScopeErrorKind::Release));
    assert_eq!(scope.state(), State::Terminated);
    assert!(!has_active_scope());

    // Nothing further happens on a second close.
    scope.close().unwrap();
    assert_eq!(driver.count(&Call::Close), 1);
}

#[test]
fn dropping_default_scope_releases_connection() {
    let driver = MockDriver::new();
    {
        let _scope = ConnectionScope::open(&driver.provider()).unwrap();
        assert!(has_active_scope());
    }
    assert!(!has_active_scope());
    assert_eq!(driver.count(&Call::Close), 1);
}
