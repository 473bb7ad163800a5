//! Key derivation specs
//!
//! Verify keys are derived from declarations and call arguments.

use crate::prelude::*;
use lockguard_core::{build_key, KeyError, LockStats};
use std::sync::atomic::{AtomicBool, Ordering};
use similar_asserts::assert_eq;

struct User {
    id: String,
    user_name: String,
}

lockguard_core::key_fields!(User {
    "id" => id,
    "userName" => user_name,
});

fn alice() -> User {
    User {
        id: "u1".to_string(),
        user_name: "alice".to_string(),
    }
}

#[test]
fn raw_argument_becomes_one_segment() {
    let user = "user-7";
    let key = build_key(
        &LockSpec::new("order-42"),
        &[ArgumentBinding::raw(0)],
        &[Arg::value(&user)],
    )
    .unwrap();

    assert_eq!(key.as_str(), "/DISTRIBUTED_LOCK_order-42/user-7");
}

#[test]
fn declared_fields_become_segments_in_order() {
    let user = alice();
    let key = build_key(
        &LockSpec::new("count"),
        &[ArgumentBinding::fields(0, ["id", "userName"])],
        &[Arg::record(&user)],
    )
    .unwrap();

    assert_eq!(key.as_str(), "/DISTRIBUTED_LOCK_count/u1/alice");
}

#[test]
fn bindings_follow_declaration_order_not_argument_order() {
    let user = alice();
    let tenant = "acme";
    let key = build_key(
        &LockSpec::new("transfer"),
        &[
            ArgumentBinding::raw(1),
            ArgumentBinding::fields(0, ["userName"]),
        ],
        &[Arg::record(&user), Arg::value(&tenant)],
    )
    .unwrap();

    assert_eq!(key.as_str(), "/DISTRIBUTED_LOCK_transfer/acme/alice");
}

#[test]
fn unbound_arguments_do_not_affect_the_key() {
    let spec = LockSpec::new("order");
    let bindings = [ArgumentBinding::raw(0)];
    let first = build_key(&spec, &bindings, &[Arg::value(&1), Arg::value(&"x")]).unwrap();
    let second = build_key(&spec, &bindings, &[Arg::value(&1), Arg::value(&"y")]).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn null_argument_fails_before_contacting_the_ensemble() {
    let ensemble = InMemoryEnsemble::new();
    let guard = guard_on(&ensemble);
    let ran = AtomicBool::new(false);

    let err = guard
        .guard(
            &LockSpec::new("order"),
            &[ArgumentBinding::raw(0)],
            &[Arg::Null],
            || async {
                ran.store(true, Ordering::SeqCst);
                Ok::<_, Infallible>(())
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GuardError::KeyDerivation(KeyError::NullDynamicArgument { index: 0 })
    ));
    assert!(err.is_local());
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(ensemble.node_count(), 0);
    assert_eq!(guard.stats(), LockStats::default());
}

#[tokio::test]
async fn blank_name_is_a_configuration_error() {
    let ensemble = InMemoryEnsemble::new();
    let guard = guard_on(&ensemble);

    let err = guard
        .guard(&LockSpec::new("   "), &[], &[], || async {
            Ok::<_, Infallible>(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GuardError::Configuration(KeyError::EmptyLockName)));
}

#[tokio::test]
async fn fields_on_a_scalar_are_a_derivation_error() {
    let ensemble = InMemoryEnsemble::new();
    let guard = guard_on(&ensemble);
    let id = 42;

    let err = guard
        .guard(
            &LockSpec::new("count"),
            &[ArgumentBinding::fields(0, ["id"])],
            &[Arg::value(&id)],
            || async { Ok::<_, Infallible>(()) },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GuardError::KeyDerivation(KeyError::FieldAccess { index: 0, ref field }) if field == "id"
    ));
}
