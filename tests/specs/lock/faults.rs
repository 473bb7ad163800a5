//! Fault handling specs
//!
//! Verify every outcome is classified and the lock is always given back.

use crate::prelude::*;
use lockguard_core::CoordinationError;

const USER_7: &str = "/DISTRIBUTED_LOCK_order/user-7";

async fn exploding() -> Result<(), Infallible> {
    panic!("operation exploded")
}

fn order_lock() -> LockSpec {
    LockSpec::new("order").with_timeout(5, TimeUnit::Seconds)
}

#[tokio::test(start_paused = true)]
async fn session_expiry_while_waiting_is_a_coordination_fault() {
    let ensemble = InMemoryEnsemble::new();
    let holder = spawn_invocation(
        guard_on(&ensemble),
        order_lock(),
        "user-7",
        Duration::from_secs(1),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;

    let session = ensemble.connect();
    let session_id = session.id();
    let guard = InvocationGuard::new(LockCoordinator::new(session));
    let waiter = tokio::spawn(async move {
        let result = guard
            .guard(
                &order_lock(),
                &[ArgumentBinding::raw(0)],
                &[Arg::value(&"user-7")],
                || async { Ok::<_, Infallible>(()) },
            )
            .await;
        (result, guard.stats())
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    ensemble.expire_session(session_id);

    let (result, stats) = waiter.await.unwrap();
    let err = result.unwrap_err();
    assert!(!err.is_busy());
    assert!(matches!(
        err,
        GuardError::Coordination {
            source: CoordinationError::SessionExpired(_),
            ..
        }
    ));
    assert_eq!(stats.acquire_faults, 1);

    holder.await.unwrap().unwrap();
    assert!(ensemble.is_free(USER_7));
}

#[tokio::test]
async fn unreachable_ensemble_never_runs_the_operation() {
    let ensemble = InMemoryEnsemble::new();
    let guard = guard_on(&ensemble);
    ensemble.set_unavailable(true);

    let mut ran = false;
    let err = guard
        .guard(
            &order_lock(),
            &[ArgumentBinding::raw(0)],
            &[Arg::value(&"user-7")],
            || {
                ran = true;
                async { Ok::<_, Infallible>(()) }
            },
        )
        .await
        .unwrap_err();

    assert!(!ran);
    assert!(matches!(
        err,
        GuardError::Coordination {
            source: CoordinationError::ConnectionLoss(_),
            ..
        }
    ));
    assert_eq!(err.key().map(|k| k.as_str()), Some(USER_7));
}

#[tokio::test]
async fn operation_error_passes_through_and_lock_is_released() {
    let ensemble = InMemoryEnsemble::new();
    let guard = guard_on(&ensemble);

    let err = guard
        .guard(
            &order_lock(),
            &[ArgumentBinding::raw(0)],
            &[Arg::value(&"user-7")],
            || async { Err::<(), _>("insufficient stock") },
        )
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "insufficient stock");
    assert_eq!(err.into_operation(), Some("insufficient stock"));
    assert!(ensemble.is_free(USER_7));
}

#[tokio::test]
async fn failed_release_keeps_the_operation_result() {
    let ensemble = InMemoryEnsemble::new();
    let guard = guard_on(&ensemble);
    ensemble.fail_next_release(CoordinationError::ConnectionLoss("reset".into()));

    let value = guard
        .guard(
            &order_lock(),
            &[ArgumentBinding::raw(0)],
            &[Arg::value(&"user-7")],
            || async { Ok::<_, Infallible>(7) },
        )
        .await
        .unwrap();

    assert_eq!(value, 7);
    assert_eq!(guard.stats().release_failures, 1);
    // The handle is dropped after the failed release, retiring its node
    assert!(ensemble.is_free(USER_7));
}

#[tokio::test]
async fn panicking_operation_releases_before_the_panic_resumes() {
    let ensemble = InMemoryEnsemble::new();
    let guard = guard_on(&ensemble);

    let task = tokio::spawn(async move {
        guard
            .guard(
                &order_lock(),
                &[ArgumentBinding::raw(0)],
                &[Arg::value(&"user-7")],
                exploding,
            )
            .await
    });

    let err = task.await.unwrap_err();
    assert!(err.is_panic());
    assert!(ensemble.is_free(USER_7));
    assert_eq!(ensemble.node_count(), 0);
}
