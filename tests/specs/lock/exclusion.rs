//! Mutual exclusion specs
//!
//! Verify invocations with the same key never overlap and waiting is bounded.

use crate::prelude::*;

const USER_7: &str = "/DISTRIBUTED_LOCK_order/user-7";

fn order_lock(timeout_ms: u64) -> LockSpec {
    LockSpec::new("order").with_timeout(timeout_ms, TimeUnit::Milliseconds)
}

#[tokio::test(start_paused = true)]
async fn second_invocation_waits_for_first_and_never_overlaps() {
    let ensemble = InMemoryEnsemble::new();
    let spec = LockSpec::new("order").with_timeout(2, TimeUnit::Seconds);

    let a = spawn_invocation(
        guard_on(&ensemble),
        spec.clone(),
        "user-7",
        Duration::from_secs(1),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    let b_started = Instant::now();
    let b = spawn_invocation(guard_on(&ensemble), spec, "user-7", Duration::ZERO);

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert!(!a.overlaps(&b));
    assert!(b.entered >= a.left);
    let waited = b.entered.duration_since(b_started);
    assert!(
        waited >= Duration::from_millis(900) && waited < Duration::from_millis(950),
        "waited {waited:?}"
    );
    assert!(ensemble.is_free(USER_7));
}

#[tokio::test(start_paused = true)]
async fn many_contenders_take_turns() {
    let ensemble = InMemoryEnsemble::new();
    let tasks: Vec<_> = (0..5)
        .map(|_| {
            spawn_invocation(
                guard_on(&ensemble),
                order_lock(5_000),
                "user-7",
                Duration::from_millis(100),
            )
        })
        .collect();

    let mut visits = Vec::new();
    for task in tasks {
        visits.push(task.await.unwrap().unwrap());
    }

    for (i, a) in visits.iter().enumerate() {
        for b in &visits[i + 1..] {
            assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
        }
    }
    assert_eq!(ensemble.node_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn different_keys_do_not_block_each_other() {
    let ensemble = InMemoryEnsemble::new();
    let start = Instant::now();

    let a = spawn_invocation(
        guard_on(&ensemble),
        order_lock(100),
        "user-7",
        Duration::from_secs(1),
    );
    let b = spawn_invocation(
        guard_on(&ensemble),
        order_lock(100),
        "user-8",
        Duration::from_secs(1),
    );

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();
    assert!(a.overlaps(&b));
    assert_eq!(b.entered, start);
}

#[tokio::test(start_paused = true)]
async fn waiter_gives_up_after_its_timeout_and_leaves_nothing_behind() {
    let ensemble = InMemoryEnsemble::new();

    let a = spawn_invocation(
        guard_on(&ensemble),
        order_lock(100),
        "user-7",
        Duration::from_secs(1),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;

    let guard = guard_on(&ensemble);
    let start = Instant::now();
    let err = guard
        .guard(
            &order_lock(200),
            &[ArgumentBinding::raw(0)],
            &[Arg::value(&"user-7")],
            || async { Ok::<_, Infallible>(()) },
        )
        .await
        .unwrap_err();

    assert!(err.is_busy());
    assert_eq!(
        err.to_string(),
        "lock /DISTRIBUTED_LOCK_order/user-7 is busy, please retry later (waited 200ms)"
    );
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(200) && waited < Duration::from_millis(250));
    assert_eq!(ensemble.children(USER_7), vec!["lock-0000000000"]);
    assert_eq!(guard.stats().timeouts, 1);

    a.await.unwrap().unwrap();
    assert!(ensemble.is_free(USER_7));
}

#[tokio::test]
async fn operation_runs_after_acquisition_and_lock_is_released() {
    let ensemble = InMemoryEnsemble::new();
    let guard = guard_on(&ensemble);

    let holder_during = guard
        .guard_as(
            &HolderId::new("h1"),
            &order_lock(100),
            &[ArgumentBinding::raw(0)],
            &[Arg::value(&"user-7")],
            || async { Ok::<_, Infallible>(ensemble.holder(USER_7)) },
        )
        .await
        .unwrap();

    assert_eq!(holder_during, Some(HolderId::new("h1")));
    assert!(ensemble.is_free(USER_7));
    assert_eq!(guard.stats().acquired, 1);
}

#[tokio::test]
async fn same_holder_reenters_its_own_lock() {
    let ensemble = InMemoryEnsemble::new();
    let guard = guard_on(&ensemble);
    let holder = HolderId::new("outer");
    let spec = order_lock(100);
    let bindings = [ArgumentBinding::raw(0)];
    let user = "user-7";
    let args = [Arg::value(&user)];

    let inner = guard
        .guard_as(&holder, &spec, &bindings, &args, || async {
            let inner = guard
                .guard_as(&holder, &spec, &bindings, &args, || async {
                    Ok::<_, Infallible>(ensemble.children(USER_7).len())
                })
                .await;
            Ok::<_, Infallible>((inner, ensemble.is_free(USER_7)))
        })
        .await
        .unwrap();

    let (nodes_inside, free_after_inner) = inner;
    assert_eq!(nodes_inside.unwrap(), 1);
    assert!(!free_after_inner);
    assert!(ensemble.is_free(USER_7));
}
