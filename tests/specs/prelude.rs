//! Shared helpers for specs

#![allow(dead_code)]

pub use lockguard_adapters::{EnsembleSession, InMemoryEnsemble};
pub use lockguard_core::{
    Arg, ArgumentBinding, GuardError, HolderId, InvocationGuard, LockCoordinator, LockSpec,
    TimeUnit,
};
pub use std::convert::Infallible;
pub use std::sync::Arc;
pub use std::time::Duration;
pub use tokio::time::Instant;

/// Guard whose invocations run on a fresh session of `ensemble`
pub fn guard_on(ensemble: &InMemoryEnsemble) -> InvocationGuard<EnsembleSession> {
    InvocationGuard::new(LockCoordinator::new(ensemble.connect()))
}

/// When an invocation entered and left its critical section
#[derive(Clone, Copy, Debug)]
pub struct Visit {
    pub entered: Instant,
    pub left: Instant,
}

impl Visit {
    pub fn overlaps(&self, other: &Visit) -> bool {
        self.entered < other.left && other.entered < self.left
    }
}

/// Operation body that records its visit and holds the lock for `hold`
pub async fn hold_for(hold: Duration) -> Result<Visit, Infallible> {
    let entered = Instant::now();
    tokio::time::sleep(hold).await;
    Ok(Visit {
        entered,
        left: Instant::now(),
    })
}

/// Spawn one guarded invocation with a single raw argument
pub fn spawn_invocation(
    guard: InvocationGuard<EnsembleSession>,
    spec: LockSpec,
    arg: &'static str,
    hold: Duration,
) -> tokio::task::JoinHandle<Result<Visit, GuardError<Infallible>>> {
    tokio::spawn(async move {
        guard
            .guard(&spec, &[ArgumentBinding::raw(0)], &[Arg::value(&arg)], || {
                hold_for(hold)
            })
            .await
    })
}
