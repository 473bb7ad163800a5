// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Acquire / execute / release protocol around one guarded operation

use super::mutex::{CoordinationError, DistributedMutex, MutexFactory};
use crate::error::GuardError;
use crate::id::HolderId;
use crate::key::LockKey;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

/// Extra time allowed on top of the lock timeout before the wait is abandoned
pub const DEFAULT_ACQUIRE_GRACE: Duration = Duration::from_millis(250);

const UNRESPONSIVE: &str = "acquire did not return within timeout and grace";

/// Snapshot of a coordinator's outcome counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockStats {
    pub acquired: u64,
    pub timeouts: u64,
    pub acquire_faults: u64,
    pub release_failures: u64,
}

#[derive(Default)]
struct Counters {
    acquired: AtomicU64,
    timeouts: AtomicU64,
    acquire_faults: AtomicU64,
    release_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LockStats {
        LockStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            acquire_faults: self.acquire_faults.load(Ordering::Relaxed),
            release_failures: self.release_failures.load(Ordering::Relaxed),
        }
    }
}

/// Runs operations while holding a distributed mutex
///
/// A fresh handle is created for every call; nothing is cached between
/// calls, even for identical keys.
#[derive(Clone)]
pub struct LockCoordinator<F> {
    factory: F,
    grace: Duration,
    counters: Arc<Counters>,
}

impl<F: MutexFactory> LockCoordinator<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            grace: DEFAULT_ACQUIRE_GRACE,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn stats(&self) -> LockStats {
        self.counters.snapshot()
    }

    /// Run `operation` while holding the mutex for `key`
    ///
    /// The operation is never invoked unless the mutex was acquired, and a
    /// mutex that was acquired is released on every exit path, including a
    /// panic inside the operation. A failing release is logged and counted
    /// but the caller still gets the operation's own outcome.
    pub async fn with_lock<T, E, Op, Fut>(
        &self,
        key: &LockKey,
        timeout: Duration,
        holder: &HolderId,
        operation: Op,
    ) -> Result<T, GuardError<E>>
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let span = tracing::info_span!("lock.with_lock", key = %key, holder = %holder);
        self.run(key, timeout, holder, operation)
            .instrument(span)
            .await
    }

    async fn run<T, E, Op, Fut>(
        &self,
        key: &LockKey,
        timeout: Duration,
        holder: &HolderId,
        operation: Op,
    ) -> Result<T, GuardError<E>>
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut mutex = self.factory.create(key.as_str(), holder).map_err(|source| {
            Counters::bump(&self.counters.acquire_faults);
            tracing::error!(error = %source, "could not create mutex handle");
            GuardError::Coordination {
                key: key.clone(),
                source,
            }
        })?;

        let start = Instant::now();
        let attempt = tokio::time::timeout(
            timeout.saturating_add(self.grace),
            mutex.try_acquire(timeout),
        )
        .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match attempt {
            Ok(Ok(true)) => {
                Counters::bump(&self.counters.acquired);
                tracing::debug!(elapsed_ms, "acquired");
            }
            Ok(Ok(false)) => {
                Counters::bump(&self.counters.timeouts);
                tracing::info!(elapsed_ms, timeout_ms = timeout.as_millis() as u64, "lock busy");
                return Err(GuardError::AcquisitionTimeout {
                    key: key.clone(),
                    timeout,
                });
            }
            Err(_) => {
                // The ensemble never answered; dropping the handle retires any waiting node
                Counters::bump(&self.counters.acquire_faults);
                tracing::error!(elapsed_ms, "{UNRESPONSIVE}");
                return Err(GuardError::Coordination {
                    key: key.clone(),
                    source: CoordinationError::Other(UNRESPONSIVE.to_string()),
                });
            }
            Ok(Err(source)) => {
                Counters::bump(&self.counters.acquire_faults);
                tracing::error!(elapsed_ms, error = %source, "acquire failed");
                return Err(GuardError::Coordination {
                    key: key.clone(),
                    source,
                });
            }
        }

        let outcome = AssertUnwindSafe(async move { operation().await })
            .catch_unwind()
            .await;

        match mutex.release().await {
            Ok(()) => tracing::debug!("released"),
            Err(e) => {
                Counters::bump(&self.counters.release_failures);
                tracing::warn!(error = %e, "release failed; keeping operation outcome");
            }
        }
        drop(mutex);

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(GuardError::Operation(e)),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
