// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single entry point for running a call under a derived distributed lock
//!
//! Call sites (or an interception layer in front of them) hand over the
//! lock declaration, the argument bindings, the actual arguments and the
//! operation. The key is derived before anything talks to the ensemble, so
//! declaration and argument mistakes never cost a round trip.

use crate::args::Arg;
use crate::coordination::{LockCoordinator, LockStats, MutexFactory};
use crate::declaration::{ArgumentBinding, LockSpec};
use crate::error::GuardError;
use crate::id::{HolderId, IdGen, UuidIdGen};
use crate::key::build_key;
use std::future::Future;

/// Guards operations with locks derived from their arguments
#[derive(Clone)]
pub struct InvocationGuard<F, G = UuidIdGen> {
    coordinator: LockCoordinator<F>,
    ids: G,
}

impl<F: MutexFactory> InvocationGuard<F, UuidIdGen> {
    pub fn new(coordinator: LockCoordinator<F>) -> Self {
        Self {
            coordinator,
            ids: UuidIdGen,
        }
    }
}

impl<F: MutexFactory, G: IdGen> InvocationGuard<F, G> {
    pub fn with_id_gen<G2: IdGen>(self, ids: G2) -> InvocationGuard<F, G2> {
        InvocationGuard {
            coordinator: self.coordinator,
            ids,
        }
    }

    pub fn coordinator(&self) -> &LockCoordinator<F> {
        &self.coordinator
    }

    pub fn stats(&self) -> LockStats {
        self.coordinator.stats()
    }

    /// Run `operation` under the lock derived from `spec`, `bindings` and `args`
    ///
    /// Each call competes for the lock as a new holder.
    pub async fn guard<T, E, Op, Fut>(
        &self,
        spec: &LockSpec,
        bindings: &[ArgumentBinding],
        args: &[Arg<'_>],
        operation: Op,
    ) -> Result<T, GuardError<E>>
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let holder = self.ids.next();
        self.guard_as(&holder, spec, bindings, args, operation).await
    }

    /// Like [`guard`](Self::guard) but as an explicit holder
    ///
    /// Passing the holder of an enclosing guarded call re-enters its lock
    /// instead of queueing behind it.
    pub async fn guard_as<T, E, Op, Fut>(
        &self,
        holder: &HolderId,
        spec: &LockSpec,
        bindings: &[ArgumentBinding],
        args: &[Arg<'_>],
        operation: Op,
    ) -> Result<T, GuardError<E>>
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = build_key(spec, bindings, args).map_err(|e| {
            tracing::warn!(lock = %spec.name, error = %e, "cannot derive lock key");
            GuardError::from(e)
        })?;

        self.coordinator
            .with_lock(&key, spec.timeout_duration(), holder, operation)
            .await
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
