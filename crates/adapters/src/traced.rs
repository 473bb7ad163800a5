// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced mutex wrappers for consistent observability

use async_trait::async_trait;
use lockguard_core::{CoordinationError, DistributedMutex, HolderId, MutexFactory};
use std::time::Duration;
use tracing::Instrument;

/// Wrapper that adds tracing to any MutexFactory
#[derive(Clone)]
pub struct TracedMutexFactory<F> {
    inner: F,
}

impl<F> TracedMutexFactory<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: MutexFactory> MutexFactory for TracedMutexFactory<F> {
    type Mutex = TracedMutex<F::Mutex>;

    fn create(&self, path: &str, holder: &HolderId) -> Result<Self::Mutex, CoordinationError> {
        match self.inner.create(path, holder) {
            Ok(inner) => {
                tracing::trace!(path, %holder, "handle created");
                Ok(TracedMutex {
                    inner,
                    path: path.to_string(),
                    holder: holder.clone(),
                })
            }
            Err(e) => {
                tracing::error!(path, %holder, error = %e, "handle creation failed");
                Err(e)
            }
        }
    }
}

/// Mutex handle produced by [`TracedMutexFactory`]
pub struct TracedMutex<M> {
    inner: M,
    path: String,
    holder: HolderId,
}

#[async_trait]
impl<M: DistributedMutex> DistributedMutex for TracedMutex<M> {
    async fn try_acquire(&mut self, timeout: Duration) -> Result<bool, CoordinationError> {
        let span = tracing::info_span!("lock.acquire", path = %self.path, holder = %self.holder);
        async {
            tracing::debug!(timeout_ms = timeout.as_millis() as u64, "waiting");

            let start = std::time::Instant::now();
            let result = self.inner.try_acquire(timeout).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(true) => tracing::info!(elapsed_ms, "acquired"),
                Ok(false) => tracing::info!(elapsed_ms, "wait elapsed"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "acquire failed"),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn release(&mut self) -> Result<(), CoordinationError> {
        let span = tracing::info_span!("lock.release", path = %self.path, holder = %self.holder);
        async {
            let result = self.inner.release().await;
            // The node may already be gone with its session
            match &result {
                Ok(()) => tracing::info!("released"),
                Err(e) => tracing::warn!(error = %e, "release failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
