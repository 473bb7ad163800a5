// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted mutex factory for testing the lock protocol

use super::mutex::{CoordinationError, DistributedMutex, MutexFactory};
use crate::id::HolderId;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded call against the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutexCall {
    Create { path: String, holder: HolderId },
    TryAcquire { path: String, timeout: Duration },
    Release { path: String },
}

#[derive(Default)]
struct FakeState {
    calls: Vec<MutexCall>,
    held: HashMap<String, u32>,
    // Configurable failure modes
    create_error: Option<CoordinationError>,
    acquire_results: VecDeque<Result<bool, CoordinationError>>,
    acquire_delay: Option<Duration>,
    release_error: Option<CoordinationError>,
}

/// Mutex factory whose acquisition results are scripted by the test
///
/// Acquisitions succeed unless a result was queued with
/// [`push_acquire_result`](Self::push_acquire_result). There is no real
/// contention between handles.
#[derive(Clone, Default)]
pub struct FakeMutexFactory {
    state: Arc<Mutex<FakeState>>,
}

impl FakeMutexFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> Vec<MutexCall> {
        self.lock().calls.clone()
    }

    /// Number of outstanding acquisitions on `path`
    pub fn hold_count(&self, path: &str) -> u32 {
        self.lock().held.get(path).copied().unwrap_or(0)
    }

    pub fn set_create_error(&self, err: CoordinationError) {
        self.lock().create_error = Some(err);
    }

    pub fn push_acquire_result(&self, result: Result<bool, CoordinationError>) {
        self.lock().acquire_results.push_back(result);
    }

    /// Make every acquisition sleep first, simulating an unresponsive ensemble
    pub fn set_acquire_delay(&self, delay: Duration) {
        self.lock().acquire_delay = Some(delay);
    }

    pub fn set_release_error(&self, err: CoordinationError) {
        self.lock().release_error = Some(err);
    }
}

impl MutexFactory for FakeMutexFactory {
    type Mutex = FakeMutex;

    fn create(&self, path: &str, holder: &HolderId) -> Result<FakeMutex, CoordinationError> {
        let mut state = self.lock();
        state.calls.push(MutexCall::Create {
            path: path.to_string(),
            holder: holder.clone(),
        });
        if let Some(err) = state.create_error.take() {
            return Err(err);
        }
        Ok(FakeMutex {
            factory: self.clone(),
            path: path.to_string(),
        })
    }
}

/// Handle produced by [`FakeMutexFactory`]
pub struct FakeMutex {
    factory: FakeMutexFactory,
    path: String,
}

#[async_trait]
impl DistributedMutex for FakeMutex {
    async fn try_acquire(&mut self, timeout: Duration) -> Result<bool, CoordinationError> {
        let delay = {
            let mut state = self.factory.lock();
            state.calls.push(MutexCall::TryAcquire {
                path: self.path.clone(),
                timeout,
            });
            state.acquire_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.factory.lock();
        let result = state.acquire_results.pop_front().unwrap_or(Ok(true));
        if let Ok(true) = result {
            *state.held.entry(self.path.clone()).or_insert(0) += 1;
        }
        result
    }

    async fn release(&mut self) -> Result<(), CoordinationError> {
        let mut state = self.factory.lock();
        state.calls.push(MutexCall::Release {
            path: self.path.clone(),
        });
        if let Some(err) = state.release_error.take() {
            return Err(err);
        }
        match state.held.get_mut(&self.path) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Ok(())
            }
            _ => Err(CoordinationError::NotHeld(self.path.clone())),
        }
    }
}
