// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed mutex capability consumed from a coordination ensemble
//!
//! The recipe behind it is the usual one: each contender creates an
//! ephemeral sequential child under the lock path, the lowest live child
//! holds the lock, and every other child watches only its immediate
//! predecessor.

use crate::id::HolderId;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Faults reported by the coordination ensemble
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinationError {
    #[error("connection to ensemble lost: {0}")]
    ConnectionLoss(String),
    #[error("session expired: {0}")]
    SessionExpired(String),
    #[error("node does not exist: {0}")]
    NoNode(String),
    #[error("mutex not held: {0}")]
    NotHeld(String),
    #[error("ensemble error: {0}")]
    Other(String),
}

/// One contender's handle on a distributed mutex
///
/// Handles are created per invocation and never shared. Dropping a handle
/// must retire whatever node it still owns.
#[async_trait]
pub trait DistributedMutex: Send {
    /// Wait up to `timeout` for the mutex. `Ok(false)` means the wait elapsed.
    ///
    /// Re-acquiring a mutex already held by the same holder succeeds at once.
    async fn try_acquire(&mut self, timeout: Duration) -> Result<bool, CoordinationError>;

    /// Release one level of ownership
    async fn release(&mut self) -> Result<(), CoordinationError>;
}

/// Creates mutex handles scoped to a lock path and holder
pub trait MutexFactory: Clone + Send + Sync + 'static {
    type Mutex: DistributedMutex;

    fn create(&self, path: &str, holder: &HolderId) -> Result<Self::Mutex, CoordinationError>;
}
