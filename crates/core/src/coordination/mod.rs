// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination with an external ensemble
//!
//! This module provides:
//! - **DistributedMutex / MutexFactory** - the capability consumed from the ensemble
//! - **LockCoordinator** - acquire, run, and always release around one operation

pub mod coordinator;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod mutex;

pub use coordinator::{LockCoordinator, LockStats, DEFAULT_ACQUIRE_GRACE};
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMutex, FakeMutexFactory, MutexCall};
pub use mutex::{CoordinationError, DistributedMutex, MutexFactory};
