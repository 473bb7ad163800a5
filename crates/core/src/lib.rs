// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lockguard-core: declarative cross-process mutual exclusion
//!
//! This crate provides:
//! - Lock declarations and argument bindings made once per call site
//! - Pure derivation of a lock key from a call's actual arguments
//! - The acquire / run / release protocol against an injected distributed mutex
//! - A single guard entry point that classifies every outcome

pub mod args;
pub mod config;
pub mod coordination;
pub mod declaration;
pub mod error;
pub mod guard;
pub mod id;
pub mod key;

pub use args::{Arg, KeyFields};
pub use config::{ConfigError, EnsembleConfig, GuardConfig, LockDefaults, OperationConfig};
pub use coordination::{
    CoordinationError, DistributedMutex, LockCoordinator, LockStats, MutexFactory,
};
pub use declaration::{ArgumentBinding, LockSpec, TimeUnit};
pub use error::GuardError;
pub use guard::InvocationGuard;
pub use id::{HolderId, IdGen, SequentialIdGen, UuidIdGen};
pub use key::{build_key, KeyError, LockKey, KEY_PREFIX, KEY_SEPARATOR};

#[cfg(any(test, feature = "test-support"))]
pub use coordination::{FakeMutex, FakeMutexFactory, MutexCall};
