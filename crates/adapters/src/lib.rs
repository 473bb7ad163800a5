// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Coordination ensemble adapters

pub mod memory;
pub mod traced;

pub use memory::{EnsembleSession, InMemoryEnsemble, InMemoryMutex, SessionId};
pub use traced::{TracedMutex, TracedMutexFactory};
