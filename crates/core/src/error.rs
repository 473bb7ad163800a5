// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outcome classification for guarded invocations

use crate::coordination::CoordinationError;
use crate::key::{KeyError, LockKey};
use std::time::Duration;
use thiserror::Error;

/// Everything a guarded invocation can fail with
///
/// `E` is the guarded operation's own error type, passed through untouched
/// in [`GuardError::Operation`].
#[derive(Debug, Error)]
pub enum GuardError<E> {
    /// The lock declaration itself is invalid (blank name)
    #[error("invalid lock declaration: {0}")]
    Configuration(KeyError),

    /// The call's arguments could not be turned into a key
    #[error("cannot derive lock key: {0}")]
    KeyDerivation(KeyError),

    /// Another holder kept the lock for the whole wait
    #[error("lock {key} is busy, please retry later (waited {timeout:?})")]
    AcquisitionTimeout { key: LockKey, timeout: Duration },

    /// The coordination ensemble failed while acquiring
    #[error("coordination fault on {key}: {source}")]
    Coordination {
        key: LockKey,
        #[source]
        source: CoordinationError,
    },

    /// The guarded operation ran and failed
    #[error("{0}")]
    Operation(E),
}

impl<E> GuardError<E> {
    /// True when the lock was simply held by someone else; safe to retry later
    pub fn is_busy(&self) -> bool {
        matches!(self, GuardError::AcquisitionTimeout { .. })
    }

    /// True for errors raised before the coordination ensemble was contacted
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            GuardError::Configuration(_) | GuardError::KeyDerivation(_)
        )
    }

    /// The operation's own error, if that is what this is
    pub fn into_operation(self) -> Option<E> {
        match self {
            GuardError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// The key involved, when one was derived
    pub fn key(&self) -> Option<&LockKey> {
        match self {
            GuardError::AcquisitionTimeout { key, .. } | GuardError::Coordination { key, .. } => {
                Some(key)
            }
            _ => None,
        }
    }
}

impl<E> From<KeyError> for GuardError<E> {
    fn from(err: KeyError) -> Self {
        if err.is_configuration() {
            GuardError::Configuration(err)
        } else {
            GuardError::KeyDerivation(err)
        }
    }
}
