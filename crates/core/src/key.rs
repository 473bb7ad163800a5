// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock key derivation
//!
//! A key is `/DISTRIBUTED_LOCK_<name>` followed by one `/<segment>` per
//! bound argument (or bound field), in binding declaration order. Two calls
//! get the same key iff they guard the same unit of work, so the builder is
//! pure and values are used exactly as their string form renders them.

use crate::args::Arg;
use crate::declaration::{ArgumentBinding, LockSpec};
use thiserror::Error;

/// Fixed prefix in front of every lock name
pub const KEY_PREFIX: &str = "DISTRIBUTED_LOCK_";

/// Separator between the path components of a key
pub const KEY_SEPARATOR: &str = "/";

/// Canonical identity of a protected unit of work
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LockKey(String);

impl LockKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LockKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors from deriving a lock key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("lock name must not be blank")]
    EmptyLockName,
    #[error("dynamic lock argument {index} must not be null")]
    NullDynamicArgument { index: usize },
    #[error("argument {index} has no readable field `{field}`")]
    FieldAccess { index: usize, field: String },
    #[error("binding refers to argument {index} but the call has {len} argument(s)")]
    ArgumentIndexOutOfRange { index: usize, len: usize },
}

impl KeyError {
    /// True for mistakes in the static declaration rather than the call's values
    pub fn is_configuration(&self) -> bool {
        matches!(self, KeyError::EmptyLockName)
    }
}

/// Derive the lock key for one invocation
pub fn build_key(
    spec: &LockSpec,
    bindings: &[ArgumentBinding],
    args: &[Arg<'_>],
) -> Result<LockKey, KeyError> {
    if spec.is_name_blank() {
        return Err(KeyError::EmptyLockName);
    }

    let mut key = String::with_capacity(KEY_SEPARATOR.len() + KEY_PREFIX.len() + spec.name.len());
    key.push_str(KEY_SEPARATOR);
    key.push_str(KEY_PREFIX);
    key.push_str(&spec.name);

    for binding in bindings {
        for segment in binding_segments(binding, args)? {
            key.push_str(KEY_SEPARATOR);
            key.push_str(&segment);
        }
    }

    Ok(LockKey(key))
}

fn binding_segments(binding: &ArgumentBinding, args: &[Arg<'_>]) -> Result<Vec<String>, KeyError> {
    let index = binding.index;
    let arg = args.get(index).ok_or(KeyError::ArgumentIndexOutOfRange {
        index,
        len: args.len(),
    })?;

    match (arg, binding.is_raw()) {
        (Arg::Null, _) => Err(KeyError::NullDynamicArgument { index }),
        (Arg::Value(value), true) => Ok(vec![value.to_string()]),
        (Arg::Value(_), false) => Err(KeyError::FieldAccess {
            index,
            field: binding.fields.first().cloned().unwrap_or_default(),
        }),
        (Arg::Record(_), true) => {
            tracing::debug!(index, "record argument bound without fields contributes no segment");
            Ok(Vec::new())
        }
        (Arg::Record(record), false) => record
            .segments(&binding.fields)
            .map_err(|field| KeyError::FieldAccess { index, field }),
    }
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;
