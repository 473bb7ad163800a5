// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guard configuration loaded from TOML
//!
//! ```toml
//! [lock]
//! default_timeout = "3s"
//! acquire_grace = "250ms"
//!
//! [ensemble]
//! namespace = "lock4zookeeper"
//!
//! [operations.count]
//! name = "count"
//! timeout = 2
//! unit = "seconds"
//! bindings = [{ index = 0, fields = ["id", "userName"] }]
//! ```

use crate::coordination::DEFAULT_ACQUIRE_GRACE;
use crate::declaration::{ArgumentBinding, LockSpec, TimeUnit, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("operation `{0}` declares a blank lock name")]
    BlankLockName(String),
}

/// Process-wide lock defaults
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockDefaults {
    /// Timeout for declarations that do not set one
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
    /// Extra time allowed past a lock's timeout before the wait is abandoned
    #[serde(with = "humantime_serde")]
    pub acquire_grace: Duration,
}

impl Default for LockDefaults {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            acquire_grace: DEFAULT_ACQUIRE_GRACE,
        }
    }
}

/// Coordination ensemble settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Prefix applied to every lock path inside the ensemble
    pub namespace: Option<String>,
}

/// A lock declared for a named operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationConfig {
    pub name: String,
    pub timeout: Option<u64>,
    #[serde(default)]
    pub unit: TimeUnit,
    #[serde(default)]
    pub bindings: Vec<ArgumentBinding>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub lock: LockDefaults,
    pub ensemble: EnsembleConfig,
    pub operations: BTreeMap<String, OperationConfig>,
}

impl GuardConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate. Blank lock names are rejected here, before any call uses them.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: GuardConfig = toml::from_str(content)?;
        if let Some((op, _)) = config
            .operations
            .iter()
            .find(|(_, decl)| decl.name.trim().is_empty())
        {
            return Err(ConfigError::BlankLockName(op.clone()));
        }
        Ok(config)
    }

    /// Lock declaration for `operation`, with defaults filled in
    pub fn operation(&self, operation: &str) -> Option<(LockSpec, Vec<ArgumentBinding>)> {
        let decl = self.operations.get(operation)?;
        let spec = match decl.timeout {
            Some(timeout) => LockSpec::new(decl.name.clone()).with_timeout(timeout, decl.unit),
            None => LockSpec::new(decl.name.clone()).with_duration(self.lock.default_timeout),
        };
        Some((spec, decl.bindings.clone()))
    }

    /// Declaration for an operation that is not configured: named after the
    /// operation, one raw binding per argument
    pub fn implicit_operation(&self, operation: &str, arg_count: usize) -> (LockSpec, Vec<ArgumentBinding>) {
        let spec = LockSpec::new(operation).with_duration(self.lock.default_timeout);
        let bindings = (0..arg_count).map(ArgumentBinding::raw).collect();
        (spec, bindings)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
