// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static lock declarations made once per call site
//!
//! A [`LockSpec`] names the lock and bounds how long a caller waits for it.
//! An ordered list of [`ArgumentBinding`]s says which call arguments (and
//! which of their fields) make up the dynamic part of the lock key.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default acquisition timeout, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Unit a [`LockSpec`] timeout is expressed in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    #[serde(alias = "millis")]
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert `amount` of this unit to a [`Duration`], saturating on overflow
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(60 * 60)),
            TimeUnit::Days => Duration::from_secs(amount.saturating_mul(24 * 60 * 60)),
        }
    }
}

/// Lock declaration for one guarded call site
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSpec {
    /// Static part of the lock key; must not be blank
    pub name: String,
    /// How long a caller waits for the lock, in `unit`s
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub unit: TimeUnit,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl LockSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout: DEFAULT_TIMEOUT_SECS,
            unit: TimeUnit::Seconds,
        }
    }

    pub fn with_timeout(mut self, timeout: u64, unit: TimeUnit) -> Self {
        self.timeout = timeout;
        self.unit = unit;
        self
    }

    /// Express the timeout as `duration` in the coarsest unit that keeps it exact
    pub fn with_duration(self, duration: Duration) -> Self {
        let (amount, unit) = if duration.subsec_nanos() % 1_000_000 == 0 {
            (duration.as_millis(), TimeUnit::Milliseconds)
        } else if duration.subsec_nanos() % 1_000 == 0 {
            (duration.as_micros(), TimeUnit::Microseconds)
        } else {
            (duration.as_nanos(), TimeUnit::Nanoseconds)
        };
        self.with_timeout(u64::try_from(amount).unwrap_or(u64::MAX), unit)
    }

    pub fn timeout_duration(&self) -> Duration {
        self.unit.to_duration(self.timeout)
    }

    pub fn is_name_blank(&self) -> bool {
        self.name.trim().is_empty()
    }
}

/// Which call argument contributes to the lock key, and how
///
/// With no `fields` the argument's natural string form is one key segment.
/// Otherwise each named field is read off the argument, in declared order,
/// and each contributes its own segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentBinding {
    pub index: usize,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ArgumentBinding {
    pub fn raw(index: usize) -> Self {
        Self {
            index,
            fields: Vec::new(),
        }
    }

    pub fn fields<I, S>(index: usize, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_raw(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
#[path = "declaration_tests.rs"]
mod tests;
