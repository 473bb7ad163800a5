// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line arguments of a guarded invocation

use lockguard_core::{Arg, ArgumentBinding, GuardConfig, LockSpec};
use std::collections::BTreeMap;

/// One `--arg` value
///
/// `""` is a null argument, `k=v,k=v` a record, anything else a scalar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgValue {
    Null,
    Value(String),
    Record(BTreeMap<String, String>),
}

impl ArgValue {
    pub fn as_arg(&self) -> Arg<'_> {
        match self {
            ArgValue::Null => Arg::Null,
            ArgValue::Value(v) => Arg::value(v),
            ArgValue::Record(fields) => Arg::record(fields),
        }
    }
}

pub fn parse_arg(s: &str) -> Result<ArgValue, String> {
    if s.is_empty() {
        return Ok(ArgValue::Null);
    }
    if !s.contains('=') {
        return Ok(ArgValue::Value(s.to_string()));
    }

    let mut fields = BTreeMap::new();
    for pair in s.split(',') {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid field `{pair}` in `{s}`: expected name=value"))?;
        if name.is_empty() {
            return Err(format!("empty field name in `{s}`"));
        }
        fields.insert(name.to_string(), value.to_string());
    }
    Ok(ArgValue::Record(fields))
}

/// Declaration for `operation`: the configured one, or one raw binding per argument
pub fn resolve(
    config: &GuardConfig,
    operation: &str,
    arg_count: usize,
) -> (LockSpec, Vec<ArgumentBinding>) {
    config
        .operation(operation)
        .unwrap_or_else(|| config.implicit_operation(operation, arg_count))
}

#[cfg(test)]
#[path = "invocation_tests.rs"]
mod tests;
