// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lockguard key <operation> [--arg ...]` - Print the derived lock key

use crate::invocation::{parse_arg, resolve, ArgValue};
use anyhow::Result;
use clap::Args;
use lockguard_core::{build_key, Arg, GuardConfig};

#[derive(Args)]
pub struct KeyArgs {
    /// Operation whose lock declaration to use
    pub operation: String,

    /// Call argument: VALUE, name=value[,name=value...], or "" for null
    #[arg(long = "arg", value_parser = parse_arg)]
    pub args: Vec<ArgValue>,
}

pub fn key(args: &KeyArgs, config: &GuardConfig) -> Result<()> {
    let (spec, bindings) = resolve(config, &args.operation, args.args.len());
    let argv: Vec<Arg<'_>> = args.args.iter().map(ArgValue::as_arg).collect();

    let key = build_key(&spec, &bindings, &argv)?;
    println!("{key}");
    Ok(())
}
