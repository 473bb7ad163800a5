// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lockguard run <operation> [--arg ...]` - Race guarded invocations
//!
//! Every invocation gets its own client session on a shared in-process
//! ensemble and holds the lock for `--hold` once admitted.

use crate::invocation::{parse_arg, resolve, ArgValue};
use anyhow::Result;
use clap::Args;
use lockguard_adapters::{EnsembleSession, InMemoryEnsemble, TracedMutexFactory};
use lockguard_core::{
    build_key, Arg, ArgumentBinding, GuardConfig, GuardError, InvocationGuard, LockCoordinator,
    LockSpec,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args)]
pub struct RunArgs {
    /// Operation whose lock declaration to use
    pub operation: String,

    /// Call argument: VALUE, name=value[,name=value...], or "" for null
    #[arg(long = "arg", value_parser = parse_arg)]
    pub args: Vec<ArgValue>,

    /// Number of invocations to start
    #[arg(short = 'n', long, default_value_t = 1)]
    pub concurrency: usize,

    /// How long each invocation holds the lock (e.g. "500ms")
    #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
    pub hold: Duration,

    /// Delay between starting consecutive invocations
    #[arg(long, default_value = "0s", value_parser = humantime::parse_duration)]
    pub stagger: Duration,
}

/// How one invocation ended
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Busy,
    Error(String),
}

impl Outcome {
    fn from_result(result: Result<(), GuardError<Infallible>>) -> Self {
        match result {
            Ok(()) => Outcome::Ok,
            Err(e) if e.is_busy() => Outcome::Busy,
            Err(e) => Outcome::Error(e.to_string()),
        }
    }

    /// Completed or turned away as busy
    pub fn is_settled(&self) -> bool {
        !matches!(self, Outcome::Error(_))
    }

    /// Report line; `key` is `None` when the arguments derive no key
    pub fn line(&self, index: usize, key: Option<&str>) -> String {
        let status = match self {
            Outcome::Ok => "ok",
            Outcome::Busy => "busy",
            Outcome::Error(msg) => return format!("#{index} error: {msg}"),
        };
        match key {
            Some(key) => format!("#{index} {status} key={key}"),
            None => format!("#{index} {status}"),
        }
    }
}

/// Run the invocations and print one line each. Returns whether all settled.
pub async fn run(args: RunArgs, config: &GuardConfig) -> Result<bool> {
    let (spec, bindings) = resolve(config, &args.operation, args.args.len());
    // A derivation error is reported by each invocation, not here
    let key = {
        let argv: Vec<Arg<'_>> = args.args.iter().map(ArgValue::as_arg).collect();
        build_key(&spec, &bindings, &argv).ok().map(|k| k.into_string())
    };

    let ensemble = match &config.ensemble.namespace {
        Some(ns) => InMemoryEnsemble::with_namespace(ns),
        None => InMemoryEnsemble::new(),
    };
    let spec = Arc::new(spec);
    let bindings: Arc<[ArgumentBinding]> = bindings.into();
    let values: Arc<[ArgValue]> = args.args.into();

    let mut tasks = Vec::with_capacity(args.concurrency);
    for index in 0..args.concurrency {
        if index > 0 && !args.stagger.is_zero() {
            tokio::time::sleep(args.stagger).await;
        }

        let factory = TracedMutexFactory::new(ensemble.connect());
        let guard = InvocationGuard::new(
            LockCoordinator::new(factory).with_grace(config.lock.acquire_grace),
        );
        tasks.push(tokio::spawn(invoke(
            guard,
            Arc::clone(&spec),
            Arc::clone(&bindings),
            Arc::clone(&values),
            args.hold,
        )));
    }

    let mut all_settled = true;
    for (index, task) in tasks.into_iter().enumerate() {
        let outcome = task.await?;
        all_settled &= outcome.is_settled();
        println!("{}", outcome.line(index, key.as_deref()));
    }
    Ok(all_settled)
}

async fn invoke(
    guard: InvocationGuard<TracedMutexFactory<EnsembleSession>>,
    spec: Arc<LockSpec>,
    bindings: Arc<[ArgumentBinding]>,
    values: Arc<[ArgValue]>,
    hold: Duration,
) -> Outcome {
    let argv: Vec<Arg<'_>> = values.iter().map(ArgValue::as_arg).collect();
    let result = guard
        .guard(&spec, &bindings, &argv, || async move {
            tokio::time::sleep(hold).await;
            Ok::<(), Infallible>(())
        })
        .await;
    Outcome::from_result(result)
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
