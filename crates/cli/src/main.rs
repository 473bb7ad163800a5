// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lockguard - run operations under argument-derived distributed locks

mod commands;
mod invocation;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{key, run};
use lockguard_core::GuardConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "lockguard",
    version,
    about = "lockguard runs operations under distributed locks derived from their arguments"
)]
struct Cli {
    /// Guard configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run concurrent invocations of an operation against an in-process ensemble
    Run(run::RunArgs),
    /// Print the lock key an invocation would use
    Key(key::KeyArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    setup_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => GuardConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GuardConfig::default(),
    };

    match cli.command {
        Commands::Key(args) => {
            key::key(&args, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run(args) => {
            let all_settled = run::run(args, &config).await?;
            Ok(if all_settled {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
