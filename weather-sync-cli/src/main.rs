//! Binary crate for the `weather-sync` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments and layering them over file/env configuration
//! - Interactive configuration
//! - Per-city console output and the process exit code

use clap::Parser;
use std::process::ExitCode;

mod cli;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cmd = cli::Cli::parse();
    logging::init(&cmd.log_level);
    cmd.run().await
}
