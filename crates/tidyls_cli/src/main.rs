//! tidyls CLI
//!
//! clang-tidy for editors: an LSP server plus a one-shot checker.

mod cli;
mod commands;
mod output;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::{run_check, run_init, run_lsp};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    match &cli.command {
        Commands::Lsp => run_lsp().map(|_| false),
        Commands::Check {
            files,
            fix,
            format,
            from_output,
            cwd,
        } => run_check(
            &cli,
            files,
            *fix,
            *format,
            from_output.as_deref(),
            cwd.as_deref(),
        ),
        Commands::Init { force } => run_init(*force).map(|_| false),
    }
}
