//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// tidyls - clang-tidy for editors
#[derive(Parser)]
#[command(name = "tidyls")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the LSP server on stdio
    Lsp,

    /// Run clang-tidy once and print its diagnostics
    Check {
        /// Source files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Let clang-tidy apply its fixes
        #[arg(long)]
        fix: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Read raw clang-tidy output from a file instead of running it
        #[arg(long, value_name = "FILE")]
        from_output: Option<PathBuf>,

        /// Directory to run clang-tidy in (defaults to the current one)
        #[arg(long, value_name = "DIR")]
        cwd: Option<PathBuf>,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
