//! # tidyls_core
//!
//! Host-independent core of tidyls.
//!
//! This crate provides:
//! - Configuration loading and clang-tidy argument construction
//! - A single-flight process runner
//! - Report parsing, byte-to-character reconciliation and projection
//! - Staleness tracking for published diagnostics
//!
//! ## Example
//!
//! ```rust,ignore
//! use tidyls_core::{TidyConfig, TidyRunner, TextDocument, DocumentSet, collect_diagnostics};
//!
//! let config = TidyConfig::new();
//! let runner = TidyRunner::new();
//! let output = runner.run(&config, &[path.clone()], &root, false).await;
//!
//! let doc = TextDocument::new(&path, std::fs::read_to_string(&path)?);
//! let diagnostics = collect_diagnostics(&output.stdout, &doc, &DocumentSet::new(), &config.severity_overrides);
//! ```

pub mod config;
pub mod diagnostic;
pub mod document;
mod error;
mod pipeline;
pub mod project;
pub mod reconcile;
pub mod report;
pub mod runner;
pub mod staleness;

pub use config::{ProgressLocation, SETTINGS_SECTION, SeverityOverrides, TidyConfig};
pub use diagnostic::{Diagnostic, Position, RelatedFix, SOURCE, Severity, TextRange};
pub use document::{DocumentResolver, DocumentSet, TextDocument, normalize_path, same_file};
pub use error::TidyError;
pub use pipeline::{Analysis, collect_diagnostics};
pub use runner::{RunOutput, RunStatus, TidyRunner};
pub use staleness::DiagnosticStore;
