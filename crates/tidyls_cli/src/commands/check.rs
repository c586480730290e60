//! Check command implementation

use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use tracing::{debug, info, warn};

use tidyls_core::{
    Analysis, Diagnostic, DocumentSet, RunStatus, Severity, TextDocument, TidyConfig, TidyRunner,
};

use crate::cli::{Cli, OutputFormat};
use crate::output::output_results;
use crate::utils::create_tokio_runtime;

/// Diagnostics projected onto one checked file.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

pub fn run_check(
    cli: &Cli,
    files: &[PathBuf],
    fix: bool,
    format: OutputFormat,
    from_output: Option<&Path>,
    cwd: Option<&Path>,
) -> Result<bool> {
    let cwd = match cwd {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().into_diagnostic()?,
    };

    let config = match &cli.config {
        Some(path) => TidyConfig::from_file(path).into_diagnostic()?,
        None => find_config(&cwd)?,
    };

    // clang-tidy reports absolute paths.
    let files: Vec<PathBuf> = files
        .iter()
        .map(|f| if f.is_absolute() { f.clone() } else { cwd.join(f) })
        .collect();

    // Offsets in the report refer to the files as they were before any fix.
    let documents = read_documents(&files)?;

    let raw = match from_output {
        Some(path) => {
            info!("Replaying output from {}", path.display());
            std::fs::read_to_string(path).into_diagnostic()?
        }
        None => run_tidy(&config, &files, &cwd, fix)?,
    };

    let analysis = Analysis::from_output(&raw, &documents, &config.severity_overrides);
    debug!(
        "Report for {}: {} finding(s)",
        analysis.main_source_file().display(),
        analysis.findings().len()
    );

    let reports: Vec<FileReport> = files
        .iter()
        .filter_map(|file| documents.get(file))
        .map(|doc| FileReport {
            path: doc.path().to_path_buf(),
            diagnostics: analysis.diagnostics_for(doc, &documents),
        })
        .collect();

    output_results(&reports, format)
}

fn read_documents(files: &[PathBuf]) -> Result<DocumentSet> {
    let mut documents = DocumentSet::new();
    for file in files {
        let text = std::fs::read_to_string(file)
            .map_err(|e| miette::miette!("Failed to read {}: {}", file.display(), e))?;
        documents.insert(TextDocument::new(file, text));
    }
    Ok(documents)
}

fn run_tidy(config: &TidyConfig, files: &[PathBuf], cwd: &Path, fix: bool) -> Result<String> {
    let runner = TidyRunner::new();
    let output = create_tokio_runtime()?.block_on(runner.run(config, files, cwd, fix));

    match &output.status {
        RunStatus::SpawnFailed(reason) => {
            return Err(miette::miette!(
                "Failed to run {}: {}",
                config.executable,
                reason
            ));
        }
        RunStatus::Exited(Some(code)) if *code != 0 => {
            debug!("{} exited with status {}", config.executable, code);
        }
        _ => {}
    }

    if output.truncated {
        warn!("Output was truncated; some diagnostics may be missing");
    }
    if !output.stderr.is_empty() {
        debug!("{}", output.stderr.trim_end());
    }

    Ok(output.stdout)
}

pub fn find_config(dir: &Path) -> Result<TidyConfig> {
    if let Some(path) = TidyConfig::discover(dir) {
        info!("Using config: {}", path.display());
        return TidyConfig::from_file(&path).into_diagnostic();
    }

    info!("No config file found, using defaults");
    Ok(TidyConfig::new())
}
