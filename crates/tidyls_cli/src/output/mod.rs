//! Output formatting module

mod json;
mod text;

use miette::Result;

use crate::cli::OutputFormat;
use crate::commands::FileReport;

/// Prints `reports`; returns true if any of them holds an error.
pub fn output_results(reports: &[FileReport], format: OutputFormat) -> Result<bool> {
    let has_errors = reports.iter().any(FileReport::has_errors);

    match format {
        OutputFormat::Json => json::output_json(reports)?,
        OutputFormat::Text => text::output_text(reports),
    }

    Ok(has_errors)
}
