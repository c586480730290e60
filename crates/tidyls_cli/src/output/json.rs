//! JSON output formatter

use miette::{IntoDiagnostic, Result};

use crate::commands::FileReport;

pub fn output_json(reports: &[FileReport]) -> Result<()> {
    let output: Vec<_> = reports
        .iter()
        .map(|r| {
            serde_json::json!({
                "path": r.path.display().to_string(),
                "diagnostics": r.diagnostics,
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&output).into_diagnostic()?
    );
    Ok(())
}
