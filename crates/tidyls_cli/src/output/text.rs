//! Text output formatter

use tidyls_core::Diagnostic;

use crate::commands::FileReport;

pub fn output_text(reports: &[FileReport]) {
    for report in reports {
        for diag in &report.diagnostics {
            println!("{}", format_line(&report.path.display().to_string(), diag));
        }
    }

    let total_files = reports.len();
    let total_issues: usize = reports.iter().map(|r| r.diagnostics.len()).sum();

    println!();
    println!("Checked {} files, found {} issues", total_files, total_issues);
}

/// `path:line:col: severity: message [code]`, one-based.
fn format_line(path: &str, diag: &Diagnostic) -> String {
    let mut line = format!(
        "{}:{}:{}: {}: {} [{}]",
        path,
        diag.range.start.line + 1,
        diag.range.start.character + 1,
        diag.severity,
        diag.message,
        diag.code
    );
    if let Some(fix) = &diag.fix {
        line.push_str(&format!(" (fix: {})", fix.text));
    }
    line
}
