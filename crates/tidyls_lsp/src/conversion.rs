//! LSP type conversion utilities.

use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity, Location, NumberOrString,
    Position, Range, Url,
};

use tidyls_core::{
    Diagnostic as TidyDiagnostic, Position as TidyPosition, Severity as TidySeverity, TextRange,
};

/// Converts a core position to an LSP position.
pub fn to_lsp_position(position: TidyPosition) -> Position {
    Position::new(position.line, position.character)
}

/// Converts a core range to an LSP range.
pub fn to_lsp_range(range: TextRange) -> Range {
    Range::new(to_lsp_position(range.start), to_lsp_position(range.end))
}

/// Converts an LSP range to a core range.
pub fn to_core_range(range: Range) -> TextRange {
    TextRange::new(
        TidyPosition::new(range.start.line, range.start.character),
        TidyPosition::new(range.end.line, range.end.character),
    )
}

pub fn to_lsp_severity(severity: TidySeverity) -> DiagnosticSeverity {
    match severity {
        TidySeverity::Error => DiagnosticSeverity::ERROR,
        TidySeverity::Warning => DiagnosticSeverity::WARNING,
        TidySeverity::Info => DiagnosticSeverity::INFORMATION,
        TidySeverity::Hint => DiagnosticSeverity::HINT,
    }
}

/// Converts a tidyls diagnostic to an LSP diagnostic.
///
/// The fix travels as the single related-information entry: its location is
/// the range to replace and its message the replacement text.
pub fn to_lsp_diagnostic(diag: &TidyDiagnostic) -> Diagnostic {
    let related_information = diag.fix.as_ref().and_then(|fix| {
        let uri = Url::from_file_path(&fix.path).ok()?;
        Some(vec![DiagnosticRelatedInformation {
            location: Location::new(uri, to_lsp_range(fix.range)),
            message: fix.text.clone(),
        }])
    });

    Diagnostic {
        range: to_lsp_range(diag.range),
        severity: Some(to_lsp_severity(diag.severity)),
        code: Some(NumberOrString::String(diag.code.clone())),
        source: Some(diag.source.clone()),
        message: diag.message.clone(),
        related_information,
        ..Default::default()
    }
}
