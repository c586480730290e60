//! Turns reconciled findings into editor diagnostics.

use crate::diagnostic::{Diagnostic, RelatedFix, Severity, TextRange};
use crate::document::{DocumentResolver, TextDocument, same_file};
use crate::reconcile::{AnchoredDiagnostic, AnchoredReplacement};

/// Projects one finding onto `document`.
///
/// Findings reported for another file yield nothing. A finding without
/// applicable fixes yields a single diagnostic anchored on its line. When the
/// first fix is a pure insertion, the fixes of that file are merged into one
/// diagnostic whose replacement keeps the untouched text between fragments;
/// otherwise every fix yields its own diagnostic.
pub fn project<R>(
    finding: &AnchoredDiagnostic,
    document: &TextDocument,
    documents: &R,
) -> Vec<Diagnostic>
where
    R: DocumentResolver + ?Sized,
{
    if !same_file(&finding.file_path, document.path()) {
        return Vec::new();
    }

    let fixes: Vec<&AnchoredReplacement> = finding
        .replacements
        .iter()
        .filter(|rep| {
            same_file(&rep.file_path, &finding.file_path)
                || documents.resolve(&rep.file_path).is_some()
        })
        .collect();

    let Some(first) = fixes.first() else {
        return vec![bare(finding, document)];
    };

    let mut out = Vec::with_capacity(fixes.len());
    if first.length == 0 {
        let (group, rest): (Vec<_>, Vec<_>) = fixes
            .iter()
            .copied()
            .partition(|rep| same_file(&rep.file_path, &first.file_path));

        match merged(finding, &group, document, documents) {
            Some(diag) => out.push(diag),
            None => out.push(bare(finding, document)),
        }
        out.extend(
            rest.into_iter()
                .filter_map(|rep| fragment(finding, rep, document, documents)),
        );
    } else {
        out.extend(
            fixes
                .into_iter()
                .filter_map(|rep| fragment(finding, rep, document, documents)),
        );
    }

    if out.is_empty() {
        out.push(bare(finding, document));
    }
    out
}

/// The range shown for a finding whose fix is not in `document`.
///
/// Hints start at the reported column; everything else covers the whole line.
pub fn line_anchor(document: &TextDocument, char_offset: usize, severity: Severity) -> TextRange {
    let position = document.position_at(char_offset);
    let line = document.line_range(position.line);
    if severity == Severity::Hint {
        TextRange::new(position, line.end)
    } else {
        line
    }
}

fn bare(finding: &AnchoredDiagnostic, document: &TextDocument) -> Diagnostic {
    Diagnostic::new(
        &finding.name,
        &finding.message,
        finding.severity,
        line_anchor(document, finding.offset, finding.severity),
    )
}

fn target<'a, R>(
    rep: &AnchoredReplacement,
    document: &'a TextDocument,
    documents: &'a R,
) -> Option<&'a TextDocument>
where
    R: DocumentResolver + ?Sized,
{
    if same_file(&rep.file_path, document.path()) {
        Some(document)
    } else {
        documents.resolve(&rep.file_path)
    }
}

fn anchored(
    finding: &AnchoredDiagnostic,
    document: &TextDocument,
    target: &TextDocument,
    fix_range: TextRange,
    text: String,
) -> Diagnostic {
    let range = if same_file(target.path(), document.path()) {
        fix_range
    } else {
        line_anchor(document, finding.offset, finding.severity)
    };

    Diagnostic::new(&finding.name, &finding.message, finding.severity, range).with_fix(
        RelatedFix {
            path: target.path().to_path_buf(),
            range: fix_range,
            text,
        },
    )
}

fn fragment<R>(
    finding: &AnchoredDiagnostic,
    rep: &AnchoredReplacement,
    document: &TextDocument,
    documents: &R,
) -> Option<Diagnostic>
where
    R: DocumentResolver + ?Sized,
{
    let target = target(rep, document, documents)?;
    let fix_range = TextRange::new(target.position_at(rep.offset), target.position_at(rep.end()));
    Some(anchored(finding, document, target, fix_range, rep.text.clone()))
}

fn merged<R>(
    finding: &AnchoredDiagnostic,
    group: &[&AnchoredReplacement],
    document: &TextDocument,
    documents: &R,
) -> Option<Diagnostic>
where
    R: DocumentResolver + ?Sized,
{
    let first = group.first()?;
    let last = group.last()?;
    let target = target(first, document, documents)?;

    let mut text = first.text.clone();
    for pair in group.windows(2) {
        text.push_str(target.text_between(pair[0].end(), pair[1].offset));
        text.push_str(&pair[1].text);
    }

    let fix_range = TextRange::new(
        target.position_at(first.offset),
        target.position_at(last.end()),
    );
    Some(anchored(finding, document, target, fix_range, text))
}
