//! Raw clang-tidy output to per-document diagnostics.

use std::path::{Path, PathBuf};

use crate::config::SeverityOverrides;
use crate::diagnostic::Diagnostic;
use crate::document::{DocumentResolver, TextDocument, same_file};
use crate::project::project;
use crate::reconcile::{AnchoredDiagnostic, reconcile};
use crate::report::parse_lossy;

/// A parsed and reconciled run, ready to be projected onto documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    main_source_file: PathBuf,
    findings: Vec<AnchoredDiagnostic>,
}

impl Analysis {
    /// Parses `raw` and re-measures its offsets against `documents`.
    ///
    /// A malformed report is logged and treated as empty.
    pub fn from_output<R>(raw: &str, documents: &R, overrides: &SeverityOverrides) -> Self
    where
        R: DocumentResolver + ?Sized,
    {
        let report = parse_lossy(raw, documents, overrides);
        Self {
            main_source_file: report.main_source_file,
            findings: reconcile(report.diagnostics, documents),
        }
    }

    pub fn main_source_file(&self) -> &Path {
        &self.main_source_file
    }

    pub fn findings(&self) -> &[AnchoredDiagnostic] {
        &self.findings
    }

    /// Diagnostics belonging to `document`, in report order.
    pub fn diagnostics_for<R>(&self, document: &TextDocument, documents: &R) -> Vec<Diagnostic>
    where
        R: DocumentResolver + ?Sized,
    {
        self.findings
            .iter()
            .filter(|f| same_file(&f.file_path, document.path()))
            .flat_map(|f| project(f, document, documents))
            .collect()
    }
}

/// Runs the whole pipeline for a single document.
///
/// `document` is always resolvable, whether or not `documents` contains it.
pub fn collect_diagnostics<R>(
    raw: &str,
    document: &TextDocument,
    documents: &R,
    overrides: &SeverityOverrides,
) -> Vec<Diagnostic>
where
    R: DocumentResolver + ?Sized,
{
    let resolver = Overlay { document, documents };
    Analysis::from_output(raw, &resolver, overrides).diagnostics_for(document, &resolver)
}

struct Overlay<'a, R: ?Sized> {
    document: &'a TextDocument,
    documents: &'a R,
}

impl<R> DocumentResolver for Overlay<'_, R>
where
    R: DocumentResolver + ?Sized,
{
    fn resolve(&self, path: &Path) -> Option<&TextDocument> {
        if same_file(self.document.path(), path) {
            Some(self.document)
        } else {
            self.documents.resolve(path)
        }
    }
}
