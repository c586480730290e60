//! Byte offsets to character offsets.
//!
//! clang-tidy measures offsets in bytes of the file on disk; editors address
//! text in characters. Each offset is re-measured against the text of the
//! document it points into.

use std::path::PathBuf;

use crate::diagnostic::Severity;
use crate::document::DocumentResolver;
use crate::report::{Replacement, TidyDiagnostic};

/// A replacement with offsets measured in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredReplacement {
    pub file_path: PathBuf,
    pub offset: usize,
    pub length: usize,
    pub text: String,
}

impl AnchoredReplacement {
    /// Character offset just past the replaced span.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// A diagnostic with offsets measured in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredDiagnostic {
    pub name: String,
    pub message: String,
    pub file_path: PathBuf,
    pub offset: usize,
    pub replacements: Vec<AnchoredReplacement>,
    pub severity: Severity,
}

/// Number of characters encoded by the first `offset` bytes.
///
/// A cut inside a multi-byte sequence counts the partial sequence as one
/// replacement character.
pub fn char_offset(bytes: &[u8], offset: usize) -> usize {
    let end = offset.min(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).chars().count()
}

/// Number of characters encoded by `length` bytes starting at `offset`.
pub fn char_length(bytes: &[u8], offset: usize, length: usize) -> usize {
    let start = offset.min(bytes.len());
    let end = offset.saturating_add(length).min(bytes.len());
    String::from_utf8_lossy(&bytes[start..end]).chars().count()
}

/// Re-measures every offset of `diagnostics` in characters.
///
/// Offsets pointing into files that are not open are kept as they are; the
/// projector never uses them.
pub fn reconcile<R>(diagnostics: Vec<TidyDiagnostic>, documents: &R) -> Vec<AnchoredDiagnostic>
where
    R: DocumentResolver + ?Sized,
{
    diagnostics
        .into_iter()
        .map(|diag| reconcile_one(diag, documents))
        .collect()
}

fn reconcile_one<R>(diag: TidyDiagnostic, documents: &R) -> AnchoredDiagnostic
where
    R: DocumentResolver + ?Sized,
{
    let offset = match documents.resolve(&diag.file_path) {
        Some(doc) => char_offset(doc.text().as_bytes(), diag.offset),
        None => diag.offset,
    };

    let replacements = diag
        .replacements
        .into_iter()
        .map(|rep| reconcile_replacement(rep, documents))
        .collect();

    AnchoredDiagnostic {
        name: diag.name,
        message: diag.message,
        file_path: diag.file_path,
        offset,
        replacements,
        severity: diag.severity,
    }
}

fn reconcile_replacement<R>(rep: Replacement, documents: &R) -> AnchoredReplacement
where
    R: DocumentResolver + ?Sized,
{
    let (offset, length) = match documents.resolve(&rep.file_path) {
        Some(doc) => {
            let bytes = doc.text().as_bytes();
            (
                char_offset(bytes, rep.offset),
                char_length(bytes, rep.offset, rep.length),
            )
        }
        None => (rep.offset, rep.length),
    };

    AnchoredReplacement {
        file_path: rep.file_path,
        offset,
        length,
        text: rep.text,
    }
}
