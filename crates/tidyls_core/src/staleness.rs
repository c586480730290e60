//! Published diagnostics and their invalidation on edits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::diagnostic::{Diagnostic, Position, Severity, TextRange};
use crate::document::{normalize_path, same_file};

/// Returns true if `edit` invalidates a diagnostic shown at `range`.
///
/// An edit invalidates a diagnostic when the ranges intersect (touching
/// counts), or when the edit stays on one line and that line is the one the
/// diagnostic starts on.
pub fn is_stale(range: &TextRange, edit: &TextRange) -> bool {
    edit.intersects(range) || (edit.is_single_line() && edit.start.line == range.start.line)
}

/// Drops every diagnostic invalidated by any of `edits`.
///
/// Returns true if anything was removed.
pub fn prune_stale(diagnostics: &mut Vec<Diagnostic>, edits: &[TextRange]) -> bool {
    let before = diagnostics.len();
    diagnostics.retain(|diag| !edits.iter().any(|edit| is_stale(&diag.range, edit)));
    diagnostics.len() != before
}

/// Drops the diagnostics of `path` invalidated by replacing `edit` with
/// `new_text`, and moves the survivors to where that text now puts them.
///
/// Fixes pointing into `path` move along. Returns true if anything was removed.
pub fn track_edit(
    diagnostics: &mut Vec<Diagnostic>,
    path: &Path,
    edit: &TextRange,
    new_text: &str,
) -> bool {
    let pruned = prune_stale(diagnostics, std::slice::from_ref(edit));
    for diag in diagnostics.iter_mut() {
        diag.range = shift_range(diag.range, edit, new_text);
        if let Some(fix) = diag.fix.as_mut()
            && same_file(&fix.path, path)
        {
            fix.range = shift_range(fix.range, edit, new_text);
        }
    }
    pruned
}

fn shift_range(range: TextRange, edit: &TextRange, new_text: &str) -> TextRange {
    TextRange::new(
        shift(range.start, edit, new_text),
        shift(range.end, edit, new_text),
    )
}

/// Where `position` lands once `edit` holds `new_text`.
///
/// Positions before the end of the edit stay put.
fn shift(position: Position, edit: &TextRange, new_text: &str) -> Position {
    if position < edit.end {
        return position;
    }

    let added_lines = new_text.matches('\n').count() as u32;
    let end_line = edit.start.line + added_lines;
    if position.line != edit.end.line {
        return Position::new(position.line - edit.end.line + end_line, position.character);
    }

    let last = new_text.rsplit('\n').next().unwrap_or_default();
    let last_units = last.encode_utf16().count() as u32;
    let base = if added_lines == 0 { edit.start.character } else { 0 };
    Position::new(
        end_line,
        base + last_units + (position.character - edit.end.character),
    )
}

/// Per-document published diagnostics.
///
/// An empty set is the same as no set at all.
#[derive(Debug, Default)]
pub struct DiagnosticStore {
    data: HashMap<String, (PathBuf, Vec<Diagnostic>)>,
}

impl DiagnosticStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the set for `path`.
    pub fn update(&mut self, path: &Path, items: Vec<Diagnostic>) {
        let key = normalize_path(path);
        if items.is_empty() {
            self.data.remove(&key);
        } else {
            self.data.insert(key, (path.to_path_buf(), items));
        }
    }

    pub fn get(&self, path: &Path) -> Option<&[Diagnostic]> {
        self.data
            .get(&normalize_path(path))
            .map(|(_, items)| items.as_slice())
    }

    /// Returns true if `path` has a non-empty published set.
    pub fn has(&self, path: &Path) -> bool {
        self.data.contains_key(&normalize_path(path))
    }

    pub fn remove(&mut self, path: &Path) -> Option<Vec<Diagnostic>> {
        self.data.remove(&normalize_path(path)).map(|(_, items)| items)
    }

    /// Clears every set, returning the paths that had one.
    pub fn clear(&mut self) -> Vec<PathBuf> {
        self.data.drain().map(|(_, (path, _))| path).collect()
    }

    /// Applies [`prune_stale`] to the set of `path`.
    ///
    /// Returns the remaining diagnostics if anything was removed.
    pub fn prune_stale(&mut self, path: &Path, edits: &[TextRange]) -> Option<Vec<Diagnostic>> {
        self.prune_with(path, |items| prune_stale(items, edits))
    }

    /// Applies [`track_edit`] for each of `edits`, in order, to the set of
    /// `path`.
    ///
    /// Each edit is expressed against the text left by the previous one.
    /// Returns the remaining diagnostics if anything was removed.
    pub fn track_edits(
        &mut self,
        path: &Path,
        edits: &[(TextRange, String)],
    ) -> Option<Vec<Diagnostic>> {
        self.prune_with(path, |items| {
            edits.iter().fold(false, |pruned, (edit, text)| {
                track_edit(items, path, edit, text) || pruned
            })
        })
    }

    fn prune_with<F>(&mut self, path: &Path, prune: F) -> Option<Vec<Diagnostic>>
    where
        F: FnOnce(&mut Vec<Diagnostic>) -> bool,
    {
        let key = normalize_path(path);
        let (_, items) = self.data.get_mut(&key)?;
        if !prune(items) {
            return None;
        }
        let remaining = items.clone();
        if remaining.is_empty() {
            self.data.remove(&key);
        }
        Some(remaining)
    }

    /// Number of error diagnostics across all documents.
    pub fn error_count(&self) -> usize {
        self.data
            .values()
            .flat_map(|(_, items)| items)
            .filter(|d| d.severity == Severity::Error)
            .count()
    }
}
