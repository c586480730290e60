//! Document capability interface.
//!
//! The core never talks to an editor directly. Hosts hand it open documents
//! through [`DocumentResolver`], and all position math goes through
//! [`TextDocument`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::diagnostic::{Position, TextRange};

/// An open document: a path plus its current UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    path: PathBuf,
    text: String,
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
}

impl TextDocument {
    /// Creates a new document.
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = compute_line_starts(&text);
        Self {
            path: path.into(),
            text,
            line_starts,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of lines (a trailing newline opens an empty last line).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Replaces the whole text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.line_starts = compute_line_starts(&self.text);
    }

    /// Replaces `range` with `new_text`.
    pub fn apply_edit(&mut self, range: TextRange, new_text: &str) {
        let start = self.offset_at(range.start);
        let end = self.offset_at(range.end).max(start);
        self.text.replace_range(start..end, new_text);
        self.line_starts = compute_line_starts(&self.text);
    }

    /// Converts a character offset (Unicode scalar values) to a position.
    ///
    /// Offsets past the end clamp to the end of the document.
    pub fn position_at(&self, char_offset: usize) -> Position {
        self.position_at_byte(self.char_to_byte(char_offset))
    }

    /// Converts a byte offset to a position, rounding down to a char boundary.
    pub fn position_at_byte(&self, byte_offset: usize) -> Position {
        let mut byte_offset = byte_offset.min(self.text.len());
        while !self.text.is_char_boundary(byte_offset) {
            byte_offset -= 1;
        }

        let line = self
            .line_starts
            .partition_point(|&start| start <= byte_offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line];
        let character: usize = self.text[line_start..byte_offset]
            .chars()
            .map(char::len_utf16)
            .sum();

        Position::new(line as u32, character as u32)
    }

    /// Converts a position to a byte offset.
    ///
    /// Lines past the end clamp to the end of the document; characters past
    /// the end of a line clamp to the line end.
    pub fn offset_at(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.line_starts.len() {
            return self.text.len();
        }

        let line_start = self.line_starts[line];
        let line_end = self.line_content_end(line);
        let mut units = 0usize;
        let mut offset = line_start;
        for ch in self.text[line_start..line_end].chars() {
            if units >= position.character as usize {
                break;
            }
            units += ch.len_utf16();
            offset += ch.len_utf8();
        }
        offset
    }

    /// The range covering the whole content of `line`, line break excluded.
    pub fn line_range(&self, line: u32) -> TextRange {
        let idx = (line as usize).min(self.line_starts.len() - 1);
        let start = self.line_starts[idx];
        let end = self.line_content_end(idx);
        let width: usize = self.text[start..end].chars().map(char::len_utf16).sum();

        TextRange::new(
            Position::new(idx as u32, 0),
            Position::new(idx as u32, width as u32),
        )
    }

    /// Returns the text between two character offsets.
    pub fn text_between(&self, start_char: usize, end_char: usize) -> &str {
        let start = self.char_to_byte(start_char);
        let end = self.char_to_byte(end_char);
        if start >= end {
            return "";
        }
        &self.text[start..end]
    }

    /// Converts a character offset to a byte offset, clamping at the end.
    pub fn char_to_byte(&self, char_offset: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_offset)
            .map(|(byte, _)| byte)
            .unwrap_or(self.text.len())
    }

    fn line_content_end(&self, line: usize) -> usize {
        let next = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.text.len());
        let content = &self.text[self.line_starts[line]..next];
        let trimmed = content
            .strip_suffix('\n')
            .map(|c| c.strip_suffix('\r').unwrap_or(c))
            .unwrap_or(content);
        self.line_starts[line] + trimmed.len()
    }
}

fn compute_line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Looks up open documents by path.
pub trait DocumentResolver {
    /// Returns the open document for `path`, if any.
    fn resolve(&self, path: &Path) -> Option<&TextDocument>;
}

impl DocumentResolver for TextDocument {
    fn resolve(&self, path: &Path) -> Option<&TextDocument> {
        same_file(&self.path, path).then_some(self)
    }
}

/// A set of open documents keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: HashMap<String, TextDocument>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document.
    pub fn insert(&mut self, document: TextDocument) {
        self.documents
            .insert(normalize_path(document.path()), document);
    }

    pub fn remove(&mut self, path: &Path) -> Option<TextDocument> {
        self.documents.remove(&normalize_path(path))
    }

    pub fn get(&self, path: &Path) -> Option<&TextDocument> {
        self.documents.get(&normalize_path(path))
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut TextDocument> {
        self.documents.get_mut(&normalize_path(path))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.documents.contains_key(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextDocument> {
        self.documents.values()
    }
}

impl DocumentResolver for DocumentSet {
    fn resolve(&self, path: &Path) -> Option<&TextDocument> {
        self.get(path)
    }
}

/// Normalizes a path for comparison.
///
/// Separators become `/`, `.` and `..` components are folded, and a leading
/// drive letter is lowercased. The result is only meant for equality checks.
pub fn normalize_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");

    let mut raw = raw.as_str();
    if raw.len() >= 3 && raw.starts_with('/') && has_drive_prefix(&raw[1..]) {
        raw = &raw[1..];
    }

    let absolute = raw.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let mut normalized = parts.join("/");
    if absolute {
        normalized.insert(0, '/');
    }
    if has_drive_prefix(&normalized) {
        normalized[..1].make_ascii_lowercase();
    }
    normalized
}

/// Returns true if both paths name the same file.
pub fn same_file(a: &Path, b: &Path) -> bool {
    normalize_path(a) == normalize_path(b)
}

fn has_drive_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_position_at_ascii() {
        let doc = TextDocument::new("a.cpp", "int a;\nint b;\n");
        assert_eq!(doc.position_at(0), Position::new(0, 0));
        assert_eq!(doc.position_at(7), Position::new(1, 0));
        assert_eq!(doc.position_at(9), Position::new(1, 2));
        assert_eq!(doc.position_at(100), Position::new(2, 0));
    }

    #[test]
    fn test_position_at_multibyte() {
        // 'あ' is one char, 3 bytes, 1 UTF-16 unit; '🎉' is one char, 2 UTF-16 units.
        let doc = TextDocument::new("a.cpp", "あ🎉b\nx");
        assert_eq!(doc.position_at(1), Position::new(0, 1));
        assert_eq!(doc.position_at(2), Position::new(0, 3));
        assert_eq!(doc.position_at(4), Position::new(1, 0));
    }

    #[test]
    fn test_offset_at_roundtrip() {
        let doc = TextDocument::new("a.cpp", "あ🎉b\nxyz");
        for byte in [0usize, 3, 7, 8, 9, 11] {
            let pos = doc.position_at_byte(byte);
            assert_eq!(doc.offset_at(pos), byte, "byte offset {byte}");
        }
    }

    #[test]
    fn test_offset_at_clamps() {
        let doc = TextDocument::new("a.cpp", "ab\ncd");
        assert_eq!(doc.offset_at(Position::new(0, 99)), 2);
        assert_eq!(doc.offset_at(Position::new(9, 0)), 5);
    }

    #[test]
    fn test_line_range_excludes_crlf() {
        let doc = TextDocument::new("a.cpp", "abc\r\nde\n");
        assert_eq!(
            doc.line_range(0),
            TextRange::new(Position::new(0, 0), Position::new(0, 3))
        );
        assert_eq!(
            doc.line_range(1),
            TextRange::new(Position::new(1, 0), Position::new(1, 2))
        );
    }

    #[test]
    fn test_apply_edit() {
        let mut doc = TextDocument::new("a.cpp", "int a;\nint b;");
        doc.apply_edit(
            TextRange::new(Position::new(1, 4), Position::new(1, 5)),
            "value",
        );
        assert_eq!(doc.text(), "int a;\nint value;");
        assert_eq!(doc.line_count(), 2);
    }

    #[test]
    fn test_text_between() {
        let doc = TextDocument::new("a.cpp", "fooあbar");
        assert_eq!(doc.text_between(3, 5), "あb");
        assert_eq!(doc.text_between(5, 3), "");
    }

    #[rstest]
    #[case("C:\\src\\a.cpp", "c:/src/a.cpp")]
    #[case("/c:/src/a.cpp", "c:/src/a.cpp")]
    #[case("/home/u/./src/../a.cpp", "/home/u/a.cpp")]
    #[case("src//a.cpp", "src/a.cpp")]
    fn test_normalize_path(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_path(Path::new(input)), expected);
    }

    #[test]
    fn test_same_file_ignores_drive_case_and_separators() {
        assert!(same_file(
            Path::new("c:\\Project\\a.cpp"),
            Path::new("C:/Project/a.cpp")
        ));
        assert!(!same_file(
            Path::new("C:/Project/a.cpp"),
            Path::new("C:/project/a.cpp")
        ));
    }

    #[test]
    fn test_document_set_resolves_normalized() {
        let mut set = DocumentSet::new();
        set.insert(TextDocument::new("C:\\p\\a.cpp", "x"));

        assert!(set.resolve(Path::new("c:/p/a.cpp")).is_some());
        assert!(set.resolve(Path::new("c:/p/b.cpp")).is_none());
        assert!(set.remove(Path::new("C:/p/a.cpp")).is_some());
        assert!(set.is_empty());
    }
}
