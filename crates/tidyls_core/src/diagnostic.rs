//! Editor-facing diagnostic types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};

/// Source tag attached to every diagnostic produced by tidyls.
pub const SOURCE: &str = "clang-tidy";

/// Severity level for diagnostics.
///
/// Serialized lowercase; deserialized from any case, `information` included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - must be fixed.
    Error,
    /// Warning - clang-tidy's default for checks.
    #[default]
    Warning,
    /// Informational message.
    Info,
    /// Hint - rendered unobtrusively by editors.
    Hint,
}

impl Severity {
    /// Parses the severity word used in clang-tidy log lines.
    ///
    /// Unknown words map to [`Severity::Warning`].
    pub fn from_log_word(word: &str) -> Self {
        word.parse().unwrap_or_default()
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "info" | "information" => Ok(Self::Info),
            "hint" => Ok(Self::Hint),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let word = String::deserialize(deserializer)?;
        word.parse().map_err(de::Error::custom)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Hint => "hint",
        };
        f.write_str(word)
    }
}

/// A position in a document.
///
/// Lines are 0-indexed; `character` counts UTF-16 code units, matching LSP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    /// Creates a new position.
    #[inline]
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A range between two positions, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    /// Creates a new range.
    #[inline]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Returns true if both ends lie on the same line.
    #[inline]
    pub const fn is_single_line(&self) -> bool {
        self.start.line == self.end.line
    }

    /// Returns true if the ranges share at least one position.
    ///
    /// Touching ranges (one ends where the other starts) intersect.
    pub fn intersects(&self, other: &TextRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// The payload needed to apply a quick fix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelatedFix {
    /// File the replacement applies to.
    pub path: PathBuf,
    /// Range in that file to replace.
    pub range: TextRange,
    /// Composed replacement text.
    pub text: String,
}

/// A normalized finding, ready to be shown in an editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: Severity,

    /// The diagnostic message.
    pub message: String,

    /// Source tag, always [`SOURCE`].
    pub source: String,

    /// The clang-tidy check name.
    pub code: String,

    /// Where the diagnostic is shown in its document.
    pub range: TextRange,

    /// Optional fix for this diagnostic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<RelatedFix>,
}

impl Diagnostic {
    /// Creates a new diagnostic without a fix.
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        range: TextRange,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            source: SOURCE.to_string(),
            code: code.into(),
            range,
            fix: None,
        }
    }

    /// Attaches a fix.
    pub fn with_fix(mut self, fix: RelatedFix) -> Self {
        self.fix = Some(fix);
        self
    }
}
