//! clang-tidy output parsing.
//!
//! clang-tidy run with `--export-fixes=-` writes free-text log lines followed
//! by a YAML document describing every finding. The YAML carries offsets and
//! fixes; the log lines carry the severity words.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::TidyError;
use crate::config::SeverityOverrides;
use crate::diagnostic::Severity;
use crate::document::{DocumentResolver, normalize_path};

/// A proposed edit, in clang-tidy's byte units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub file_path: PathBuf,
    /// Byte offset into the target file.
    pub offset: usize,
    /// Byte length of the replaced span (0 = pure insertion).
    pub length: usize,
    pub text: String,
}

/// One finding as reported by clang-tidy, offsets in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TidyDiagnostic {
    /// Check name, e.g. `modernize-use-nullptr`.
    pub name: String,
    pub message: String,
    pub file_path: PathBuf,
    /// Byte offset of the finding.
    pub offset: usize,
    /// Replacements in file order.
    pub replacements: Vec<Replacement>,
    pub severity: Severity,
}

/// The parsed report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TidyReport {
    pub main_source_file: PathBuf,
    pub diagnostics: Vec<TidyDiagnostic>,
}

/// A `<path>:<line>:<col>: <severity>: <text>` log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityLine {
    pub path: PathBuf,
    /// 1-indexed line.
    pub line: usize,
    /// 1-indexed byte column.
    pub column: usize,
    pub severity: Severity,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct YamlReport {
    #[serde(default)]
    main_source_file: String,
    #[serde(default, deserialize_with = "nullable_seq")]
    diagnostics: Vec<YamlDiagnostic>,
}

/// Both historical record shapes: clang-tidy >= 9 nests the location under
/// `DiagnosticMessage`, older releases flatten it into the record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct YamlDiagnostic {
    diagnostic_name: String,
    diagnostic_message: Option<YamlMessage>,
    message: Option<String>,
    file_path: Option<String>,
    file_offset: Option<usize>,
    #[serde(default, deserialize_with = "nullable_seq")]
    replacements: Vec<YamlReplacement>,
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct YamlMessage {
    message: String,
    #[serde(default)]
    file_path: String,
    #[serde(default)]
    file_offset: usize,
    #[serde(default, deserialize_with = "nullable_seq")]
    replacements: Vec<YamlReplacement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct YamlReplacement {
    file_path: String,
    offset: usize,
    length: usize,
    #[serde(default)]
    replacement_text: String,
}

/// A key with no entries (`Replacements:`) reads as null.
fn nullable_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<YamlReplacement> for Replacement {
    fn from(r: YamlReplacement) -> Self {
        Self {
            file_path: PathBuf::from(r.file_path),
            offset: r.offset,
            length: r.length,
            text: r.replacement_text,
        }
    }
}

impl YamlDiagnostic {
    fn normalize(self) -> Option<TidyDiagnostic> {
        let severity = self
            .level
            .as_deref()
            .map(level_severity)
            .unwrap_or_default();

        if let Some(msg) = self.diagnostic_message {
            return Some(TidyDiagnostic {
                name: self.diagnostic_name,
                message: msg.message,
                file_path: PathBuf::from(msg.file_path),
                offset: msg.file_offset,
                replacements: msg.replacements.into_iter().map(Into::into).collect(),
                severity,
            });
        }

        match (self.message, self.file_path, self.file_offset) {
            (Some(message), Some(file_path), Some(offset)) => Some(TidyDiagnostic {
                name: self.diagnostic_name,
                message,
                file_path: PathBuf::from(file_path),
                offset,
                replacements: self.replacements.into_iter().map(Into::into).collect(),
                severity,
            }),
            _ => {
                debug!(
                    "Skipping diagnostic '{}' without a location",
                    self.diagnostic_name
                );
                None
            }
        }
    }
}

fn level_severity(level: &str) -> Severity {
    match level {
        "Error" => Severity::Error,
        "Remark" => Severity::Info,
        _ => Severity::Warning,
    }
}

/// Extracts the structured report embedded in raw clang-tidy output.
///
/// Output without a report block (a clean file, or a failed run) yields an
/// empty report rather than an error.
pub fn parse_report(raw: &str) -> Result<TidyReport, TidyError> {
    let Some(block) = extract_yaml_block(raw) else {
        debug!("No report block in clang-tidy output");
        return Ok(TidyReport::default());
    };

    let yaml: YamlReport = serde_yaml::from_str(block)?;

    Ok(TidyReport {
        main_source_file: PathBuf::from(yaml.main_source_file),
        diagnostics: yaml
            .diagnostics
            .into_iter()
            .filter_map(YamlDiagnostic::normalize)
            .collect(),
    })
}

/// Returns the text from the first `---` line up to the closing `...` line.
fn extract_yaml_block(raw: &str) -> Option<&str> {
    let mut offset = 0;
    let mut start = None;
    for line in raw.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);
        match start {
            None if content == "---" => start = Some(offset),
            Some(begin) if content == "..." => return Some(&raw[begin..offset + line.len()]),
            _ => {}
        }
        offset += line.len();
    }
    start.map(|begin| &raw[begin..])
}

static SEVERITY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?):(\d+):(\d+):\s+(warning|error|info|hint):\s+.*$")
        .expect("valid severity line regex")
});

/// Scans every output line for `<path>:<line>:<col>: <severity>: <text>`.
pub fn collect_severity_lines(raw: &str) -> Vec<SeverityLine> {
    raw.lines()
        .filter_map(|line| {
            let caps = SEVERITY_LINE.captures(line)?;
            Some(SeverityLine {
                path: PathBuf::from(&caps[1]),
                line: caps[2].parse().ok()?,
                column: caps[3].parse().ok()?,
                severity: Severity::from_log_word(&caps[4]),
            })
        })
        .collect()
}

impl TidyReport {
    /// Assigns log-line severities to diagnostics.
    ///
    /// A diagnostic first takes the severity of the log line reporting the
    /// same file, line and column, computed from its byte offset against the
    /// open document. Diagnostics left unmatched fall back to the log line
    /// at the same index, if that line exists and was not claimed.
    pub fn assign_severities<R>(&mut self, lines: &[SeverityLine], documents: &R)
    where
        R: DocumentResolver + ?Sized,
    {
        let mut claimed = vec![false; lines.len()];
        let mut matched = vec![false; self.diagnostics.len()];

        for (i, diag) in self.diagnostics.iter_mut().enumerate() {
            let Some((line, column)) = byte_line_column(diag, documents) else {
                continue;
            };
            let diag_path = normalize_path(&diag.file_path);

            let found = lines.iter().enumerate().position(|(j, l)| {
                !claimed[j]
                    && l.line == line
                    && l.column == column
                    && paths_match(&diag_path, &normalize_path(&l.path))
            });
            if let Some(j) = found {
                diag.severity = lines[j].severity;
                claimed[j] = true;
                matched[i] = true;
            }
        }

        if lines.len() != self.diagnostics.len() {
            debug!(
                "{} severity lines for {} diagnostics",
                lines.len(),
                self.diagnostics.len()
            );
        }

        for (i, diag) in self.diagnostics.iter_mut().enumerate() {
            if matched[i] {
                continue;
            }
            if let Some(line) = lines.get(i)
                && !claimed[i]
            {
                diag.severity = line.severity;
                claimed[i] = true;
            }
        }
    }

    /// Forces configured severities by check name.
    pub fn apply_overrides(&mut self, overrides: &SeverityOverrides) {
        if overrides.is_empty() {
            return;
        }
        for diag in &mut self.diagnostics {
            if let Some(severity) = overrides.get(&diag.name) {
                diag.severity = severity;
            }
        }
    }
}

/// Parses raw output into a report with severities resolved.
///
/// Severity precedence: configured override, then log line, then the level
/// recorded in the report, then [`Severity::Warning`].
pub fn parse<R>(
    raw: &str,
    documents: &R,
    overrides: &SeverityOverrides,
) -> Result<TidyReport, TidyError>
where
    R: DocumentResolver + ?Sized,
{
    let mut report = parse_report(raw)?;
    let lines = collect_severity_lines(raw);
    report.assign_severities(&lines, documents);
    report.apply_overrides(overrides);
    Ok(report)
}

/// Like [`parse`], but logs a malformed report and returns an empty one.
pub fn parse_lossy<R>(raw: &str, documents: &R, overrides: &SeverityOverrides) -> TidyReport
where
    R: DocumentResolver + ?Sized,
{
    match parse(raw, documents, overrides) {
        Ok(report) => report,
        Err(e) => {
            warn!("Failed to parse clang-tidy report: {}", e);
            TidyReport::default()
        }
    }
}

/// 1-indexed line and byte column of a diagnostic's offset.
fn byte_line_column<R>(diag: &TidyDiagnostic, documents: &R) -> Option<(usize, usize)>
where
    R: DocumentResolver + ?Sized,
{
    let doc = documents.resolve(&diag.file_path)?;
    let bytes = doc.text().as_bytes();
    let offset = diag.offset.min(bytes.len());
    let prefix = &bytes[..offset];
    let line = prefix.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = prefix
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    Some((line, offset - line_start + 1))
}

/// Equal paths, or one a relative suffix of the other.
fn paths_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    !short.starts_with('/') && long.ends_with(short) && long[..long.len() - short.len()].ends_with('/')
}
