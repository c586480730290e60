//! tidyls configuration.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use jsonc_parser::ParseOptions;
use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::TidyError;
use crate::diagnostic::Severity;

// Embed the schema
const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/config.json");
static CONFIG_SCHEMA: OnceLock<Result<Validator, String>> = OnceLock::new();

/// Settings section name used by editors (`"clang-tidy": { ... }`).
pub const SETTINGS_SECTION: &str = "clang-tidy";

/// Where analysis progress is displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressLocation {
    #[default]
    Notification,
    Window,
    Disabled,
}

/// Per-rule forced severities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeverityOverrides(HashMap<String, Severity>);

impl SeverityOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the forced severity for `rule`, if configured.
    pub fn get(&self, rule: &str) -> Option<Severity> {
        self.0.get(rule).copied()
    }

    pub fn insert(&mut self, rule: impl Into<String>, severity: Severity) {
        self.0.insert(rule.into(), severity);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Severity)> for SeverityOverrides {
    fn from_iter<T: IntoIterator<Item = (String, Severity)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Configuration for clang-tidy invocation and result presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TidyConfig {
    /// clang-tidy executable.
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Check filters, joined into `--checks=`.
    #[serde(default)]
    pub checks: Vec<String>,

    /// Extra compiler arguments appended to the compile command.
    #[serde(default)]
    pub compiler_args: Vec<String>,

    /// Extra compiler arguments prepended to the compile command.
    #[serde(default)]
    pub compiler_args_before: Vec<String>,

    /// Build directory containing `compile_commands.json`.
    #[serde(default)]
    pub build_path: String,

    /// Apply fixes when linting on save.
    #[serde(default)]
    pub fix_on_save: bool,

    /// Lint documents when they are saved.
    #[serde(default = "default_lint_on_save")]
    pub lint_on_save: bool,

    /// Progress display mode.
    #[serde(default)]
    pub progress_bar_location: ProgressLocation,

    /// Per-rule severity overrides.
    #[serde(default)]
    pub severity_overrides: SeverityOverrides,
}

fn default_executable() -> String {
    "clang-tidy".to_string()
}

fn default_lint_on_save() -> bool {
    true
}

impl TidyConfig {
    /// Config file names searched for in a workspace root, in priority order.
    pub const CONFIG_FILES: &'static [&'static str] = &[".tidyls.jsonc", ".tidyls.json"];

    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            executable: default_executable(),
            checks: Vec::new(),
            compiler_args: Vec::new(),
            compiler_args_before: Vec::new(),
            build_path: String::new(),
            fix_on_save: false,
            lint_on_save: default_lint_on_save(),
            progress_bar_location: ProgressLocation::default(),
            severity_overrides: SeverityOverrides::new(),
        }
    }

    /// Finds a config file in `dir`.
    pub fn discover(dir: impl AsRef<Path>) -> Option<PathBuf> {
        let dir = dir.as_ref();
        Self::CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Loads configuration from a file.
    ///
    /// Supports `.tidyls.jsonc` and `.tidyls.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TidyError> {
        let value = Self::read_file_value(path)?;
        Self::from_value(value)
    }

    /// Reads a config file into a raw JSON value without validating it.
    pub fn read_file_value(path: impl AsRef<Path>) -> Result<Value, TidyError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| TidyError::config(format!("Failed to read config: {}", e)))?;
        parse_jsonc(&content)
    }

    /// Parses configuration from a JSON (with comments) string.
    pub fn from_json(json: &str) -> Result<Self, TidyError> {
        Self::from_value(parse_jsonc(json)?)
    }

    /// Validates a JSON value against the schema and deserializes it.
    pub fn from_value(value: Value) -> Result<Self, TidyError> {
        let schema = CONFIG_SCHEMA.get_or_init(|| {
            let schema_json: Value = serde_json::from_str(SCHEMA_JSON)
                .map_err(|e| format!("Invalid embedded config schema: {}", e))?;
            Validator::new(&schema_json)
                .map_err(|e| format!("Invalid config schema compilation: {}", e))
        });
        let schema = schema.as_ref().map_err(|e| TidyError::config(e.clone()))?;

        if let Err(e) = schema.validate(&value) {
            let error_msg = format!("{} at {}", e, e.instance_path());
            return Err(TidyError::config(format!(
                "Config validation failed: {}",
                error_msg
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| TidyError::config(format!("Invalid config: {}", e)))
    }

    /// Builds a configuration from layered JSON objects.
    ///
    /// Later layers override earlier ones key by key. Non-object layers are
    /// ignored.
    pub fn from_layers<I>(layers: I) -> Result<Self, TidyError>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut merged = Map::new();
        for layer in layers {
            if let Value::Object(map) = layer {
                merged.extend(map);
            }
        }
        Self::from_value(Value::Object(merged))
    }

    /// Extracts the tidyls settings from an editor settings payload.
    ///
    /// Accepts either the bare settings object or one nested under
    /// [`SETTINGS_SECTION`].
    pub fn settings_section(value: &Value) -> Option<Value> {
        match value.get(SETTINGS_SECTION) {
            Some(section @ Value::Object(_)) => Some(section.clone()),
            Some(_) => None,
            None => value.is_object().then(|| value.clone()),
        }
    }

    /// Builds the clang-tidy argument list for `files`.
    pub fn arguments(&self, files: &[PathBuf], fix: bool) -> Vec<String> {
        let mut args: Vec<String> = files
            .iter()
            .map(|f| f.to_string_lossy().into_owned())
            .collect();
        args.push("--export-fixes=-".to_string());

        if !self.checks.is_empty() {
            args.push(format!("--checks={}", self.checks.join(",")));
        }

        for arg in &self.compiler_args {
            args.push(format!("--extra-arg={}", arg));
        }

        for arg in &self.compiler_args_before {
            args.push(format!("--extra-arg-before={}", arg));
        }

        if !self.build_path.is_empty() {
            args.push(format!("-p={}", self.build_path));
        }

        if fix {
            args.push("--fix".to_string());
        }

        args
    }
}

impl Default for TidyConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_jsonc(content: &str) -> Result<Value, TidyError> {
    let value = jsonc_parser::parse_to_serde_value(content, &ParseOptions::default())
        .map_err(|e| TidyError::config(format!("Invalid JSON: {}", e)))?;
    Ok(value.unwrap_or(Value::Object(Map::new())))
}
