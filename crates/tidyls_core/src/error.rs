//! Error types for the tidyls core.

use thiserror::Error;

/// Errors that can occur while configuring, running, or reading clang-tidy.
///
/// None of these are fatal to a host: callers degrade to "fewer diagnostics"
/// and log the error.
#[derive(Debug, Error)]
pub enum TidyError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Report parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The analysis process could not be started.
    #[error("Failed to spawn '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    /// YAML decoding error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TidyError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}
