//! Error types for schema reverse generation.
//!
//! Errors are split by blast radius: [`ReverseError`] aborts a whole run,
//! [`UnitError`] fails a single render unit while the rest carry on, and
//! [`FormatError`] only downgrades a unit to its unformatted text.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fatal pipeline operations
pub type Result<T> = std::result::Result<T, ReverseError>;

/// Fatal errors that abort a generation run
#[derive(Error, Debug)]
pub enum ReverseError {
    /// The database connection could not be established
    #[error("failed to connect to {driver} database: {message}")]
    Connection { driver: String, message: String },

    /// Table or column introspection failed
    #[error("failed to read schema metadata: {0}")]
    Metadata(String),

    /// The driver key is not one of the known database kinds
    #[error("unsupported database driver: '{0}' (supported: mysql, postgres, sqlite3, json)")]
    UnsupportedDriver(String),

    /// The driver is known but its backend was not compiled in
    #[error("database driver '{driver}' requires building with the '{feature}' feature")]
    DriverNotCompiled { driver: String, feature: String },

    /// No language profile is registered under the requested key
    #[error("unsupported programming language: '{0}'")]
    UnsupportedLanguage(String),

    /// A template body failed to compile
    #[error("template '{name}' has invalid syntax: {message}")]
    TemplateSyntax { name: String, message: String },

    /// Template loading produced nothing to render
    #[error("no templates were loaded from {0}")]
    EmptyTemplateSet(String),

    /// No template directory was given and the built-in name is unknown
    #[error("no built-in template named '{name}' (available: {available})")]
    UnknownBuiltinTemplate { name: String, available: String },

    /// The configured template directory does not exist
    #[error("template directory does not exist: {0}")]
    TemplateDirNotFound(PathBuf),

    /// The table filter is not a valid regular expression
    #[error("invalid table filter '{pattern}': {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A configuration file or run file is malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem access outside of per-unit writes failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReverseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReverseError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Recoverable errors scoped to one render unit
#[derive(Error, Debug)]
pub enum UnitError {
    /// The template failed while executing against this unit's context
    #[error("render failed: {0}")]
    Render(String),

    /// The template produced no text, so nothing was written
    #[error("rendered output is empty")]
    EmptyOutput,

    /// The table name cannot be used as a file name inside the output directory
    #[error("'{0}' is not a safe file name")]
    UnsafeName(String),

    /// An earlier unit of this run already wrote the destination file
    #[error("{path} was already generated from template {template}")]
    DuplicateOutput { path: PathBuf, template: String },

    /// The destination file could not be written
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Formatter failure; the unformatted text is written instead
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{language} formatter failed: {message}")]
pub struct FormatError {
    pub language: String,
    pub message: String,
}

impl FormatError {
    pub fn new(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            message: message.into(),
        }
    }
}

/// Join an error with its chain of sources into one line.
///
/// Tera and diesel keep the useful detail in `source()`, not in `Display`.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = cause.source();
    }
    message
}
