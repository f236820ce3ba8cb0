//! Writes rendered text to disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::fs_utils;
use crate::error::{FormatError, UnitError};
use crate::lang::LanguageProfile;

/// A file that was written
#[derive(Debug, Clone, PartialEq)]
pub struct Written {
    pub path: PathBuf,
    pub bytes: usize,
    /// Set when the formatter rejected the text and it was written as rendered
    pub format_error: Option<FormatError>,
}

/// Formats and writes render output for one language
pub struct OutputWriter {
    profile: Arc<dyn LanguageProfile>,
}

impl OutputWriter {
    pub fn new(profile: Arc<dyn LanguageProfile>) -> Self {
        Self { profile }
    }

    /// Write `text` to `path`, replacing any existing file.
    ///
    /// Blank text is never written. A formatter failure does not fail the
    /// unit: the raw text is written and the error is returned in
    /// [`Written::format_error`].
    pub fn write(&self, path: &Path, text: &str) -> Result<Written, UnitError> {
        if text.trim().is_empty() {
            return Err(UnitError::EmptyOutput);
        }

        let (contents, format_error) = match self.profile.formatter() {
            Some(formatter) => match formatter.format(text) {
                Ok(formatted) => (formatted, None),
                Err(e) => {
                    tracing::warn!("{}; writing {} unformatted", e, path.display());
                    (text.to_string(), Some(e))
                }
            },
            None => (text.to_string(), None),
        };

        let bytes = fs_utils::write_file(path, &contents).map_err(|source| UnitError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Wrote {} bytes to {}", bytes, path.display());

        Ok(Written {
            path: path.to_path_buf(),
            bytes,
            format_error,
        })
    }
}
