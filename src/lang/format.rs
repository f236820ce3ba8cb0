//! Source formatters applied to rendered output before it is written.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::FormatError;

/// Canonicalize rendered text for one target language
pub trait SourceFormatter: Send + Sync {
    /// Returns the formatted text, or an error if `source` does not parse
    fn format(&self, source: &str) -> Result<String, FormatError>;
}

/// Formats Go code by piping it through `gofmt`
#[derive(Debug, Clone)]
pub struct GofmtFormatter {
    program: String,
}

impl GofmtFormatter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GofmtFormatter {
    fn default() -> Self {
        Self::new("gofmt")
    }
}

impl SourceFormatter for GofmtFormatter {
    fn format(&self, source: &str) -> Result<String, FormatError> {
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FormatError::new("go", format!("cannot run {}: {}", self.program, e)))?;

        // gofmt reads all of stdin before writing, so feeding it first cannot block
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .map_err(|e| FormatError::new("go", format!("failed to feed {}: {}", self.program, e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| FormatError::new("go", format!("{} did not finish: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FormatError::new("go", stderr.trim().to_string()));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| FormatError::new("go", format!("non UTF-8 output: {}", e)))
    }
}

/// Formats Rust code by parsing it with `syn` and printing with `prettyplease`.
///
/// Plain `//` comments do not survive; doc comments do.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustFormatter;

impl SourceFormatter for RustFormatter {
    fn format(&self, source: &str) -> Result<String, FormatError> {
        let file = syn::parse_file(source).map_err(|e| FormatError::new("rust", e.to_string()))?;
        Ok(prettyplease::unparse(&file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_formatter_normalizes_layout() {
        let formatted = RustFormatter
            .format("pub struct Users{pub id:i64,\n\n\n   pub name :String}")
            .unwrap();
        assert_eq!(
            formatted,
            "pub struct Users {\n    pub id: i64,\n    pub name: String,\n}\n"
        );
    }

    #[test]
    fn test_rust_formatter_rejects_invalid_source() {
        let err = RustFormatter.format("pub struct {").unwrap_err();
        assert_eq!(err.language, "rust");
    }

    #[test]
    fn test_gofmt_missing_binary_is_format_error() {
        let formatter = GofmtFormatter::new("dbreverse-no-such-gofmt");
        let err = formatter.format("package models\n").unwrap_err();
        assert_eq!(err.language, "go");
        assert!(err.message.contains("cannot run"));
    }
}
