//! Template directory configuration.
//!
//! A template directory may carry a `config` file of `key=value` lines:
//!
//! ```text
//! lang=go
//! genJson=true
//! prefix=t_
//! ignoreColumnsJSON=password,salt
//! created=created_at
//! updated=updated_at
//! deleted=deleted_at
//! ```

use std::fs;
use std::path::Path;

use crate::error::{ReverseError, Result};

/// File name of the configuration file inside a template directory
pub const CONFIG_FILE_NAME: &str = "config";

/// Values read from a template directory `config` file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateConfig {
    pub lang: Option<String>,
    pub gen_json: Option<bool>,
    pub prefix: Option<String>,
    pub ignore_columns_json: Option<Vec<String>>,
    pub created: Option<Vec<String>>,
    pub updated: Option<Vec<String>>,
    pub deleted: Option<Vec<String>>,
}

impl TemplateConfig {
    /// Parse `key=value` lines. Blank lines and `#` comments are skipped;
    /// unrecognized keys are ignored.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut config = TemplateConfig::default();

        for (line_no, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                ReverseError::Config(format!(
                    "line {}: expected key=value, got '{}'",
                    line_no + 1,
                    line
                ))
            })?;
            let key = key.trim();
            let value = value.trim();

            match key {
                "lang" => config.lang = Some(value.to_string()),
                "genJson" => {
                    let parsed = value.parse::<bool>().map_err(|_| {
                        ReverseError::Config(format!(
                            "line {}: genJson must be true or false, got '{}'",
                            line_no + 1,
                            value
                        ))
                    })?;
                    config.gen_json = Some(parsed);
                }
                "prefix" => config.prefix = Some(value.to_string()),
                "ignoreColumnsJSON" => config.ignore_columns_json = Some(split_list(value)),
                "created" => config.created = Some(split_list(value)),
                "updated" => config.updated = Some(split_list(value)),
                "deleted" => config.deleted = Some(split_list(value)),
                other => tracing::debug!("Ignoring unknown config key '{}'", other),
            }
        }

        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ReverseError::io(path, e))?;
        Self::parse(&contents)
    }

    /// Load `<dir>/config` if it exists as a regular file
    pub fn discover<P: AsRef<Path>>(template_dir: P) -> Result<Option<Self>> {
        let path = template_dir.as_ref().join(CONFIG_FILE_NAME);
        if path.is_file() {
            tracing::debug!("Loading template config from {}", path.display());
            Self::load(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Values from `self`, replaced by any value `overrides` sets
    pub fn overlaid_with(self, overrides: &TemplateConfig) -> Self {
        let overrides = overrides.clone();
        Self {
            lang: overrides.lang.or(self.lang),
            gen_json: overrides.gen_json.or(self.gen_json),
            prefix: overrides.prefix.or(self.prefix),
            ignore_columns_json: overrides.ignore_columns_json.or(self.ignore_columns_json),
            created: overrides.created.or(self.created),
            updated: overrides.updated.or(self.updated),
            deleted: overrides.deleted.or(self.deleted),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Settings consulted by tag generators
#[derive(Debug, Clone, PartialEq)]
pub struct TagConfig {
    /// Emit JSON field mapping in tags
    pub gen_json: bool,
    /// Columns hidden from JSON output
    pub ignore_columns_json: Vec<String>,
    /// Columns filled on insert
    pub created: Vec<String>,
    /// Columns refreshed on update
    pub updated: Vec<String>,
    /// Soft-delete marker columns
    pub deleted: Vec<String>,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            gen_json: false,
            ignore_columns_json: Vec::new(),
            created: vec!["create_at".to_string()],
            updated: vec!["update_at".to_string()],
            deleted: vec!["deleted_at".to_string()],
        }
    }
}

impl TagConfig {
    /// Overlay values present in a template `config` file
    pub fn merged_with(mut self, file: &TemplateConfig) -> Self {
        if let Some(gen_json) = file.gen_json {
            self.gen_json = gen_json;
        }
        if let Some(ref ignore) = file.ignore_columns_json {
            self.ignore_columns_json = ignore.clone();
        }
        if let Some(ref created) = file.created {
            self.created = created.clone();
        }
        if let Some(ref updated) = file.updated {
            self.updated = updated.clone();
        }
        if let Some(ref deleted) = file.deleted {
            self.deleted = deleted.clone();
        }
        self
    }

    pub fn is_json_ignored(&self, column: &str) -> bool {
        self.ignore_columns_json.iter().any(|c| c == column)
    }

    /// Audit role of a column, if it is listed as created/updated/deleted
    pub fn audit_role(&self, column: &str) -> Option<AuditRole> {
        if self.created.iter().any(|c| c == column) {
            Some(AuditRole::Created)
        } else if self.updated.iter().any(|c| c == column) {
            Some(AuditRole::Updated)
        } else if self.deleted.iter().any(|c| c == column) {
            Some(AuditRole::Deleted)
        } else {
            None
        }
    }
}

/// Special handling for audit and soft-delete columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditRole {
    Created,
    Updated,
    Deleted,
}

impl AuditRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditRole::Created => "created",
            AuditRole::Updated => "updated",
            AuditRole::Deleted => "deleted",
        }
    }
}
