//! Template discovery.
//!
//! Templates come either from a directory tree, where every regular file is
//! a template body keyed by its path relative to the directory, or from one
//! of the built-in bodies below. Linked directories are not descended into.
//! Files ending in [`TEMPLATE_SOURCE_SUFFIX`] and the directory's `config`
//! file are auxiliary and never rendered.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILE_NAME;
use crate::error::{ReverseError, Result};

/// Suffix of template-source files that are skipped during discovery
pub const TEMPLATE_SOURCE_SUFFIX: &str = ".tpl";

/// Go structs with xorm tags
pub const GOXORM_TEMPLATE: &str = r#"package {{ package }}
{% if imports | length > 0 %}
import (
{% for imp in imports %}	"{{ imp }}"
{% endfor %})
{% endif %}
{% for table in tables %}
type {{ mapper(name=table.name) }} struct {
{% for name in table.columns_seq %}{% set col = table.columns[name] %}	{{ field(name=col.name) }}	{{ type_of(column=col) }}	{{ tag(table=table, column=col) }}
{% endfor %}}
{% endfor %}"#;

/// C++ classes with public members
pub const CPP_TEMPLATE: &str = r#"#pragma once
{% for imp in imports %}
#include {{ imp }}{% endfor %}

namespace {{ package }} {
{% for table in tables %}
class {{ mapper(name=table.name) }} {
public:
{% for name in table.columns_seq %}{% set col = table.columns[name] %}    {{ type_of(column=col) }} {{ col.name | field | untitle }};
{% endfor %}};
{% endfor %}
}  // namespace {{ package }}
"#;

/// Rust structs deriving serde traits
pub const RUST_TEMPLATE: &str = r#"//! Models for the `{{ package }}` schema.
{% for imp in imports %}
use {{ imp }};{% endfor %}
{% for table in tables %}
{% if table.comment %}{% for line in table.comment | lines %}/// {{ line }}
{% endfor %}{% endif %}#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct {{ mapper(name=table.name) }} {
{% for name in table.columns_seq %}{% set col = table.columns[name] %}{% set annotation = tag(table=table, column=col) %}{% if annotation %}    {{ annotation }}
{% endif %}    pub {{ field(name=col.name) }}: {{ type_of(column=col) }},
{% endfor %}}
{% endfor %}"#;

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("goxorm", GOXORM_TEMPLATE),
    ("cpp", CPP_TEMPLATE),
    ("rust", RUST_TEMPLATE),
];

/// Names of the built-in templates
pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN_TEMPLATES.iter().map(|(name, _)| *name).collect()
}

/// Body of a built-in template
pub fn builtin(name: &str) -> Option<&'static str> {
    BUILTIN_TEMPLATES
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, body)| *body)
}

/// Where templates are taken from
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSource {
    /// Every eligible file under this directory, recursively
    Directory(PathBuf),
    /// A single built-in template
    Builtin(String),
}

/// Loaded template bodies keyed by name, iterated in name order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateSet {
    templates: BTreeMap<String, String>,
}

impl TemplateSet {
    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.templates.insert(name.into(), body.into());
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.templates.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }
}

/// Load templates from `source`.
///
/// Unreadable files are logged and skipped, so the result may be empty;
/// callers decide whether that is fatal.
pub fn load_templates(source: &TemplateSource) -> Result<TemplateSet> {
    match source {
        TemplateSource::Builtin(name) => {
            let body = builtin(name).ok_or_else(|| ReverseError::UnknownBuiltinTemplate {
                name: name.clone(),
                available: builtin_names().join(", "),
            })?;
            let mut set = TemplateSet::default();
            set.insert(name.clone(), body);
            Ok(set)
        }
        TemplateSource::Directory(dir) => {
            if !dir.is_dir() {
                return Err(ReverseError::TemplateDirNotFound(dir.clone()));
            }
            let mut set = TemplateSet::default();
            walk_templates(dir, dir, &mut set);
            tracing::debug!("Loaded {} templates from {}", set.len(), dir.display());
            Ok(set)
        }
    }
}

fn walk_templates(root: &Path, dir: &Path, set: &mut TemplateSet) {
    let read_dir = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("Failed to read template directory {}: {}", dir.display(), e);
            return;
        }
    };

    // Sorted so discovery order never depends on the filesystem
    let mut entries: Vec<fs::DirEntry> = read_dir.filter_map(|entry| entry.ok()).collect();
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let path = entry.path();
        // DirEntry::file_type does not follow symlinks
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                tracing::error!("Skipping template {}: {}", path.display(), e);
                continue;
            }
        };
        if file_type.is_dir() {
            walk_templates(root, &path, set);
            continue;
        }
        if file_type.is_symlink() && path.is_dir() {
            tracing::debug!("Not following directory link {}", path.display());
            continue;
        }
        if !path.is_file() || is_auxiliary(&path) {
            continue;
        }

        match fs::read_to_string(&path) {
            Ok(body) => set.insert(template_key(root, &path), body),
            Err(e) => tracing::error!("Skipping template {}: {}", path.display(), e),
        }
    }
}

/// Path of a template relative to the template directory, `/`-separated
fn template_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_auxiliary(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return true,
    };
    name == CONFIG_FILE_NAME || name.ends_with(TEMPLATE_SOURCE_SUFFIX)
}

/// Output qualifier of a template key: its relative path without the
/// extension, directories joined by `_` (`dao/model.h` gives `dao_model`)
pub fn template_qualifier(name: &str) -> String {
    let mut parts: Vec<&str> = name.split(['/', '\\']).filter(|p| !p.is_empty()).collect();
    let file_name = parts.pop().unwrap_or(name);
    let stem = match file_name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    parts.push(stem);
    parts.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let set = load_templates(&TemplateSource::Builtin("goxorm".to_string())).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get("goxorm").unwrap().starts_with("package {{ package }}"));
    }

    #[test]
    fn test_unknown_builtin_is_fatal() {
        let err = load_templates(&TemplateSource::Builtin("nope".to_string())).unwrap_err();
        match err {
            ReverseError::UnknownBuiltinTemplate { name, available } => {
                assert_eq!(name, "nope");
                assert!(available.contains("goxorm"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let err = load_templates(&TemplateSource::Directory(PathBuf::from(
            "/nonexistent/dbreverse/templates",
        )))
        .unwrap_err();
        assert!(matches!(err, ReverseError::TemplateDirNotFound(_)));
    }

    #[test]
    fn test_directory_walk_skips_auxiliary_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("struct.go"), "package {{ package }}").unwrap();
        fs::write(dir.path().join("draft.go.tpl"), "ignored").unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "lang=go").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("dao.go"), "// dao").unwrap();

        let set = load_templates(&TemplateSource::Directory(dir.path().to_path_buf())).unwrap();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(names, vec!["nested/dao.go", "struct.go"]);
    }

    #[test]
    fn test_empty_directory_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("only.tpl"), "x").unwrap();
        let set = load_templates(&TemplateSource::Directory(dir.path().to_path_buf())).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_template_qualifier() {
        assert_eq!(template_qualifier("struct.go"), "struct");
        assert_eq!(template_qualifier("goxorm"), "goxorm");
        assert_eq!(template_qualifier("a/model.h"), "a_model");
        assert_eq!(template_qualifier("b/model.h"), "b_model");
        assert_eq!(template_qualifier("a/b/.hidden"), "a_b_.hidden");
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_links_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("model.h"), "// model").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let set = load_templates(&TemplateSource::Directory(dir.path().to_path_buf())).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["model.h"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_links_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        fs::write(shared.path().join("shared.h"), "// shared").unwrap();
        std::os::unix::fs::symlink(shared.path().join("shared.h"), dir.path().join("model.h")).unwrap();

        let set = load_templates(&TemplateSource::Directory(dir.path().to_path_buf())).unwrap();
        assert_eq!(set.get("model.h"), Some("// shared"));
    }
}
