//! Target language profiles.
//!
//! A [`LanguageProfile`] bundles everything the template engine needs to
//! know about one output language: identifier casing, type mapping, tag
//! generation, import collection and an optional formatter. The engine only
//! talks to this trait, so adding a language means adding a profile here.

pub mod cpp;
pub mod format;
pub mod golang;
pub mod kind;
pub mod rust;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::config::TagConfig;
use crate::error::{ReverseError, Result};
use crate::schema::{Column, Table};

pub use cpp::CppProfile;
pub use format::{GofmtFormatter, RustFormatter, SourceFormatter};
pub use golang::GoProfile;
pub use kind::SqlKind;
pub use rust::RustProfile;

/// Naming, typing, tagging, import and formatting rules for one language
pub trait LanguageProfile: Send + Sync {
    /// Canonical registry key, e.g. `go`
    fn key(&self) -> &'static str;

    /// Extension of generated files, including the dot
    fn extension(&self) -> &'static str;

    /// Built-in template used when no template directory is given
    fn default_template(&self) -> &'static str;

    /// Map a raw database identifier to a type name
    fn map_identifier(&self, raw: &str) -> String;

    /// Map a raw column name to a field name
    fn map_field(&self, raw: &str) -> String {
        self.map_identifier(raw)
    }

    /// Target type for a column. Unrecognized raw types map to
    /// [`LanguageProfile::fallback_type`].
    fn map_type(&self, column: &Column) -> String;

    fn fallback_type(&self) -> &'static str;

    /// Annotation string for a column (struct tag, attributes, ...)
    fn generate_tag(&self, table: &Table, column: &Column, config: &TagConfig) -> String;

    /// Imports needed by the types used across `tables`
    fn compute_imports(&self, tables: &[Table]) -> BTreeSet<String>;

    fn formatter(&self) -> Option<&dyn SourceFormatter> {
        None
    }
}

/// Language keys and their aliases
const LANGUAGE_KEYS: &[(&str, &[&str])] = &[
    ("go", &["golang"]),
    ("c++", &["cpp"]),
    ("rust", &["rs"]),
];

/// Look up a profile by key or alias (case-insensitive)
pub fn lookup(key: &str) -> Result<Arc<dyn LanguageProfile>> {
    let normalized = key.trim().to_lowercase();
    let canonical = LANGUAGE_KEYS
        .iter()
        .find(|(name, aliases)| *name == normalized || aliases.contains(&normalized.as_str()))
        .map(|(name, _)| *name);

    match canonical {
        Some("go") => Ok(Arc::new(GoProfile::new())),
        Some("c++") => Ok(Arc::new(CppProfile)),
        Some("rust") => Ok(Arc::new(RustProfile::default())),
        _ => Err(ReverseError::UnsupportedLanguage(key.to_string())),
    }
}

/// Canonical keys of all registered languages
pub fn supported_languages() -> Vec<&'static str> {
    LANGUAGE_KEYS.iter().map(|(name, _)| *name).collect()
}

/// A column whose raw type no profile recognizes
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownType {
    pub table: String,
    pub column: String,
    pub raw_type: String,
}

/// Columns that will be generated with the fallback type
pub fn unknown_types(tables: &[Table]) -> Vec<UnknownType> {
    tables
        .iter()
        .flat_map(|table| {
            table
                .columns()
                .filter(|c| SqlKind::classify(&c.sql_type) == SqlKind::Unknown)
                .map(move |c| UnknownType {
                    table: table.name.clone(),
                    column: c.name.clone(),
                    raw_type: c.sql_type.name.clone(),
                })
        })
        .collect()
}

/// Distinct columns of one table that map to the same field name
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierCollision {
    pub table: String,
    pub field: String,
    pub columns: Vec<String>,
}

impl fmt::Display for IdentifierCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: columns {} all map to field '{}'",
            self.table,
            self.columns.join(", "),
            self.field
        )
    }
}

pub fn identifier_collisions(profile: &dyn LanguageProfile, table: &Table) -> Vec<IdentifierCollision> {
    let mut by_field: HashMap<String, Vec<String>> = HashMap::new();
    let mut order = Vec::new();

    for column in table.columns() {
        let field = profile.map_field(&column.name);
        let entry = by_field.entry(field.clone()).or_default();
        if entry.is_empty() {
            order.push(field);
        }
        entry.push(column.name.clone());
    }

    order
        .into_iter()
        .filter_map(|field| {
            let columns = by_field.remove(&field)?;
            (columns.len() > 1).then(|| IdentifierCollision {
                table: table.name.clone(),
                field,
                columns,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SqlType;

    #[test]
    fn test_lookup_aliases() {
        assert_eq!(lookup("go").unwrap().key(), "go");
        assert_eq!(lookup("Golang").unwrap().key(), "go");
        assert_eq!(lookup("cpp").unwrap().key(), "c++");
        assert_eq!(lookup("rs").unwrap().extension(), ".rs");
    }

    #[test]
    fn test_lookup_unsupported() {
        match lookup("cobol") {
            Err(ReverseError::UnsupportedLanguage(key)) => assert_eq!(key, "cobol"),
            other => panic!("expected UnsupportedLanguage, got {:?}", other.map(|p| p.key())),
        }
    }

    #[test]
    fn test_unknown_types_reported() {
        let table = Table::new("places")
            .with_column(Column::new("id", SqlType::new("int")))
            .with_column(Column::new("shape", SqlType::new("geometry")));
        let unknown = unknown_types(&[table]);
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].column, "shape");
        assert_eq!(unknown[0].raw_type, "geometry");
    }

    #[test]
    fn test_identifier_collisions() {
        let table = Table::new("users")
            .with_column(Column::new("user_id", SqlType::new("int")))
            .with_column(Column::new("userId", SqlType::new("int")))
            .with_column(Column::new("name", SqlType::new("text")));
        let go = GoProfile::new();
        let collisions = identifier_collisions(&go, &table);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].field, "UserId");
        assert_eq!(collisions[0].columns, vec!["user_id", "userId"]);
        assert_eq!(
            collisions[0].to_string(),
            "users: columns user_id, userId all map to field 'UserId'"
        );
    }
}
