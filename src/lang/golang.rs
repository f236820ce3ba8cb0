//! Go profile producing xorm-annotated structs.

use std::collections::BTreeSet;

use super::format::{GofmtFormatter, SourceFormatter};
use super::kind::SqlKind;
use super::LanguageProfile;
use crate::codegen::utils::to_pascal_case;
use crate::config::TagConfig;
use crate::schema::{Column, IndexKind, Table};

const TIME_TYPE: &str = "time.Time";

pub struct GoProfile {
    formatter: GofmtFormatter,
}

impl GoProfile {
    pub fn new() -> Self {
        Self {
            formatter: GofmtFormatter::default(),
        }
    }

    fn type_for_kind(kind: SqlKind) -> Option<&'static str> {
        let ty = match kind {
            SqlKind::Bool => "bool",
            SqlKind::Int => "int",
            SqlKind::BigInt => "int64",
            SqlKind::Float => "float32",
            SqlKind::Double => "float64",
            SqlKind::Decimal | SqlKind::Text | SqlKind::Json | SqlKind::Uuid => "string",
            SqlKind::Bytes => "[]byte",
            SqlKind::Date | SqlKind::Time | SqlKind::DateTime | SqlKind::TimestampTz => TIME_TYPE,
            SqlKind::Unknown => return None,
        };
        Some(ty)
    }
}

impl Default for GoProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageProfile for GoProfile {
    fn key(&self) -> &'static str {
        "go"
    }

    fn extension(&self) -> &'static str {
        ".go"
    }

    fn default_template(&self) -> &'static str {
        "goxorm"
    }

    fn map_identifier(&self, raw: &str) -> String {
        to_pascal_case(raw)
    }

    fn map_type(&self, column: &Column) -> String {
        Self::type_for_kind(SqlKind::classify(&column.sql_type))
            .unwrap_or(self.fallback_type())
            .to_string()
    }

    fn fallback_type(&self) -> &'static str {
        "string"
    }

    fn generate_tag(&self, table: &Table, column: &Column, config: &TagConfig) -> String {
        let mut xorm: Vec<String> = Vec::new();

        // xorm infers NOT NULL for an int64 Id primary key
        let is_id_pk = self.map_identifier(&column.name) == "Id" && self.map_type(column) == "int64";
        if !column.nullable && !is_id_pk {
            xorm.push("not null".to_string());
        }
        if column.is_primary_key {
            xorm.push("pk".to_string());
        }
        if let Some(default) = column.default.as_deref().filter(|d| !d.is_empty()) {
            xorm.push(format!("default {}", default));
        }
        if column.is_auto_increment {
            xorm.push("autoincr".to_string());
        }
        if let Some(comment) = column.comment.as_deref().filter(|c| !c.is_empty()) {
            xorm.push(format!("comment('{}')", tag_comment(comment)));
        }

        let mut index_names: Vec<&String> = column.indexes.iter().collect();
        index_names.sort();
        for name in index_names {
            if let Some(index) = table.index(name) {
                let mut entry = match index.kind {
                    IndexKind::Unique => "unique".to_string(),
                    IndexKind::Index => "index".to_string(),
                };
                if index.columns.len() > 1 {
                    entry.push_str(&format!("({})", index.name));
                }
                xorm.push(entry);
            }
        }

        if let Some(role) = config.audit_role(&column.name) {
            xorm.push(role.as_str().to_string());
        }

        xorm.push(column.sql_type.declaration());

        let mut tags = Vec::new();
        if config.gen_json {
            if config.is_json_ignored(&column.name) {
                tags.push("json:\"-\"".to_string());
            } else {
                tags.push(format!("json:\"{}\"", column.name));
            }
        }
        tags.push(format!("xorm:\"{}\"", xorm.join(" ")));

        format!("`{}`", tags.join(" "))
    }

    fn compute_imports(&self, tables: &[Table]) -> BTreeSet<String> {
        let mut imports = BTreeSet::new();
        for column in tables.iter().flat_map(|t| t.columns()) {
            if self.map_type(column) == TIME_TYPE {
                imports.insert("time".to_string());
            }
        }
        imports
    }

    fn formatter(&self) -> Option<&dyn SourceFormatter> {
        Some(&self.formatter)
    }
}

/// Column comment as it may appear inside `comment('...')`.
///
/// Quotes and backticks would end the xorm value or the raw struct tag, and
/// control whitespace would split the tag across lines.
fn tag_comment(comment: &str) -> String {
    comment
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '`'))
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
