//! Rust profile producing serde-ready structs.

use std::collections::BTreeSet;

use super::format::{RustFormatter, SourceFormatter};
use super::kind::SqlKind;
use super::LanguageProfile;
use crate::codegen::utils::{escape_rust_keyword, escape_rust_string, is_lower_snake, to_pascal_case, to_snake_case};
use crate::config::TagConfig;
use crate::schema::{Column, Table};

#[derive(Debug, Default)]
pub struct RustProfile {
    formatter: RustFormatter,
}

impl RustProfile {
    /// Base type and the `use` path it needs, if any
    fn type_for_kind(kind: SqlKind) -> Option<(&'static str, &'static [&'static str])> {
        let mapped: (&'static str, &'static [&'static str]) = match kind {
            SqlKind::Bool => ("bool", &[]),
            SqlKind::Int => ("i32", &[]),
            SqlKind::BigInt => ("i64", &[]),
            SqlKind::Float => ("f32", &[]),
            SqlKind::Double => ("f64", &[]),
            SqlKind::Decimal | SqlKind::Text | SqlKind::Json | SqlKind::Uuid => ("String", &[]),
            SqlKind::Bytes => ("Vec<u8>", &[]),
            SqlKind::Date => ("NaiveDate", &["chrono::NaiveDate"]),
            SqlKind::Time => ("NaiveTime", &["chrono::NaiveTime"]),
            SqlKind::DateTime => ("NaiveDateTime", &["chrono::NaiveDateTime"]),
            SqlKind::TimestampTz => ("DateTime<Utc>", &["chrono::DateTime", "chrono::Utc"]),
            SqlKind::Unknown => return None,
        };
        Some(mapped)
    }
}

impl LanguageProfile for RustProfile {
    fn key(&self) -> &'static str {
        "rust"
    }

    fn extension(&self) -> &'static str {
        ".rs"
    }

    fn default_template(&self) -> &'static str {
        "rust"
    }

    fn map_identifier(&self, raw: &str) -> String {
        to_pascal_case(raw)
    }

    fn map_field(&self, raw: &str) -> String {
        // Keep already-snake names verbatim so `address2` does not become `address_2`
        let snake = if is_lower_snake(raw) {
            raw.to_string()
        } else {
            to_snake_case(raw)
        };
        escape_rust_keyword(&snake)
    }

    fn map_type(&self, column: &Column) -> String {
        let base = Self::type_for_kind(SqlKind::classify(&column.sql_type))
            .map(|(ty, _)| ty)
            .unwrap_or(self.fallback_type());
        if column.nullable {
            format!("Option<{}>", base)
        } else {
            base.to_string()
        }
    }

    fn fallback_type(&self) -> &'static str {
        "String"
    }

    fn generate_tag(&self, _table: &Table, column: &Column, config: &TagConfig) -> String {
        let mut lines = Vec::new();

        if let Some(comment) = column.comment.as_deref().filter(|c| !c.is_empty()) {
            for line in comment.lines() {
                lines.push(format!("/// {}", line.trim()));
            }
        }

        if config.gen_json {
            if config.is_json_ignored(&column.name) {
                lines.push("#[serde(skip)]".to_string());
            } else if self.map_field(&column.name) != column.name {
                lines.push(format!(
                    "#[serde(rename = \"{}\")]",
                    escape_rust_string(&column.name)
                ));
            }
        }

        lines.join("\n")
    }

    fn compute_imports(&self, tables: &[Table]) -> BTreeSet<String> {
        tables
            .iter()
            .flat_map(|t| t.columns())
            .filter_map(|c| Self::type_for_kind(SqlKind::classify(&c.sql_type)))
            .flat_map(|(_, paths)| paths.iter())
            .map(|p| p.to_string())
            .collect()
    }

    fn formatter(&self) -> Option<&dyn SourceFormatter> {
        Some(&self.formatter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SqlType;

    #[test]
    fn test_field_names() {
        let rust = RustProfile::default();
        assert_eq!(rust.map_field("address2"), "address2");
        assert_eq!(rust.map_field("userId"), "user_id");
        assert_eq!(rust.map_field("type"), "r#type");
        assert_eq!(rust.map_identifier("order_items"), "OrderItems");
    }

    #[test]
    fn test_nullable_wraps_option() {
        let rust = RustProfile::default();
        let column = Column::new("deleted_at", SqlType::new("timestamptz")).nullable();
        assert_eq!(rust.map_type(&column), "Option<DateTime<Utc>>");
        let unknown = Column::new("area", SqlType::new("polygon"));
        assert_eq!(rust.map_type(&unknown), "String");
    }

    #[test]
    fn test_imports_collect_chrono_paths() {
        let rust = RustProfile::default();
        let table = Table::new("events")
            .with_column(Column::new("day", SqlType::new("date")))
            .with_column(Column::new("at", SqlType::new("timestamp with time zone")));
        let imports: Vec<String> = rust.compute_imports(&[table]).into_iter().collect();
        assert_eq!(
            imports,
            vec!["chrono::DateTime", "chrono::NaiveDate", "chrono::Utc"]
        );
    }

    #[test]
    fn test_tag_with_comment_and_rename() {
        let rust = RustProfile::default();
        let table = Table::new("t");
        let column = Column::new("userId", SqlType::new("int")).with_comment("owner");
        let config = TagConfig {
            gen_json: true,
            ..TagConfig::default()
        };
        assert_eq!(
            rust.generate_tag(&table, &column, &config),
            "/// owner\n#[serde(rename = \"userId\")]"
        );
        assert_eq!(
            rust.generate_tag(&table, &column, &TagConfig::default()),
            "/// owner"
        );
    }
}
