//! C++ profile producing plain header classes.

use std::collections::BTreeSet;

use super::kind::SqlKind;
use super::LanguageProfile;
use crate::codegen::utils::to_pascal_case;
use crate::config::TagConfig;
use crate::schema::{Column, Table};

#[derive(Debug, Default)]
pub struct CppProfile;

impl CppProfile {
    fn type_for_kind(kind: SqlKind) -> Option<&'static str> {
        let ty = match kind {
            SqlKind::Bool => "bool",
            SqlKind::Int => "int",
            SqlKind::BigInt => "int64_t",
            SqlKind::Float => "float",
            SqlKind::Double => "double",
            SqlKind::Decimal | SqlKind::Text | SqlKind::Json | SqlKind::Uuid | SqlKind::Bytes => {
                "std::string"
            }
            SqlKind::Date | SqlKind::Time | SqlKind::DateTime | SqlKind::TimestampTz => "time_t",
            SqlKind::Unknown => return None,
        };
        Some(ty)
    }

    fn header_for(ty: &str) -> Option<&'static str> {
        match ty {
            "std::string" => Some("<string>"),
            "time_t" => Some("<ctime>"),
            "int64_t" => Some("<cstdint>"),
            _ => None,
        }
    }
}

impl LanguageProfile for CppProfile {
    fn key(&self) -> &'static str {
        "c++"
    }

    fn extension(&self) -> &'static str {
        ".h"
    }

    fn default_template(&self) -> &'static str {
        "cpp"
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
        "std::string"
    }

    fn generate_tag(&self, _table: &Table, _column: &Column, _config: &TagConfig) -> String {
        String::new()
    }

    fn compute_imports(&self, tables: &[Table]) -> BTreeSet<String> {
        tables
            .iter()
            .flat_map(|t| t.columns())
            .filter_map(|c| Self::header_for(&self.map_type(c)))
            .map(String::from)
            .collect()
    }
}
