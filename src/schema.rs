//! Table and column descriptors produced by a metadata source.
//!
//! A [`Table`] keeps its columns in declaration order; that order is the
//! order fields appear in generated code.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Raw database type of a column, e.g. `VARCHAR(255)` or `DECIMAL(10,2)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length2: Option<i64>,
}

impl SqlType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            length: None,
            length2: None,
        }
    }

    pub fn with_length(mut self, length: i64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: i64, scale: i64) -> Self {
        self.length = Some(precision);
        self.length2 = Some(scale);
        self
    }

    /// Upper-cased type name with its size suffix, e.g. `VARCHAR(64)`
    pub fn declaration(&self) -> String {
        let name = self.name.to_uppercase();
        match (self.length, self.length2) {
            (Some(len), Some(len2)) if len > 0 => format!("{}({},{})", name, len, len2),
            (Some(len), _) if len > 0 => format!("{}({})", name, len),
            _ => name,
        }
    }
}

/// One column of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Names of the indexes this column participates in
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: false,
            is_primary_key: false,
            is_auto_increment: false,
            default: None,
            comment: None,
            indexes: Vec::new(),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Kind of a secondary index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Unique,
    Index,
}

/// A named index over one or more columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub kind: IndexKind,
    pub columns: Vec<String>,
}

/// A table with its columns in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    columns: IndexMap<String, Column>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    indexes: IndexMap<String, Index>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
            indexes: IndexMap::new(),
            comment: None,
        }
    }

    /// Append a column, returning `Err` with the column if the name is taken
    pub fn add_column(&mut self, column: Column) -> Result<(), Column> {
        if self.columns.contains_key(&column.name) {
            return Err(column);
        }
        self.columns.insert(column.name.clone(), column);
        Ok(())
    }

    /// Builder form of [`Table::add_column`]; later duplicates are dropped
    pub fn with_column(mut self, column: Column) -> Self {
        let _ = self.add_column(column);
        self
    }

    /// Register an index and record it on each member column
    pub fn add_index(&mut self, index: Index) {
        for column_name in &index.columns {
            if let Some(column) = self.columns.get_mut(column_name) {
                if !column.indexes.contains(&index.name) {
                    column.indexes.push(index.name.clone());
                }
            }
        }
        self.indexes.insert(index.name.clone(), index);
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.add_index(index);
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Columns in declaration order
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Column names in declaration order
    pub fn columns_seq(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    pub fn primary_keys(&self) -> Vec<&str> {
        self.columns
            .values()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// A copy of this table under a different name
    pub fn renamed(&self, name: impl Into<String>) -> Table {
        Table {
            name: name.into(),
            ..self.clone()
        }
    }
}
