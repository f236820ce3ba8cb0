//! In-memory and JSON snapshot metadata sources.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::MetadataSource;
use crate::error::{ReverseError, Result};
use crate::schema::Table;

/// On-disk snapshot format written by `dbreverse inspect`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    pub tables: Vec<Table>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReverseError::Metadata(format!("failed to serialize snapshot: {}", e)))
    }
}

/// Reads tables from a JSON snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl MetadataSource for SnapshotSource {
    fn tables(&mut self) -> Result<Vec<Table>> {
        let contents = fs::read_to_string(&self.path).map_err(|e| ReverseError::Connection {
            driver: "json".to_string(),
            message: format!("cannot read {}: {}", self.path.display(), e),
        })?;

        let snapshot: Snapshot = serde_json::from_str(&contents).map_err(|e| {
            ReverseError::Metadata(format!("invalid snapshot {}: {}", self.path.display(), e))
        })?;

        tracing::debug!(
            "Loaded {} tables from snapshot {}",
            snapshot.tables.len(),
            self.path.display()
        );
        Ok(snapshot.tables)
    }
}

/// Serves a fixed table list; useful for tests and library callers
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    tables: Vec<Table>,
}

impl StaticSource {
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables }
    }
}

impl MetadataSource for StaticSource {
    fn tables(&mut self) -> Result<Vec<Table>> {
        Ok(self.tables.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, SqlType};

    #[test]
    fn test_snapshot_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        let snapshot = Snapshot {
            driver: Some("mysql".to_string()),
            tables: vec![
                Table::new("users").with_column(Column::new("id", SqlType::new("int")).primary_key()),
                Table::new("orders").with_column(Column::new("id", SqlType::new("int"))),
            ],
        };
        std::fs::write(&path, snapshot.to_json().unwrap()).unwrap();

        let tables = SnapshotSource::new(&path).tables().unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users", "orders"]);
        assert!(tables[0].column("id").unwrap().is_primary_key);
    }

    #[test]
    fn test_missing_snapshot_is_connection_error() {
        let err = SnapshotSource::new("/nonexistent/dbreverse/schema.json")
            .tables()
            .unwrap_err();
        assert!(matches!(err, ReverseError::Connection { .. }));
    }

    #[test]
    fn test_malformed_snapshot_is_metadata_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"tables\": 3}").unwrap();
        let err = SnapshotSource::new(&path).tables().unwrap_err();
        assert!(matches!(err, ReverseError::Metadata(_)));
    }
}
