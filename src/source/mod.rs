//! Schema metadata sources.
//!
//! A source yields the database's tables in a stable, driver-defined order.
//! Live databases are introspected through Diesel (one backend per cargo
//! feature); the `json` driver reads a snapshot produced by `dbreverse inspect`.

pub mod introspect;
pub mod snapshot;

use std::fmt;

use crate::error::{ReverseError, Result};
use crate::schema::Table;

pub use snapshot::{SnapshotSource, StaticSource};

/// Anything that can list a database's tables
pub trait MetadataSource {
    fn tables(&mut self) -> Result<Vec<Table>>;
}

/// Supported database kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Mysql,
    Postgres,
    Sqlite,
    /// JSON snapshot file; the DSN is its path
    Json,
}

impl Driver {
    /// Parse a driver key, accepting the common aliases
    pub fn parse(key: &str) -> Result<Driver> {
        match key.trim().to_lowercase().as_str() {
            "mysql" | "mymysql" | "mariadb" => Ok(Driver::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            "sqlite3" | "sqlite" => Ok(Driver::Sqlite),
            "json" | "snapshot" => Ok(Driver::Json),
            _ => Err(ReverseError::UnsupportedDriver(key.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Mysql => "mysql",
            Driver::Postgres => "postgres",
            Driver::Sqlite => "sqlite3",
            Driver::Json => "json",
        }
    }

    /// Cargo feature that compiles this driver's backend, if any
    pub fn feature(&self) -> Option<&'static str> {
        match self {
            Driver::Mysql => Some("mysql"),
            Driver::Postgres => Some("postgres"),
            Driver::Sqlite => Some("sqlite"),
            Driver::Json => None,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open a metadata source for `driver` and `dsn`
pub fn open(driver: Driver, dsn: &str) -> Result<Box<dyn MetadataSource>> {
    match driver {
        Driver::Json => Ok(Box::new(SnapshotSource::new(dsn))),
        _ => introspect::open(driver, dsn),
    }
}
