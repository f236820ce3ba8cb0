//! Dialect-neutral classification of raw column types.

use crate::schema::SqlType;

/// Family of a raw database type, shared by every language profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlKind {
    Bool,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Text,
    Json,
    Uuid,
    Bytes,
    Date,
    Time,
    DateTime,
    TimestampTz,
    /// Not recognized; profiles fall back to their default type
    Unknown,
}

impl SqlKind {
    /// Classify a raw type name such as `varchar(32)`, `int unsigned` or
    /// `timestamp with time zone`
    pub fn classify(sql_type: &SqlType) -> SqlKind {
        Self::classify_name(&sql_type.name)
    }

    pub fn classify_name(raw: &str) -> SqlKind {
        let upper = raw.to_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();
        let base = base
            .trim_end_matches(" ZEROFILL")
            .trim_end_matches(" UNSIGNED")
            .trim_end_matches(" SIGNED")
            .trim();

        match base {
            "BOOL" | "BOOLEAN" => SqlKind::Bool,
            "BIT" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "SERIAL"
            | "SMALLSERIAL" | "INT2" | "INT4" | "YEAR" => SqlKind::Int,
            "BIGINT" | "BIGSERIAL" | "INT8" => SqlKind::BigInt,
            "FLOAT" | "REAL" | "FLOAT4" => SqlKind::Float,
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => SqlKind::Double,
            "DECIMAL" | "NUMERIC" | "MONEY" | "SMALLMONEY" => SqlKind::Decimal,
            "CHAR" | "VARCHAR" | "NCHAR" | "NVARCHAR" | "CHARACTER" | "CHARACTER VARYING"
            | "TINYTEXT" | "TEXT" | "NTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET"
            | "CLOB" | "CITEXT" | "SYSNAME" | "BPCHAR" => SqlKind::Text,
            "JSON" | "JSONB" => SqlKind::Json,
            "UUID" | "UNIQUEIDENTIFIER" => SqlKind::Uuid,
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BYTEA"
            | "IMAGE" => SqlKind::Bytes,
            "DATE" => SqlKind::Date,
            "TIME" | "TIME WITHOUT TIME ZONE" | "TIMETZ" | "TIME WITH TIME ZONE" => SqlKind::Time,
            "DATETIME" | "DATETIME2" | "SMALLDATETIME" | "TIMESTAMP"
            | "TIMESTAMP WITHOUT TIME ZONE" => SqlKind::DateTime,
            "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" | "DATETIMEOFFSET" => SqlKind::TimestampTz,
            _ => SqlKind::Unknown,
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlKind::Date | SqlKind::Time | SqlKind::DateTime | SqlKind::TimestampTz
        )
    }
}
