//! Live schema introspection through Diesel.
//!
//! Each backend runs two raw queries, one for columns and one for secondary
//! indexes, shaped into the same row types so [`assemble`] can build tables
//! the same way for every database. Flags come back as integers because
//! the backends disagree on boolean result types.

use diesel::prelude::*;
use diesel::query_builder::SqlQuery;
use diesel::query_dsl::LoadQuery;
use diesel::sql_types::{BigInt, Nullable, Text};
use indexmap::IndexMap;

use super::{Driver, MetadataSource};
use crate::error::{error_chain, ReverseError, Result};
use crate::schema::{Column, Index, IndexKind, SqlType, Table};

#[derive(Debug, Clone, QueryableByName)]
pub(crate) struct ColumnRow {
    #[diesel(sql_type = Text)]
    pub table_name: String,
    #[diesel(sql_type = Text)]
    pub column_name: String,
    #[diesel(sql_type = Text)]
    pub data_type: String,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub length: Option<i64>,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub scale: Option<i64>,
    #[diesel(sql_type = BigInt)]
    pub is_nullable: i64,
    #[diesel(sql_type = Nullable<Text>)]
    pub column_default: Option<String>,
    #[diesel(sql_type = BigInt)]
    pub is_primary: i64,
    #[diesel(sql_type = BigInt)]
    pub is_auto_increment: i64,
    #[diesel(sql_type = Nullable<Text>)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, QueryableByName)]
pub(crate) struct IndexRow {
    #[diesel(sql_type = Text)]
    pub table_name: String,
    #[diesel(sql_type = Text)]
    pub index_name: String,
    #[diesel(sql_type = Text)]
    pub column_name: String,
    #[diesel(sql_type = BigInt)]
    pub is_unique: i64,
}

/// Introspection SQL for one backend
pub(crate) struct Queries {
    columns: &'static str,
    indexes: &'static str,
}

#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
const POSTGRES_QUERIES: Queries = Queries {
    columns: r#"
SELECT c.table_name::text AS table_name,
       c.column_name::text AS column_name,
       (CASE WHEN c.data_type IN ('USER-DEFINED', 'ARRAY') THEN c.udt_name ELSE c.data_type END)::text AS data_type,
       (CASE WHEN c.data_type IN ('numeric', 'decimal') THEN c.numeric_precision
             ELSE c.character_maximum_length END)::bigint AS length,
       (CASE WHEN c.data_type IN ('numeric', 'decimal') THEN c.numeric_scale END)::bigint AS scale,
       (c.is_nullable = 'YES')::int::bigint AS is_nullable,
       c.column_default::text AS column_default,
       EXISTS (
           SELECT 1
           FROM information_schema.table_constraints tc
           JOIN information_schema.key_column_usage kcu
             ON kcu.constraint_name = tc.constraint_name
            AND kcu.table_schema = tc.table_schema
            AND kcu.table_name = tc.table_name
           WHERE tc.constraint_type = 'PRIMARY KEY'
             AND tc.table_schema = c.table_schema
             AND tc.table_name = c.table_name
             AND kcu.column_name = c.column_name
       )::int::bigint AS is_primary,
       (COALESCE(c.column_default, '') LIKE 'nextval(%' OR c.is_identity = 'YES')::int::bigint AS is_auto_increment,
       pg_catalog.col_description(
           (quote_ident(c.table_schema) || '.' || quote_ident(c.table_name))::regclass,
           c.ordinal_position::int
       )::text AS comment
FROM information_schema.columns c
JOIN information_schema.tables t
  ON t.table_schema = c.table_schema AND t.table_name = c.table_name
WHERE c.table_schema = current_schema() AND t.table_type = 'BASE TABLE'
ORDER BY c.table_name, c.ordinal_position
"#,
    indexes: r#"
SELECT t.relname::text AS table_name,
       i.relname::text AS index_name,
       a.attname::text AS column_name,
       ix.indisunique::int::bigint AS is_unique
FROM pg_catalog.pg_index ix
JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
WHERE n.nspname = current_schema() AND t.relkind = 'r' AND NOT ix.indisprimary
ORDER BY t.relname, i.relname, array_position(ix.indkey::int2[], a.attnum)
"#,
};

#[cfg_attr(not(feature = "mysql"), allow(dead_code))]
const MYSQL_QUERIES: Queries = Queries {
    columns: r#"
SELECT c.TABLE_NAME AS table_name,
       c.COLUMN_NAME AS column_name,
       c.DATA_TYPE AS data_type,
       CAST(CASE WHEN c.DATA_TYPE IN ('decimal', 'numeric') THEN c.NUMERIC_PRECISION
                 ELSE c.CHARACTER_MAXIMUM_LENGTH END AS SIGNED) AS length,
       CAST(CASE WHEN c.DATA_TYPE IN ('decimal', 'numeric') THEN c.NUMERIC_SCALE END AS SIGNED) AS scale,
       CAST(c.IS_NULLABLE = 'YES' AS SIGNED) AS is_nullable,
       c.COLUMN_DEFAULT AS column_default,
       CAST(c.COLUMN_KEY = 'PRI' AS SIGNED) AS is_primary,
       CAST(c.EXTRA LIKE '%auto_increment%' AS SIGNED) AS is_auto_increment,
       NULLIF(c.COLUMN_COMMENT, '') AS comment
FROM information_schema.COLUMNS c
JOIN information_schema.TABLES t
  ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
WHERE c.TABLE_SCHEMA = DATABASE() AND t.TABLE_TYPE = 'BASE TABLE'
ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
"#,
    indexes: r#"
SELECT TABLE_NAME AS table_name,
       INDEX_NAME AS index_name,
       COLUMN_NAME AS column_name,
       CAST(NON_UNIQUE = 0 AS SIGNED) AS is_unique
FROM information_schema.STATISTICS
WHERE TABLE_SCHEMA = DATABASE() AND INDEX_NAME <> 'PRIMARY'
ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX
"#,
};

#[cfg_attr(not(feature = "sqlite"), allow(dead_code))]
const SQLITE_QUERIES: Queries = Queries {
    columns: r#"
SELECT m.name AS table_name,
       p.name AS column_name,
       p.type AS data_type,
       NULL AS length,
       NULL AS scale,
       CAST(p."notnull" = 0 AS INTEGER) AS is_nullable,
       p.dflt_value AS column_default,
       CAST(p.pk > 0 AS INTEGER) AS is_primary,
       CAST(p.pk > 0 AND upper(p.type) = 'INTEGER' AS INTEGER) AS is_auto_increment,
       NULL AS comment
FROM sqlite_master m
JOIN pragma_table_info(m.name) p
WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'
ORDER BY m.rowid, p.cid
"#,
    indexes: r#"
SELECT m.name AS table_name,
       il.name AS index_name,
       ii.name AS column_name,
       CAST(il."unique" AS INTEGER) AS is_unique
FROM sqlite_master m
JOIN pragma_index_list(m.name) il
JOIN pragma_index_info(il.name) ii
WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%' AND il.origin <> 'pk'
ORDER BY m.rowid, il.name, ii.seqno
"#,
};

/// Metadata source over an established Diesel connection
#[cfg_attr(
    not(any(feature = "postgres", feature = "mysql", feature = "sqlite")),
    allow(dead_code)
)]
pub(crate) struct DieselSource<C> {
    conn: C,
    driver: Driver,
    queries: &'static Queries,
}

#[cfg_attr(
    not(any(feature = "postgres", feature = "mysql", feature = "sqlite")),
    allow(dead_code)
)]
impl<C: Connection> DieselSource<C> {
    fn connect(driver: Driver, dsn: &str, queries: &'static Queries) -> Result<Self> {
        let conn = C::establish(dsn).map_err(|e| ReverseError::Connection {
            driver: driver.to_string(),
            message: error_chain(&e),
        })?;
        tracing::info!("Connected to {} database", driver);
        Ok(Self {
            conn,
            driver,
            queries,
        })
    }
}

impl<C> MetadataSource for DieselSource<C>
where
    C: Connection,
    for<'a> SqlQuery: LoadQuery<'a, C, ColumnRow> + LoadQuery<'a, C, IndexRow>,
{
    fn tables(&mut self) -> Result<Vec<Table>> {
        let columns = diesel::sql_query(self.queries.columns)
            .load::<ColumnRow>(&mut self.conn)
            .map_err(|e| ReverseError::Metadata(format!("column query failed: {}", error_chain(&e))))?;

        let indexes = diesel::sql_query(self.queries.indexes)
            .load::<IndexRow>(&mut self.conn)
            .map_err(|e| ReverseError::Metadata(format!("index query failed: {}", error_chain(&e))))?;

        tracing::debug!(
            "Introspected {} columns and {} index entries from {}",
            columns.len(),
            indexes.len(),
            self.driver
        );
        assemble(columns, indexes)
    }
}

/// Open a live database source for `driver`
pub fn open(driver: Driver, dsn: &str) -> Result<Box<dyn MetadataSource>> {
    match driver {
        #[cfg(feature = "postgres")]
        Driver::Postgres => Ok(Box::new(DieselSource::<diesel::pg::PgConnection>::connect(
            driver,
            dsn,
            &POSTGRES_QUERIES,
        )?)),
        #[cfg(feature = "mysql")]
        Driver::Mysql => Ok(Box::new(DieselSource::<diesel::mysql::MysqlConnection>::connect(
            driver,
            dsn,
            &MYSQL_QUERIES,
        )?)),
        #[cfg(feature = "sqlite")]
        Driver::Sqlite => Ok(Box::new(DieselSource::<diesel::sqlite::SqliteConnection>::connect(
            driver,
            dsn,
            &SQLITE_QUERIES,
        )?)),
        Driver::Json => Err(ReverseError::Metadata(
            "json snapshots are not a live database".to_string(),
        )),
        #[allow(unreachable_patterns)]
        other => Err(ReverseError::DriverNotCompiled {
            driver: other.to_string(),
            feature: other.feature().unwrap_or_default().to_string(),
        }),
    }
}

/// Group introspection rows into tables, keeping row order
pub(crate) fn assemble(columns: Vec<ColumnRow>, indexes: Vec<IndexRow>) -> Result<Vec<Table>> {
    let mut tables: IndexMap<String, Table> = IndexMap::new();

    for row in columns {
        let table = tables
            .entry(row.table_name.clone())
            .or_insert_with(|| Table::new(row.table_name.clone()));

        let auto_increment = row.is_auto_increment != 0;
        let column = Column {
            name: row.column_name,
            sql_type: SqlType {
                name: row.data_type,
                length: row.length.filter(|l| *l > 0),
                length2: row.scale,
            },
            nullable: row.is_nullable != 0,
            is_primary_key: row.is_primary != 0,
            is_auto_increment: auto_increment,
            // Sequence defaults are implied by auto-increment
            default: if auto_increment { None } else { row.column_default },
            comment: row.comment.filter(|c| !c.is_empty()),
            indexes: Vec::new(),
        };

        if let Err(duplicate) = table.add_column(column) {
            return Err(ReverseError::Metadata(format!(
                "column '{}' reported twice for table '{}'",
                duplicate.name, table.name
            )));
        }
    }

    let mut grouped: IndexMap<(String, String), Index> = IndexMap::new();
    for row in indexes {
        let kind = if row.is_unique != 0 {
            IndexKind::Unique
        } else {
            IndexKind::Index
        };
        grouped
            .entry((row.table_name, row.index_name.clone()))
            .or_insert_with(|| Index {
                name: row.index_name,
                kind,
                columns: Vec::new(),
            })
            .columns
            .push(row.column_name);
    }

    for ((table_name, _), index) in grouped {
        if let Some(table) = tables.get_mut(&table_name) {
            table.add_index(index);
        }
    }

    Ok(tables.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_row(table: &str, column: &str, data_type: &str) -> ColumnRow {
        ColumnRow {
            table_name: table.to_string(),
            column_name: column.to_string(),
            data_type: data_type.to_string(),
            length: None,
            scale: None,
            is_nullable: 0,
            column_default: None,
            is_primary: 0,
            is_auto_increment: 0,
            comment: None,
        }
    }

    #[test]
    fn test_assemble_groups_rows_in_order() {
        let mut id = column_row("users", "id", "bigint");
        id.is_primary = 1;
        id.is_auto_increment = 1;
        id.column_default = Some("nextval('users_id_seq'::regclass)".to_string());
        let mut email = column_row("users", "email", "character varying");
        email.length = Some(255);
        email.comment = Some(String::new());
        let total = ColumnRow {
            length: Some(10),
            scale: Some(2),
            is_nullable: 1,
            ..column_row("orders", "total", "numeric")
        };

        let indexes = vec![
            IndexRow {
                table_name: "users".to_string(),
                index_name: "uq_users_email".to_string(),
                column_name: "email".to_string(),
                is_unique: 1,
            },
            IndexRow {
                table_name: "ghost".to_string(),
                index_name: "idx_ghost".to_string(),
                column_name: "x".to_string(),
                is_unique: 0,
            },
        ];

        let tables = assemble(vec![id, email, total], indexes).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "users");
        assert_eq!(tables[0].columns_seq(), vec!["id", "email"]);

        let id = tables[0].column("id").unwrap();
        assert!(id.is_primary_key && id.is_auto_increment);
        assert_eq!(id.default, None);

        let email = tables[0].column("email").unwrap();
        assert_eq!(email.sql_type.length, Some(255));
        assert_eq!(email.comment, None);
        assert_eq!(email.indexes, vec!["uq_users_email"]);

        let total = tables[1].column("total").unwrap();
        assert!(total.nullable);
        assert_eq!(total.sql_type.declaration(), "NUMERIC(10,2)");
    }

    #[test]
    fn test_assemble_rejects_duplicate_columns() {
        let rows = vec![column_row("t", "a", "int"), column_row("t", "a", "int")];
        assert!(matches!(assemble(rows, vec![]), Err(ReverseError::Metadata(_))));
    }

    #[cfg(not(feature = "postgres"))]
    #[test]
    fn test_missing_backend_reports_feature() {
        match open(Driver::Postgres, "postgres://localhost/db") {
            Err(ReverseError::DriverNotCompiled { feature, .. }) => assert_eq!(feature, "postgres"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("postgres backend should not be compiled in"),
        }
    }
}
