//! # dbreverse: database schema to source code
//!
//! dbreverse reads table metadata from a live database (or a JSON snapshot)
//! and renders it through templates into model source files for Go, C++ or
//! Rust.
//!
//! ## Features
//!
//! - **Metadata sources**: Diesel-backed introspection for MySQL, PostgreSQL
//!   and SQLite (cargo features `mysql`, `postgres`, `sqlite`), plus JSON
//!   snapshots that need no database at all
//! - **Language profiles**: identifier casing, type mapping, struct tags,
//!   imports and formatting per target language
//! - **Tera templates**: built-in templates per language, or a directory of
//!   your own with a colocated `config` file
//! - **Run files**: a `reverse.yml` describing several targets over one
//!   database
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbreverse::codegen::{generate, GenerateOptions, Layout};
//! use dbreverse::source::SnapshotSource;
//!
//! let mut source = SnapshotSource::new("schema.json");
//! let options = GenerateOptions::new("out")
//!     .with_language("go")
//!     .with_package_name("models")
//!     .with_layout(Layout::PerTable);
//!
//! let report = generate(&mut source, &options).unwrap();
//! println!("wrote {} files", report.files_written());
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod lang;
pub mod schema;
pub mod source;

pub use codegen::{generate, generate_from_tables, GenerateOptions, GenerationReport, Layout};
pub use config::{TagConfig, TemplateConfig};
pub use error::{FormatError, Result, ReverseError, UnitError};
pub use lang::{lookup, LanguageProfile};
pub use schema::{Column, Index, IndexKind, SqlType, Table};
pub use source::{Driver, MetadataSource};
