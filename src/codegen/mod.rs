//! Template-driven source generation.
//!
//! Templates are discovered by [`templates`], compiled and executed by
//! [`engine`], written by [`writer`], and sequenced by [`orchestration`].
//! [`project_config`] reads YAML run files that drive several runs at once.

pub mod engine;
pub mod fs_utils;
pub mod orchestration;
pub mod project_config;
pub mod templates;
pub mod utils;
pub mod writer;

pub use engine::{RenderContext, TemplateEngine};
pub use orchestration::{
    filter_tables, generate, generate_from_tables, plan_units, strip_prefix, strip_table_prefix,
    GenerateOptions, GenerationReport, Layout, Pipeline, RenderUnit, Stage, UnitOutcome,
};
pub use project_config::{execute, execute_file, RunFile, SourceSpec, TargetSpec};
pub use templates::{builtin, builtin_names, load_templates, TemplateSet, TemplateSource};
pub use writer::{OutputWriter, Written};
