//! High-level orchestration of a reverse run.
//!
//! A run moves through [`Stage`]s in order:
//!
//! 1. `Init`: resolve the template `config` file, the language profile and
//!    the table filter
//! 2. `MetadataLoaded`: read tables from the metadata source
//! 3. `Filtered`: keep matching tables and strip the name prefix
//! 4. `TemplatesLoaded`: load and compile templates
//! 5. `Rendering`: render every template against every unit and write it
//! 6. `Done`
//!
//! Any fatal error moves the run to `Failed`. Per-unit failures are
//! collected into the [`GenerationReport`] and never stop the loop.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use super::engine::{RenderContext, TemplateEngine};
use super::templates::{load_templates, template_qualifier, TemplateSource};
use super::writer::{OutputWriter, Written};
use crate::config::{TagConfig, TemplateConfig};
use crate::error::{FormatError, ReverseError, Result, UnitError};
use crate::lang::{self, IdentifierCollision, LanguageProfile, UnknownType};
use crate::schema::Table;
use crate::source::MetadataSource;

/// Language used when neither the caller nor the template config names one
pub const DEFAULT_LANGUAGE: &str = "go";

/// Package name used when none is given
pub const DEFAULT_PACKAGE: &str = "models";

/// How tables are spread over output files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// One file per table
    #[default]
    PerTable,
    /// One file holding every table
    Concentrated,
}

/// Progress of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    MetadataLoaded,
    Filtered,
    TemplatesLoaded,
    Rendering,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::MetadataLoaded => "metadata-loaded",
            Stage::Filtered => "filtered",
            Stage::TemplatesLoaded => "templates-loaded",
            Stage::Rendering => "rendering",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Inputs of one generation run
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Directory of template files; takes precedence over `template`
    pub template_dir: Option<PathBuf>,

    /// Built-in template name; the language's default when unset
    pub template: Option<String>,

    /// Parent of the package directory files are written into
    pub output_dir: PathBuf,

    /// Package/module name; also the output subdirectory name
    pub package_name: String,

    pub layout: Layout,

    /// Regular expression a table name must match to be generated
    pub table_filter: Option<String>,

    /// Explicit settings. Each value set here wins over the template
    /// directory's `config` file.
    pub overrides: TemplateConfig,
}

impl GenerateOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: None,
            template: None,
            output_dir: output_dir.into(),
            package_name: DEFAULT_PACKAGE.to_string(),
            layout: Layout::default(),
            table_filter: None,
            overrides: TemplateConfig::default(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.overrides.lang = Some(language.into());
        self
    }

    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    pub fn with_template(mut self, name: impl Into<String>) -> Self {
        self.template = Some(name.into());
        self
    }

    pub fn with_package_name(mut self, name: impl Into<String>) -> Self {
        self.package_name = name.into();
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_table_filter(mut self, pattern: impl Into<String>) -> Self {
        self.table_filter = Some(pattern.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.overrides.prefix = Some(prefix.into());
        self
    }

    /// Directory generated files land in
    pub fn package_dir(&self) -> PathBuf {
        self.output_dir.join(&self.package_name)
    }

    fn template_dir(&self) -> Option<&Path> {
        self.template_dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}

/// One destination file and the data rendered into it
#[derive(Debug, Clone, PartialEq)]
pub struct RenderUnit {
    /// File name before qualifier and extension: a table or the package
    pub name: String,
    pub path: PathBuf,
    pub context: RenderContext,
}

/// Result of one template × unit pair
#[derive(Debug)]
pub struct UnitOutcome {
    pub template: String,
    pub path: PathBuf,
    pub result: std::result::Result<Written, UnitError>,
}

/// Summary of a completed run
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub language: String,
    pub output_dir: PathBuf,
    /// Tables left after filtering
    pub tables: Vec<String>,
    pub outcomes: Vec<UnitOutcome>,
    pub unknown_types: Vec<UnknownType>,
    pub collisions: Vec<IdentifierCollision>,
}

impl GenerationReport {
    pub fn written(&self) -> impl Iterator<Item = &Written> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn files_written(&self) -> usize {
        self.written().count()
    }

    /// Units skipped because they rendered to blank text
    pub fn skipped(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Err(UnitError::EmptyOutput)))
    }

    /// Units that failed for any reason other than blank output
    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(&o.result, Err(e) if !matches!(e, UnitError::EmptyOutput)))
    }

    /// Files written unformatted because the formatter rejected them
    pub fn format_warnings(&self) -> impl Iterator<Item = (&Path, &FormatError)> {
        self.written()
            .filter_map(|w| w.format_error.as_ref().map(|e| (w.path.as_path(), e)))
    }

    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
            && self.format_warnings().next().is_none()
    }
}

/// Tables whose name matches `filter`, in their original order
pub fn filter_tables(tables: Vec<Table>, filter: &Regex) -> Vec<Table> {
    tables
        .into_iter()
        .filter(|t| filter.is_match(&t.name))
        .collect()
}

/// Strip `prefix` from the front of a table name.
///
/// Repeated prefixes are all removed, so stripping twice equals stripping
/// once. A name that would become empty is kept unchanged.
pub fn strip_prefix<'a>(name: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return name;
    }
    match name.trim_start_matches(prefix) {
        "" => name,
        stripped => stripped,
    }
}

/// Copies of `tables` with `prefix` stripped from their names
pub fn strip_table_prefix(tables: &[Table], prefix: &str) -> Vec<Table> {
    tables
        .iter()
        .map(|t| match strip_prefix(&t.name, prefix) {
            stripped if stripped == t.name => t.clone(),
            stripped => t.renamed(stripped),
        })
        .collect()
}

/// Build the render units for one template.
///
/// `qualifier` is inserted before the extension (`users.dao.go`) so several
/// templates can share an output directory.
pub fn plan_units(
    profile: &dyn LanguageProfile,
    tables: &[Table],
    layout: Layout,
    dir: &Path,
    package: &str,
    qualifier: Option<&str>,
) -> Vec<RenderUnit> {
    let path_for = |stem: &str| {
        let file_name = match qualifier {
            Some(q) => format!("{}.{}{}", stem, q, profile.extension()),
            None => format!("{}{}", stem, profile.extension()),
        };
        dir.join(file_name)
    };

    match layout {
        Layout::PerTable => tables
            .iter()
            .map(|table| RenderUnit {
                name: table.name.clone(),
                path: path_for(&table.name),
                context: RenderContext::new(profile, vec![table.clone()], package),
            })
            .collect(),
        Layout::Concentrated => vec![RenderUnit {
            name: package.to_string(),
            path: path_for(package),
            context: RenderContext::new(profile, tables.to_vec(), package),
        }],
    }
}

/// True if `name` stays a single file name when joined onto a directory
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// A configured run, ready to consume metadata
pub struct Pipeline {
    options: GenerateOptions,
    profile: Arc<dyn LanguageProfile>,
    tags: Arc<TagConfig>,
    filter: Option<Regex>,
    prefix: Option<String>,
    stage: Stage,
}

impl Pipeline {
    /// Resolve configuration, language and filter
    pub fn new(options: GenerateOptions) -> Result<Self> {
        let file_config = match options.template_dir() {
            Some(dir) => TemplateConfig::discover(dir)?.unwrap_or_default(),
            None => TemplateConfig::default(),
        };
        let settings = file_config.overlaid_with(&options.overrides);

        if !is_safe_file_name(&options.package_name) {
            return Err(ReverseError::Config(format!(
                "package name '{}' cannot be used as a directory name",
                options.package_name
            )));
        }

        let language = settings.lang.as_deref().unwrap_or(DEFAULT_LANGUAGE);
        let profile = lang::lookup(language)?;

        let filter = options
            .table_filter
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ReverseError::InvalidFilter {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()?;

        let prefix = settings.prefix.clone().filter(|p| !p.is_empty());
        let tags = TagConfig::default().merged_with(&settings);

        tracing::info!("Generating {} code into {}", profile.key(), options.package_dir().display());

        Ok(Self {
            options,
            profile,
            tags: Arc::new(tags),
            filter,
            prefix,
            stage: Stage::Init,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn profile(&self) -> &dyn LanguageProfile {
        self.profile.as_ref()
    }

    pub fn tag_config(&self) -> &TagConfig {
        &self.tags
    }

    /// Query `source` and generate from its tables
    pub fn run(&mut self, source: &mut dyn MetadataSource) -> Result<GenerationReport> {
        let tables = match source.tables() {
            Ok(tables) => tables,
            Err(e) => return Err(self.fail(e)),
        };
        self.run_with_tables(tables)
    }

    /// Generate from already-loaded tables
    pub fn run_with_tables(&mut self, tables: Vec<Table>) -> Result<GenerationReport> {
        self.advance(Stage::MetadataLoaded);
        tracing::info!("Loaded {} tables", tables.len());

        let tables = self.select_tables(tables);
        self.advance(Stage::Filtered);

        let engine = match self.load_engine() {
            Ok(engine) => engine,
            Err(e) => return Err(self.fail(e)),
        };
        self.advance(Stage::TemplatesLoaded);

        self.advance(Stage::Rendering);
        let report = self.render_all(&engine, tables);
        self.advance(Stage::Done);

        tracing::info!(
            "Generated {} files ({} skipped, {} failed)",
            report.files_written(),
            report.skipped().count(),
            report.failures().count()
        );
        Ok(report)
    }

    fn select_tables(&self, tables: Vec<Table>) -> Vec<Table> {
        let total = tables.len();
        let tables = match &self.filter {
            Some(filter) => {
                let kept = filter_tables(tables, filter);
                tracing::info!("Filter '{}' kept {} of {} tables", filter.as_str(), kept.len(), total);
                kept
            }
            None => tables,
        };

        match &self.prefix {
            Some(prefix) => strip_table_prefix(&tables, prefix),
            None => tables,
        }
    }

    fn template_source(&self) -> TemplateSource {
        match self.options.template_dir() {
            Some(dir) => {
                if let Some(name) = &self.options.template {
                    tracing::warn!("Ignoring built-in template '{}' in favor of {}", name, dir.display());
                }
                TemplateSource::Directory(dir.to_path_buf())
            }
            None => TemplateSource::Builtin(
                self.options
                    .template
                    .clone()
                    .unwrap_or_else(|| self.profile.default_template().to_string()),
            ),
        }
    }

    fn load_engine(&self) -> Result<TemplateEngine> {
        let source = self.template_source();
        let templates = load_templates(&source)?;
        if templates.is_empty() {
            let origin = match &source {
                TemplateSource::Directory(dir) => dir.display().to_string(),
                TemplateSource::Builtin(name) => name.clone(),
            };
            return Err(ReverseError::EmptyTemplateSet(origin));
        }
        tracing::info!("Loaded {} templates", templates.len());
        TemplateEngine::compile(Arc::clone(&self.profile), Arc::clone(&self.tags), &templates)
    }

    fn render_all(&self, engine: &TemplateEngine, tables: Vec<Table>) -> GenerationReport {
        let profile = self.profile.as_ref();
        let dir = self.options.package_dir();
        let writer = OutputWriter::new(Arc::clone(&self.profile));

        let unknown_types = lang::unknown_types(&tables);
        for unknown in &unknown_types {
            tracing::warn!(
                "{}.{}: unknown type '{}', using {}",
                unknown.table,
                unknown.column,
                unknown.raw_type,
                profile.fallback_type()
            );
        }

        let collisions: Vec<IdentifierCollision> = tables
            .iter()
            .flat_map(|t| lang::identifier_collisions(profile, t))
            .collect();
        for collision in &collisions {
            tracing::warn!("{}", collision);
        }

        let names = engine.template_names();
        let qualify = names.len() > 1;
        let mut outcomes = Vec::new();
        let mut claimed: HashMap<PathBuf, String> = HashMap::new();

        for name in names {
            let qualifier = template_qualifier(name);
            let units = plan_units(
                profile,
                &tables,
                self.options.layout,
                &dir,
                &self.options.package_name,
                qualify.then_some(qualifier.as_str()),
            );

            for unit in units {
                let result = if !is_safe_file_name(&unit.name) {
                    Err(UnitError::UnsafeName(unit.name.clone()))
                } else if let Some(first) = claimed.get(&unit.path) {
                    Err(UnitError::DuplicateOutput {
                        path: unit.path.clone(),
                        template: first.clone(),
                    })
                } else {
                    claimed.insert(unit.path.clone(), name.clone());
                    engine
                        .render(name, &unit.context)
                        .and_then(|text| writer.write(&unit.path, &text))
                };

                match &result {
                    Ok(written) => tracing::info!("Wrote {}", written.path.display()),
                    Err(UnitError::EmptyOutput) => {
                        tracing::warn!("Skipping {}: template {} rendered nothing", unit.path.display(), name)
                    }
                    Err(e) => tracing::error!("Failed {} with template {}: {}", unit.path.display(), name, e),
                }

                outcomes.push(UnitOutcome {
                    template: name.clone(),
                    path: unit.path,
                    result,
                });
            }
        }

        GenerationReport {
            language: profile.key().to_string(),
            output_dir: dir,
            tables: tables.iter().map(|t| t.name.clone()).collect(),
            outcomes,
            unknown_types,
            collisions,
        }
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!("Stage {} -> {}", self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, err: ReverseError) -> ReverseError {
        tracing::error!("Run failed during stage {}: {}", self.stage, err);
        self.stage = Stage::Failed;
        err
    }
}

/// Run the whole pipeline against a metadata source
pub fn generate(source: &mut dyn MetadataSource, options: &GenerateOptions) -> Result<GenerationReport> {
    Pipeline::new(options.clone())?.run(source)
}

/// Run the pipeline on tables that were already loaded
pub fn generate_from_tables(tables: Vec<Table>, options: &GenerateOptions) -> Result<GenerationReport> {
    Pipeline::new(options.clone())?.run_with_tables(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::CppProfile;
    use crate::schema::{Column, SqlType};

    fn table(name: &str) -> Table {
        Table::new(name).with_column(Column::new("id", SqlType::new("int")).primary_key())
    }

    #[test]
    fn test_filter_preserves_order() {
        let tables = vec![table("users"), table("orders"), table("user_roles")];
        let kept = filter_tables(tables, &Regex::new("^user").unwrap());
        let names: Vec<&str> = kept.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users", "user_roles"]);
    }

    #[test]
    fn test_strip_prefix_is_idempotent() {
        assert_eq!(strip_prefix("t_users", "t_"), "users");
        assert_eq!(strip_prefix("users", "t_"), "users");
        assert_eq!(strip_prefix("t_t_users", "t_"), "users");
        assert_eq!(strip_prefix(strip_prefix("t_users", "t_"), "t_"), "users");
        assert_eq!(strip_prefix("t_", "t_"), "t_");
        assert_eq!(strip_prefix("users", ""), "users");
    }

    #[test]
    fn test_strip_table_prefix_leaves_input_untouched() {
        let tables = vec![table("t_users"), table("orders")];
        let stripped = strip_table_prefix(&tables, "t_");
        assert_eq!(tables[0].name, "t_users");
        assert_eq!(stripped[0].name, "users");
        assert_eq!(stripped[1].name, "orders");
    }

    #[test]
    fn test_plan_units_per_table_and_concentrated() {
        let tables = vec![table("users"), table("orders")];
        let dir = Path::new("/out/models");

        let per_table = plan_units(&CppProfile, &tables, Layout::PerTable, dir, "models", None);
        assert_eq!(per_table.len(), 2);
        assert_eq!(per_table[1].path, dir.join("orders.h"));
        assert_eq!(per_table[1].name, "orders");
        assert_eq!(per_table[1].context.tables.len(), 1);

        let concentrated = plan_units(&CppProfile, &tables, Layout::Concentrated, dir, "models", Some("dao"));
        assert_eq!(concentrated.len(), 1);
        assert_eq!(concentrated[0].path, dir.join("models.dao.h"));
        assert_eq!(concentrated[0].context.tables.len(), 2);

        let empty = plan_units(&CppProfile, &[], Layout::Concentrated, dir, "models", None);
        assert_eq!(empty.len(), 1);
        assert!(empty[0].context.tables.is_empty());
    }

    #[test]
    fn test_safe_file_names() {
        assert!(is_safe_file_name("users"));
        assert!(is_safe_file_name("user.v2"));
        assert!(!is_safe_file_name(""));
        assert!(!is_safe_file_name(".."));
        assert!(!is_safe_file_name("../../escaped"));
        assert!(!is_safe_file_name("a/b"));
        assert!(!is_safe_file_name("a\\b"));
    }

    #[test]
    fn test_unsafe_package_name_fails_at_init() {
        let options = GenerateOptions::new("/tmp/out").with_package_name("../models");
        assert!(matches!(Pipeline::new(options), Err(ReverseError::Config(_))));
    }

    #[test]
    fn test_invalid_filter_fails_at_init() {
        let options = GenerateOptions::new("/tmp/out").with_table_filter("(unclosed");
        assert!(matches!(
            Pipeline::new(options),
            Err(ReverseError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_pipeline_reaches_done() {
        let dir = tempfile::tempdir().unwrap();
        let options = GenerateOptions::new(dir.path()).with_language("c++");
        let mut pipeline = Pipeline::new(options).unwrap();
        assert_eq!(pipeline.stage(), Stage::Init);

        let report = pipeline.run_with_tables(vec![table("users")]).unwrap();
        assert_eq!(pipeline.stage(), Stage::Done);
        assert_eq!(report.files_written(), 1);
        assert!(dir.path().join("models").join("users.h").is_file());
    }

    #[test]
    fn test_unknown_builtin_marks_failed() {
        let dir = tempfile::tempdir().unwrap();
        let options = GenerateOptions::new(dir.path())
            .with_language("c++")
            .with_template("missing");
        let mut pipeline = Pipeline::new(options).unwrap();

        assert!(pipeline.run_with_tables(vec![table("users")]).is_err());
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert!(!dir.path().join("models").exists());
    }
}
