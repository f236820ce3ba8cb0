//! dbreverse CLI - generate model source files from a database schema
//!
//! Reads table metadata from a database (or a JSON snapshot) and renders it
//! through Tera templates into Go, C++ or Rust source files.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use dbreverse::codegen::{self, GenerateOptions, GenerationReport, Layout};
use dbreverse::source::{self, snapshot::Snapshot, Driver, MetadataSource};
use dbreverse::{lang, TemplateConfig};

#[derive(Parser)]
#[command(name = "dbreverse")]
#[command(version, about = "Reverse-engineer a database schema into model source code", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate source files from a database schema
    Generate {
        /// Database driver (mysql, postgres, sqlite3, json)
        #[arg(short, long)]
        driver: String,

        /// Connection string; falls back to DATABASE_URL
        #[arg(long)]
        dsn: Option<String>,

        /// Directory of templates (and an optional `config` file)
        #[arg(short, long)]
        template_dir: Option<PathBuf>,

        /// Built-in template to use when no template directory is given
        #[arg(long)]
        template: Option<String>,

        /// Parent directory of the generated package
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Target language (go, c++, rust)
        #[arg(short, long)]
        lang: Option<String>,

        /// Package/module name, also the output subdirectory
        #[arg(short, long, default_value = "models")]
        package_name: String,

        /// Write all tables into a single file
        #[arg(short, long)]
        concentrate: bool,

        /// Only generate tables whose name matches this regular expression
        #[arg(short, long)]
        filter: Option<String>,

        /// Strip this prefix from table names
        #[arg(long)]
        prefix: Option<String>,

        /// Emit JSON field mappings in tags
        #[arg(long)]
        gen_json: bool,
    },

    /// Execute every target of a reverse.yml run file
    Run {
        /// Path to the run file
        #[arg(short, long, default_value = "reverse.yml")]
        file: PathBuf,
    },

    /// Print the database schema as a JSON snapshot
    Inspect {
        /// Database driver (mysql, postgres, sqlite3, json)
        #[arg(short, long)]
        driver: String,

        /// Connection string; falls back to DATABASE_URL
        #[arg(long)]
        dsn: Option<String>,

        /// Only include tables whose name matches this regular expression
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// List supported languages and built-in templates
    Languages,
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Generate {
            driver,
            dsn,
            template_dir,
            template,
            output,
            lang,
            package_name,
            concentrate,
            filter,
            prefix,
            gen_json,
        } => {
            let mut options = GenerateOptions::new(output).with_package_name(package_name);
            options.template_dir = template_dir;
            options.template = template;
            options.table_filter = filter;
            options.layout = if concentrate {
                Layout::Concentrated
            } else {
                Layout::PerTable
            };
            options.overrides = TemplateConfig {
                lang,
                prefix,
                // Only an explicit flag overrides the template config
                gen_json: gen_json.then_some(true),
                ..Default::default()
            };
            generate(driver, dsn, options)
        }
        Commands::Run { file } => run_file(file),
        Commands::Inspect { driver, dsn, filter } => inspect(driver, dsn, filter),
        Commands::Languages => {
            list_languages();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// DSN from the flag, else from DATABASE_URL
fn resolve_dsn(dsn: Option<String>) -> Result<String, String> {
    dsn.or_else(|| std::env::var("DATABASE_URL").ok())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| "no connection string: pass --dsn or set DATABASE_URL".to_string())
}

fn generate(driver: String, dsn: Option<String>, options: GenerateOptions) -> Result<(), String> {
    let driver = Driver::parse(&driver).map_err(|e| e.to_string())?;
    let dsn = resolve_dsn(dsn)?;

    println!("🔧 Reading {} schema...", driver);
    let mut pipeline = codegen::Pipeline::new(options).map_err(|e| e.to_string())?;
    let mut source = source::open(driver, &dsn).map_err(|e| e.to_string())?;
    let report = pipeline.run(source.as_mut()).map_err(|e| e.to_string())?;

    print_report(&report);
    Ok(())
}

fn run_file(file: PathBuf) -> Result<(), String> {
    println!("🔧 Running {}...", file.display());
    let reports = codegen::execute_file(&file).map_err(|e| e.to_string())?;
    for report in &reports {
        print_report(report);
    }
    Ok(())
}

fn inspect(driver: String, dsn: Option<String>, filter: Option<String>) -> Result<(), String> {
    let driver = Driver::parse(&driver).map_err(|e| e.to_string())?;
    let dsn = resolve_dsn(dsn)?;

    let mut source = source::open(driver, &dsn).map_err(|e| e.to_string())?;
    let mut tables = source.tables().map_err(|e| e.to_string())?;
    if let Some(pattern) = filter {
        let regex = regex::Regex::new(&pattern).map_err(|e| format!("invalid filter '{}': {}", pattern, e))?;
        tables = codegen::filter_tables(tables, &regex);
    }

    let snapshot = Snapshot {
        driver: Some(driver.to_string()),
        tables,
    };
    println!("{}", snapshot.to_json().map_err(|e| e.to_string())?);
    Ok(())
}

fn list_languages() {
    for key in lang::supported_languages() {
        if let Ok(profile) = lang::lookup(key) {
            println!(
                "{:<6} extension {:<4} template {}",
                profile.key(),
                profile.extension(),
                profile.default_template()
            );
        }
    }
    println!("built-in templates: {}", codegen::builtin_names().join(", "));
}

fn print_report(report: &GenerationReport) {
    println!(
        "  ✓ {} tables into {} ({})",
        report.tables.len(),
        report.output_dir.display(),
        report.language
    );
    for written in report.written() {
        println!("  ✓ Generated {}", written.path.display());
    }
    for (path, error) in report.format_warnings() {
        println!("  ⚠ {} left unformatted: {}", path.display(), error);
    }
    for outcome in report.skipped() {
        println!("  ℹ Skipped {} (empty output from {})", outcome.path.display(), outcome.template);
    }
    for outcome in report.failures() {
        if let Err(e) = &outcome.result {
            println!("  ✗ {} ({}): {}", outcome.path.display(), outcome.template, e);
        }
    }
    for unknown in &report.unknown_types {
        println!(
            "  ⚠ {}.{} has unknown type '{}'",
            unknown.table, unknown.column, unknown.raw_type
        );
    }
    for collision in &report.collisions {
        println!("  ⚠ {}", collision);
    }
    println!("✨ Wrote {} files", report.files_written());
}
