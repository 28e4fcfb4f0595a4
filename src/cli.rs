//! Command-line interface for expose-symbols.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::discover;
use crate::manager::SymbolManager;
use crate::report;
use crate::symbol::split_method_key;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Build-time index of exposed PHP classes and methods.
///
/// `compile` scans a source tree for classes implementing the expose
/// capability interfaces and writes their purposes, structure and selected
/// methods into a JSON artifact. The other commands query that artifact.
#[derive(Parser)]
#[command(name = "expose-symbols")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover exposed classes and write the artifact
    #[command(visible_alias = "build")]
    Compile(CompileArgs),
    /// List classes registered under a purpose pattern
    Classes(QueryArgs),
    /// List methods registered under a purpose pattern
    Methods(QueryArgs),
    /// Show a hydrated class or `Class::method`
    Show(ShowArgs),
}

/// Arguments for the compile command.
#[derive(Parser)]
pub struct CompileArgs {
    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Project root the configured paths are relative to
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory (overrides output_dir from the config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

/// Where to read the artifact from.
#[derive(Args)]
pub struct ArtifactArgs {
    /// Path to the artifact (default: from the config)
    #[arg(short, long)]
    pub artifact: Option<PathBuf>,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

/// Arguments for the classes and methods commands.
#[derive(Parser)]
pub struct QueryArgs {
    /// Purpose pattern, e.g. ACTIONCONTROLLER, LOG.*, LOG.
    pub purpose: String,

    /// Also list names registered on the ancestors of matched purposes
    #[arg(long)]
    pub include_parents: bool,

    #[command(flatten)]
    pub artifact: ArtifactArgs,
}

/// Arguments for the show command.
#[derive(Parser)]
pub struct ShowArgs {
    /// Qualified class name or `Class::method`
    pub name: String,

    #[command(flatten)]
    pub artifact: ArtifactArgs,
}

fn check_format(format: &str) -> bool {
    if format != "pretty" && format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'pretty' or 'json'", format);
        return false;
    }
    true
}

/// Load the config from `explicit`, or discover one in `dir`, or use the
/// defaults. Returns the config and the directory its paths are relative to.
fn load_config(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<(Config, PathBuf)> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => config::discover(dir),
    };

    let Some(path) = path else {
        tracing::debug!("no config file found, using defaults");
        return Ok((Config::default(), dir.to_path_buf()));
    };

    let config = Config::parse_file(&path)
        .map_err(|e| anyhow::anyhow!("cannot parse config {}: {}", path.display(), e))?;
    config::validate(&config)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;

    let base = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => dir.to_path_buf(),
    };
    tracing::debug!(config = %path.display(), "loaded config");
    Ok((config, base))
}

fn open_manager(args: &ArtifactArgs) -> anyhow::Result<SymbolManager> {
    let artifact = match &args.artifact {
        Some(path) => path.clone(),
        None => {
            let (config, base) = load_config(args.config.as_deref(), Path::new("."))?;
            config.artifact_path(&base)
        }
    };
    Ok(SymbolManager::open(artifact)?)
}

/// Run the compile command.
pub fn run_compile(args: &CompileArgs) -> anyhow::Result<i32> {
    if !check_format(&args.format) {
        return Ok(EXIT_ERROR);
    }

    let root = args.root.clone().unwrap_or_else(|| PathBuf::from("."));
    if !root.is_dir() {
        eprintln!("Error: root is not a directory: {}", root.display());
        return Ok(EXIT_ERROR);
    }

    let (config, config_base) = match load_config(args.config.as_deref(), &root) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    // An explicit root wins over the config file location.
    let base = if args.root.is_some() { root.clone() } else { config_base };

    let compilation = discover::compile(&config, &base, args.output.as_deref())?;
    let discovery = &compilation.discovery;

    let summary = report::build_compile_report(
        &compilation.artifact,
        &discovery.report,
        discovery.index.methods.len(),
    );
    match args.format.as_str() {
        "json" => report::write_json(&summary)?,
        _ => report::write_compile_pretty(&base.display().to_string(), &summary),
    }

    if discovery.report.has_failures() {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the classes command.
pub fn run_classes(args: &QueryArgs) -> anyhow::Result<i32> {
    run_query(args, false)
}

/// Run the methods command.
pub fn run_methods(args: &QueryArgs) -> anyhow::Result<i32> {
    run_query(args, true)
}

fn run_query(args: &QueryArgs, methods: bool) -> anyhow::Result<i32> {
    if !check_format(&args.artifact.format) {
        return Ok(EXIT_ERROR);
    }

    let manager = open_manager(&args.artifact)?;
    let matches = if methods {
        manager.yield_methods(&args.purpose, args.include_parents)
    } else {
        manager.yield_classes(&args.purpose, args.include_parents)
    };
    let query = report::build_query_report(&args.purpose, matches, &manager, methods);

    match args.artifact.format.as_str() {
        "json" => report::write_json(&query)?,
        _ => report::write_query_pretty(&query),
    }

    if query.matches.is_empty() {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the show command.
pub fn run_show(args: &ShowArgs) -> anyhow::Result<i32> {
    if !check_format(&args.artifact.format) {
        return Ok(EXIT_ERROR);
    }

    let manager = open_manager(&args.artifact)?;
    let name = args.name.trim_start_matches('\\');
    let json = args.artifact.format == "json";

    if split_method_key(name).is_some() {
        let Some(method) = manager.exposed_method(name) else {
            eprintln!("Error: no exposed method {}", name);
            return Ok(EXIT_FAILED);
        };
        let method = report::build_method(&method);
        if json {
            report::write_json(&method)?;
        } else {
            report::write_method_pretty(&method);
        }
        return Ok(EXIT_SUCCESS);
    }

    let Some(class) = manager.exposed_class(name) else {
        eprintln!("Error: no exposed class {}", name);
        return Ok(EXIT_FAILED);
    };
    let class = report::build_class(&class);
    if json {
        report::write_json(&class)?;
    } else {
        report::write_class_pretty(&class);
    }
    Ok(EXIT_SUCCESS)
}
