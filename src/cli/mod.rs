//! CLI command definitions and handlers

mod analyze;
mod init;
mod resolve;
mod seams;

use crate::config::{load_config_file, load_project_config, ProjectConfig};
use crate::pipeline::AnalysisOptions;
use crate::reporters::OutputFormat;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

fn parse_max_evidence(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("max evidence must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a valid number", s)),
    }
}

/// modgraph - typed dependency graph and scoped override resolution
#[derive(Parser, Debug)]
#[command(name = "modgraph")]
#[command(
    version,
    about = "Typed module dependency graph, scoped override resolution and plugin seam analysis",
    long_about = "modgraph statically analyzes a modular PHP application: it builds a typed, \
evidence-backed module dependency graph from source and declaration files, resolves scoped \
dependency overrides, reconstructs plugin execution order and ranks architectural risk.\n\n\
Run without a subcommand to analyze the current directory:\n  \
modgraph",
    after_help = "\
Examples:
  modgraph                                          Analyze current directory
  modgraph -C /path/to/shop analyze --format json   JSON summary for scripting
  modgraph resolve 'Vendor\\Api\\CartInterface'     Show how a type resolves per scope
  modgraph seams --min-risk medium                  List risky plugin seams
  modgraph init                                     Write a commented modgraph.toml"
)]
pub struct Cli {
    /// Path to the project (default: current directory)
    #[arg(long, short = 'C', global = true, default_value = ".")]
    pub path: PathBuf,

    /// Explicit config file (default: modgraph.toml or .modgraphrc.json in the project)
    #[arg(long, global = true, env = "MODGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64, default: all cores)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Directory the documents and cache are written to
    #[arg(long, global = true, default_value = ".modgraph")]
    pub output_dir: PathBuf,

    /// Skip change history (hotspots are ranked by centrality only)
    #[arg(long, global = true)]
    pub no_git: bool,

    /// Do not read or write the outline cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Maximum evidence exemplars kept per module edge
    #[arg(long, global = true, value_parser = parse_max_evidence)]
    pub max_evidence: Option<usize>,

    /// Output format for stdout: text, json
    #[arg(long, short = 'f', global = true, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a commented modgraph.toml with the default settings
    Init,

    /// Analyze the project and write every document to the output directory
    Analyze,

    /// Show how one override target resolves in each scope
    Resolve {
        /// Type or virtual type name, e.g. Vendor\Module\Api\FooInterface
        target: String,

        /// Scope to follow the delegation chain from (default: the global scope)
        #[arg(long)]
        scope: Option<String>,
    },

    /// List plugin seams with their execution order and risk
    Seams {
        /// Only show seams at this risk level or above
        #[arg(long, value_parser = ["low", "medium", "high"])]
        min_risk: Option<String>,
    },
}

/// Project root, effective configuration and run options for a command.
struct Invocation {
    root: PathBuf,
    config: ProjectConfig,
    options: AnalysisOptions,
    output_dir: PathBuf,
    format: OutputFormat,
}

impl Invocation {
    fn prepare(cli: &Cli, show_progress: bool) -> Result<Self> {
        let root = cli
            .path
            .canonicalize()
            .with_context(|| format!("Path does not exist: {}", cli.path.display()))?;
        if !root.is_dir() {
            anyhow::bail!("Path is not a directory: {}", root.display());
        }

        let mut config = match &cli.config {
            Some(path) => load_config_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => load_project_config(&root),
        };
        apply_overrides(&mut config, cli);

        let output_dir = resolve_output_dir(&root, &cli.output_dir);
        let options = AnalysisOptions {
            workers: cli.workers,
            cache_root: (!cli.no_cache).then(|| output_dir.clone()),
            show_progress,
        };
        let format = cli.format.parse()?;

        Ok(Self {
            root,
            config,
            options,
            output_dir,
            format,
        })
    }
}

/// CLI flags win over the config file.
fn apply_overrides(config: &mut ProjectConfig, cli: &Cli) {
    if cli.no_git {
        config.git.enabled = false;
    }
    if let Some(max) = cli.max_evidence {
        config.graph.max_evidence_per_edge = max;
    }
}

/// A relative output directory lives inside the project.
fn resolve_output_dir(root: &Path, output_dir: &Path) -> PathBuf {
    if output_dir.is_absolute() {
        output_dir.to_path_buf()
    } else {
        root.join(output_dir)
    }
}

pub fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Init) => init::run(&cli.path),
        None | Some(Commands::Analyze) => {
            let invocation = Invocation::prepare(&cli, true)?;
            analyze::run(&invocation)
        }
        Some(Commands::Resolve { target, scope }) => {
            let mut invocation = Invocation::prepare(&cli, false)?;
            invocation.config.git.enabled = false;
            resolve::run(&invocation, target, scope.as_deref())
        }
        Some(Commands::Seams { min_risk }) => {
            let mut invocation = Invocation::prepare(&cli, false)?;
            invocation.config.git.enabled = false;
            seams::run(&invocation, min_risk.as_deref())
        }
    }
}
