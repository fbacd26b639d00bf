use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use bundleguard_core::config::{Config, CONFIG_FILE};
use bundleguard_core::graph::BundleGraph;
use bundleguard_core::manifest::manifest_path;
use bundleguard_core::pipeline::{find_project_root, CheckPipeline};
use bundleguard_core::result::CheckResult;
use bundleguard_core::types::Severity;

use bundleguard_report::{dot, json, markdown, text};

#[derive(Parser)]
#[command(name = "bundleguard")]
#[command(about = "Keep Core OSGi bundles from depending on UI bundles")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Check bundles and print a full layering report
    Analyze {
        /// Bundle folder or repository root
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Config file path (defaults to .bundleguard.toml above the path)
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Compact JSON output
        #[arg(long)]
        compact: bool,
        /// Reuse cached results for unchanged bundles
        #[arg(long)]
        incremental: bool,
    },
    /// Check bundles and exit with code 0 (pass) or 1 (fail)
    Check {
        /// Bundle folder or repository root
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Minimum severity to cause failure (defaults to rules.fail_on)
        #[arg(long)]
        fail_on: Option<String>,
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Compact JSON output
        #[arg(long)]
        compact: bool,
        /// Reuse cached results for unchanged bundles
        #[arg(long)]
        incremental: bool,
    },
    /// Print the Require-Bundle graph of one bundle as GraphViz DOT
    Graph {
        /// Bundle folder
        path: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Create a default .bundleguard.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let result = match cli.command {
        Commands::Analyze {
            path,
            config,
            format,
            compact,
            incremental,
        } => cmd_analyze(&path, config.as_deref(), format, compact, incremental),
        Commands::Check {
            path,
            fail_on,
            config,
            format,
            compact,
            incremental,
        } => cmd_check(
            &path,
            fail_on.as_deref(),
            config.as_deref(),
            format,
            compact,
            incremental,
        ),
        Commands::Graph { path, config } => cmd_graph(&path, config.as_deref()),
        Commands::Init { force } => cmd_init(force),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(2);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over the flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_analyze(
    path: &Path,
    config_path: Option<&Path>,
    format: OutputFormat,
    compact: bool,
    incremental: bool,
) -> Result<()> {
    let pipeline = CheckPipeline::new(load_config(path, config_path)?);
    let result = run_check(&pipeline, path, incremental)?;
    let report = match format {
        OutputFormat::Text => text::format_report(&result),
        OutputFormat::Json => json::format_report(&result, compact)? + "\n",
        OutputFormat::Markdown => markdown::format_report(&result),
    };
    print!("{report}");
    Ok(())
}

fn cmd_check(
    path: &Path,
    fail_on: Option<&str>,
    config_path: Option<&Path>,
    format: OutputFormat,
    compact: bool,
    incremental: bool,
) -> Result<()> {
    let pipeline = CheckPipeline::new(load_config(path, config_path)?);
    let fail_on: Severity = match fail_on {
        Some(s) => s.parse()?,
        None => pipeline.config().rules.fail_on,
    };
    let result = run_check(&pipeline, path, incremental)?;
    let (report, passed) = match format {
        OutputFormat::Text => text::format_check(&result, fail_on),
        OutputFormat::Json => {
            let (out, passed) = json::format_check(&result, fail_on, compact)?;
            (out + "\n", passed)
        }
        OutputFormat::Markdown => markdown::format_check(&result, fail_on),
    };
    print!("{report}");
    if !passed {
        process::exit(1);
    }
    Ok(())
}

fn cmd_graph(path: &Path, config_path: Option<&Path>) -> Result<()> {
    let pipeline = CheckPipeline::new(load_config(path, config_path)?);
    let classification = pipeline
        .classifier()
        .classify(path)
        .with_context(|| format!("failed to classify '{}'", path.display()))?;
    let graph = BundleGraph::from_classification(&classification);
    tracing::debug!(
        "graph has {} bundle(s) and {} requirement(s)",
        graph.node_count(),
        graph.edge_count()
    );
    print!("{}", dot::generate_bundle_graph(&graph));
    Ok(())
}

/// Writes the config at the enclosing project root, or here when there is none.
fn cmd_init(force: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let target = find_project_root(&cwd).unwrap_or(cwd).join(CONFIG_FILE);
    if target.exists() && !force {
        anyhow::bail!("{} already exists. Use --force to overwrite.", target.display());
    }
    std::fs::write(&target, Config::default_toml())
        .with_context(|| format!("failed to write {}", target.display()))?;
    println!("Created {} with default configuration.", target.display());
    Ok(())
}

fn load_config(project_path: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default(project_path)),
    }
}

/// A folder with its own manifest is checked on its own; anything else is
/// treated as a repository root and every bundle below it is checked.
fn run_check(pipeline: &CheckPipeline, path: &Path, incremental: bool) -> Result<CheckResult> {
    if manifest_path(path).is_file() {
        if incremental {
            tracing::debug!("--incremental has no effect on a single bundle");
        }
        return pipeline.check_bundle(path);
    }
    if incremental {
        pipeline.check_all_incremental(path)
    } else {
        pipeline.check_all(path)
    }
}
